//! Fixed-width value codecs.
//!
//! The packed containers store values as densely packed encoded bytes; a
//! `ValueCodec` tells them the element width and how to convert between the
//! value type and its byte form. All integer codecs here are little-endian.

#[cfg(not(test))]
use alloc::vec::Vec;

/// Encoder/decoder for a fixed-width value type.
///
/// `encoded_size` must be constant for a given codec instance and every
/// `encode` call must append exactly that many bytes.
pub trait ValueCodec {
    /// The value type this codec handles.
    type Value;

    /// Width in bytes of one encoded value.
    fn encoded_size(&self) -> usize;

    /// Append the encoded form of `v` to `out`.
    fn encode(&self, v: &Self::Value, out: &mut Vec<u8>);

    /// Decode a value from exactly `encoded_size()` bytes.
    fn decode(&self, bytes: &[u8]) -> Self::Value;
}

macro_rules! int_codec {
    ($name:ident, $ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl ValueCodec for $name {
            type Value = $ty;

            #[inline]
            fn encoded_size(&self) -> usize {
                core::mem::size_of::<$ty>()
            }

            #[inline]
            fn encode(&self, v: &$ty, out: &mut Vec<u8>) {
                out.extend_from_slice(&v.to_le_bytes());
            }

            #[inline]
            fn decode(&self, bytes: &[u8]) -> $ty {
                <$ty>::from_le_bytes(bytes.try_into().expect("codec width mismatch"))
            }
        }
    };
}

int_codec!(U16, u16, "Little-endian `u16` codec.");
int_codec!(U32, u32, "Little-endian `u32` codec.");
int_codec!(U64, u64, "Little-endian `u64` codec.");
int_codec!(I32, i32, "Little-endian `i32` codec.");
int_codec!(I64, i64, "Little-endian `i64` codec.");
