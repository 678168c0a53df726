//! Sparse packed arrays.
//!
//! `PackedArray` associates sparse `u32` indices with fixed-width encoded
//! values: a presence bitmap answers "is index i occupied" and rank over that
//! bitmap locates the value inside a dense payload. `VarBytes` is the
//! variable-length sibling used for prefix storage.
//!
//! ## Persisted format
//!
//! `to_bytes` frames a packed array as:
//!
//! - `u32` LE: capacity (bit length of the presence bitmap)
//! - `u32` LE: payload byte length
//! - presence words as raw little-endian `u64`s
//! - payload bytes
//!
//! The payload of each element is produced by the array's `ValueCodec`.

#[cfg(not(test))]
use alloc::vec::Vec;

use bytemuck::cast_slice;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bitmap::{Bitmap, BitmapBuilder};
use crate::codec::ValueCodec;
use crate::error::{BuildError, DecodeError};

/// Build a presence bitmap from strictly ascending indices.
///
/// Capacity is `last index + 1`.
fn presence_from_indices(indices: &[u32]) -> Result<Bitmap, BuildError> {
    for n in 1..indices.len() {
        if indices[n] == indices[n - 1] {
            return Err(BuildError::Duplicate { index: n });
        }
        if indices[n] < indices[n - 1] {
            return Err(BuildError::Unsorted { index: n });
        }
    }
    let cap = indices.last().map_or(0, |&last| last + 1);
    let mut b = BitmapBuilder::new();
    b.extend_zeros(cap);
    for &i in indices {
        b.set(i);
    }
    Ok(b.finish())
}

/// A sparse array of fixed-width elements.
///
/// Present indices are marked in a rank-indexed bitmap; values are encoded
/// back-to-back in index order, so `get` is one rank query plus a slice.
#[derive(Clone, Debug)]
pub struct PackedArray<C: ValueCodec> {
    codec: C,
    elt_size: usize,
    presence: Bitmap,
    data: Vec<u8>,
}

impl<C: ValueCodec> PackedArray<C> {
    /// Create an empty array.
    pub fn empty(codec: C) -> Self {
        let elt_size = codec.encoded_size();
        Self {
            codec,
            elt_size,
            presence: Bitmap::new(),
            data: Vec::new(),
        }
    }

    /// Build from strictly ascending indices and their parallel values.
    ///
    /// Capacity becomes `indices.last() + 1`.
    pub fn from_pairs(codec: C, indices: &[u32], values: &[C::Value]) -> Result<Self, BuildError> {
        if indices.len() != values.len() {
            return Err(BuildError::ValueCount {
                keys: indices.len(),
                values: values.len(),
            });
        }
        let presence = presence_from_indices(indices)?;
        let elt_size = codec.encoded_size();
        let mut data = Vec::with_capacity(values.len() * elt_size);
        for v in values {
            codec.encode(v, &mut data);
        }
        debug_assert_eq!(data.len(), values.len() * elt_size);
        Ok(Self {
            codec,
            elt_size,
            presence,
            data,
        })
    }

    /// Build from strictly ascending indices and an already encoded payload.
    ///
    /// `data` must hold exactly `indices.len()` elements of the codec's
    /// width, in index order.
    pub(crate) fn from_encoded(
        codec: C,
        indices: &[u32],
        data: Vec<u8>,
    ) -> Result<Self, BuildError> {
        let elt_size = codec.encoded_size();
        debug_assert_eq!(data.len(), indices.len() * elt_size);
        let presence = presence_from_indices(indices)?;
        Ok(Self {
            codec,
            elt_size,
            presence,
            data,
        })
    }

    /// Capacity (one past the highest present index).
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.presence.len()
    }

    /// Number of present elements.
    #[inline]
    pub fn count(&self) -> u32 {
        self.presence.count_ones()
    }

    /// Decode the element at `i`, if present.
    #[inline]
    pub fn get(&self, i: u32) -> Option<C::Value> {
        self.get_bytes(i).map(|b| self.codec.decode(b))
    }

    /// Raw encoded bytes of the element at `i`, if present.
    #[inline]
    pub fn get_bytes(&self, i: u32) -> Option<&[u8]> {
        if i >= self.presence.len() {
            return None;
        }
        let (r, bit) = self.presence.rank_bit(i);
        if bit == 0 {
            return None;
        }
        let at = r as usize * self.elt_size;
        Some(&self.data[at..at + self.elt_size])
    }

    /// Serialize into the framed byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let words = self.presence.words();
        let mut out = Vec::with_capacity(8 + words.len() * 8 + self.data.len());
        out.extend_from_slice(&self.presence.len().to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(cast_slice(words));
        out.extend_from_slice(&self.data);
        out
    }

    /// Deserialize from the framed byte layout.
    ///
    /// Returns the array and the number of bytes consumed, so frames can be
    /// laid back-to-back.
    pub fn from_bytes(codec: C, bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        if bytes.len() < 8 {
            return Err(DecodeError::TooShort {
                needed: 8,
                have: bytes.len(),
            });
        }
        let cap = u32::from_le_bytes(bytes[0..4].try_into().expect("sliced 4 bytes"));
        let data_len = u32::from_le_bytes(bytes[4..8].try_into().expect("sliced 4 bytes")) as usize;
        let word_cnt = (cap as usize).div_ceil(64);
        let total = 8 + word_cnt * 8 + data_len;
        if bytes.len() < total {
            return Err(DecodeError::TooShort {
                needed: total,
                have: bytes.len(),
            });
        }

        let mut words = Vec::with_capacity(word_cnt);
        for w in 0..word_cnt {
            let at = 8 + w * 8;
            words.push(u64::from_le_bytes(
                bytes[at..at + 8].try_into().expect("sliced 8 bytes"),
            ));
        }
        let presence = Bitmap::from_words(words, cap);

        let elt_size = codec.encoded_size();
        let expected = presence.count_ones() as usize * elt_size;
        if expected != data_len {
            return Err(DecodeError::LengthMismatch {
                expected,
                found: data_len,
            });
        }

        let data = bytes[8 + word_cnt * 8..total].to_vec();
        Ok((
            Self {
                codec,
                elt_size,
                presence,
                data,
            },
            total,
        ))
    }
}

/// A sparse array of variable-length byte strings.
///
/// Same presence/rank scheme as `PackedArray`, with an offset table locating
/// each entry inside a shared byte blob.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VarBytes {
    presence: Bitmap,
    /// `count + 1` offsets into `bytes`
    offsets: Vec<u32>,
    bytes: Vec<u8>,
}

impl VarBytes {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from strictly ascending indices and their parallel entries.
    pub fn from_pairs(indices: &[u32], entries: &[&[u8]]) -> Result<Self, BuildError> {
        if indices.len() != entries.len() {
            return Err(BuildError::ValueCount {
                keys: indices.len(),
                values: entries.len(),
            });
        }
        let presence = presence_from_indices(indices)?;
        let mut offsets = Vec::with_capacity(entries.len() + 1);
        let mut bytes = Vec::new();
        offsets.push(0);
        for e in entries {
            bytes.extend_from_slice(e);
            offsets.push(bytes.len() as u32);
        }
        Ok(Self {
            presence,
            offsets,
            bytes,
        })
    }

    /// Number of present entries.
    #[inline]
    pub fn count(&self) -> u32 {
        self.presence.count_ones()
    }

    /// The entry at `i`, if present.
    #[inline]
    pub fn get(&self, i: u32) -> Option<&[u8]> {
        if i >= self.presence.len() {
            return None;
        }
        let (r, bit) = self.presence.rank_bit(i);
        if bit == 0 {
            return None;
        }
        let r = r as usize;
        Some(&self.bytes[self.offsets[r] as usize..self.offsets[r + 1] as usize])
    }
}
