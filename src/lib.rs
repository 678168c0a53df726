//! # Keytrie
//!
//! Compact, immutable, ordered containers for byte-string keys.
//!
//! The main structure is [`Trie`], a packed trie that stores its tree shape
//! as bitmap-indexed parallel arrays: navigation is rank arithmetic over bit
//! vectors instead of pointer chasing. It supports equality lookup,
//! predecessor/successor lookup and ordered scans resuming from an arbitrary
//! seek key.
//!
//! ## Quick Start
//!
//! ```
//! use keytrie::{codec, Mode, Trie, TrieOpt};
//!
//! let keys: &[&[u8]] = &[b"alpha", b"beta", b"gamma"];
//! let trie = Trie::new(codec::U32, keys, &[10, 20, 30], TrieOpt::complete()).unwrap();
//!
//! assert_eq!(trie.get(b"beta"), Some(20));
//! assert_eq!(trie.search(b"bz", Mode::GE), Some(30));
//!
//! let mut scan = trie.scan(b"b", true);
//! let (key, value) = scan.next().unwrap();
//! assert_eq!(key, b"beta");
//! assert_eq!(value, Some(&20u32.to_le_bytes()[..]));
//! ```
//!
//! ## Lossy skeletons
//!
//! By default only the branching skeleton of the key set is kept: lookups of
//! absent keys may report a false positive and the caller must verify the key
//! elsewhere. Building with [`TrieOpt::complete`] stores inner and leaf
//! prefixes so keys are reproduced bit-for-bit; scanning requires a complete
//! trie.
//!
//! ## Features
//!
//! - `std` (default) - std error trait impls
//! - `serde` - enable serialization/deserialization of the storage primitives

// Use no_std unless std feature is enabled or we're in test mode
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// When using no_std, we need to explicitly link the alloc crate
#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

// When using std, re-export alloc types from std for compatibility
#[cfg(any(test, feature = "std"))]
extern crate std as alloc;

mod bitmap;
pub mod codec;
pub mod compact;
mod error;
mod packed;
mod trie;

pub use bitmap::{ones_below, Bitmap, BitmapBuilder};
pub use codec::ValueCodec;
pub use error::{BuildError, DecodeError};
pub use packed::{PackedArray, VarBytes};
pub use trie::{Mode, ScanCursor, Trie, TrieOpt};
