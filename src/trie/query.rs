//! Equality, predecessor and successor search.
//!
//! One descent tracks three candidates at once: the node still matching the
//! key exactly, the best strictly-lesser subtree and the best
//! strictly-greater subtree. The lesser candidate resolves through a
//! right-spine descent to its largest leaf, the greater one through a
//! left-spine descent to its smallest.

use core::cmp::Ordering;
use core::ops::BitOr;

use crate::codec::ValueCodec;

use super::store::{label_bit_index, prefix_compare, QuerySession};
use super::Trie;

/// Search mode bitset over `{EQ, LT, GT}`.
///
/// When several set candidates exist the result is resolved in a fixed
/// order: an `LT` match is taken first, a `GT` match overrides it, and an
/// `EQ` match overrides both. `LE`/`GE` therefore prefer the exact match.
/// Combining `LT | GT` without `EQ` is permitted and yields the successor
/// when one exists, else the predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mode(u8);

impl Mode {
    /// Exact match.
    pub const EQ: Mode = Mode(0b001);
    /// Greatest key strictly less than the searched key.
    pub const LT: Mode = Mode(0b010);
    /// Smallest key strictly greater than the searched key.
    pub const GT: Mode = Mode(0b100);
    /// Greatest key less than or equal to the searched key.
    pub const LE: Mode = Mode(0b011);
    /// Smallest key greater than or equal to the searched key.
    pub const GE: Mode = Mode(0b101);

    /// Whether all bits of `other` are set in `self`.
    #[inline]
    pub fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Mode {
    type Output = Mode;

    #[inline]
    fn bitor(self, rhs: Mode) -> Mode {
        Mode(self.0 | rhs.0)
    }
}

impl<C: ValueCodec> Trie<C> {
    /// Look up the value stored at `key`.
    ///
    /// On a trie built without `complete`, a hit only means "possibly equal":
    /// the skeleton is lossy and the caller must verify the key elsewhere.
    #[inline]
    pub fn get(&self, key: &[u8]) -> Option<C::Value> {
        self.search(key, Mode::EQ)
    }

    /// Search for `key` under `mode` and decode the selected value.
    ///
    /// Returns `None` when no candidate of the requested kind exists, or
    /// when the trie stores no values.
    pub fn search(&self, key: &[u8], mode: Mode) -> Option<C::Value> {
        let (lt, eq, gt) = self.search_ids(key);
        let mut id = None;
        if mode.contains(Mode::LT) {
            if let Some(l) = lt {
                id = Some(self.store.right_most(l));
            }
        }
        if mode.contains(Mode::GT) {
            if let Some(g) = gt {
                id = Some(self.store.left_most(g));
            }
        }
        if mode.contains(Mode::EQ) {
            if let Some(e) = eq {
                id = Some(e);
            }
        }
        self.leaf_value(id?)
    }

    /// Descend for `key`, returning `(lt, eq, gt)` candidate node ids.
    ///
    /// `lt`/`gt` are subtree roots; `eq` is a leaf.
    fn search_ids(&self, key: &[u8]) -> (Option<u32>, Option<u32>, Option<u32>) {
        let ns = &self.store;
        if ns.node_count() == 0 {
            return (None, None, None);
        }

        let key_bits = key.len() as u32 * 8;
        let mut lt: Option<u32> = None;
        let mut gt: Option<u32> = None;
        let mut eq: Option<u32> = Some(0);
        let mut qr = QuerySession::default();
        let mut i = 0u32;

        while let Some(cur) = eq {
            ns.load_node(cur, &mut qr);
            if !qr.is_inner {
                break;
            }

            if qr.has_prefix_content {
                match prefix_compare(&key[(i >> 3) as usize..], qr.prefix, qr.prefix_len) {
                    Ordering::Equal => i = (i & !7) + qr.prefix_len,
                    Ordering::Less => {
                        // key diverges below the prefix: the subtree is
                        // entirely greater
                        gt = Some(cur);
                        eq = None;
                        break;
                    }
                    Ordering::Greater => {
                        // the subtree is entirely smaller
                        lt = Some(cur);
                        eq = None;
                        break;
                    }
                }
            } else if qr.prefix_len > 0 {
                i = (i & !7) + qr.prefix_len;
                if i > key_bits {
                    // key ends inside a skipped span; without content the
                    // order cannot be decided
                    eq = None;
                    break;
                }
            }

            let bit_idx = label_bit_index(key, key_bits, i, qr.word_size);
            let (below, has) = ns.label_rank_bit(&qr, bit_idx);
            let first = ns.first_child(&qr);
            if below > 0 {
                lt = Some(first + below - 1);
            }
            let ch = first + below + has - 1;
            if ch + 1 <= ns.last_child(&qr) {
                gt = Some(ch + 1);
            }
            if has == 0 {
                eq = None;
                break;
            }
            eq = Some(ch);
            if i == key_bits {
                // the zero-width child is a leaf
                break;
            }
            i += qr.word_size;
        }

        if let Some(leaf) = eq {
            ns.load_node(leaf, &mut qr);
            debug_assert!(!qr.is_inner);
            if self.store.leaf_prefixes.is_some() {
                let tail = &key[(i >> 3) as usize..];
                let lp = if qr.has_leaf_prefix { qr.leaf_prefix } else { &[] };
                match tail.cmp(lp) {
                    Ordering::Equal => {}
                    Ordering::Less => {
                        gt = Some(leaf);
                        eq = None;
                    }
                    Ordering::Greater => {
                        lt = Some(leaf);
                        eq = None;
                    }
                }
            }
        }

        (lt, eq, gt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::trie::TrieOpt;

    fn sample() -> Trie<codec::U32> {
        let keys: &[&[u8]] = &[b"abc", b"abcd", b"abd", b"abde", b"bc", b"bcd", b"bcde", b"cde"];
        let values: Vec<u32> = (0..8).collect();
        Trie::new(codec::U32, keys, &values, TrieOpt::complete()).unwrap()
    }

    #[test]
    fn test_mode_bits() {
        assert_eq!(Mode::EQ | Mode::LT, Mode::LE);
        assert_eq!(Mode::EQ | Mode::GT, Mode::GE);
        assert!(Mode::LE.contains(Mode::EQ));
        assert!(Mode::LE.contains(Mode::LT));
        assert!(!Mode::LE.contains(Mode::GT));
    }

    #[test]
    fn test_eq() {
        let t = sample();
        assert_eq!(t.search(b"abc", Mode::EQ), Some(0));
        assert_eq!(t.search(b"bcde", Mode::EQ), Some(6));
        assert_eq!(t.search(b"abx", Mode::EQ), None);
        assert_eq!(t.search(b"", Mode::EQ), None);
    }

    #[test]
    fn test_ge() {
        let t = sample();
        assert_eq!(t.search(b"abc", Mode::GE), Some(0));
        assert_eq!(t.search(b"abx", Mode::GE), Some(4)); // -> "bc"
        assert_eq!(t.search(b"abca", Mode::GE), Some(1)); // -> "abcd"
        assert_eq!(t.search(b"abcx", Mode::GE), Some(2)); // -> "abd"
        assert_eq!(t.search(b"", Mode::GE), Some(0));
        assert_eq!(t.search(b"cdf", Mode::GE), None);
    }

    #[test]
    fn test_le() {
        let t = sample();
        assert_eq!(t.search(b"abc", Mode::LE), Some(0));
        assert_eq!(t.search(b"abx", Mode::LE), Some(3)); // -> "abde"
        assert_eq!(t.search(b"ac", Mode::LE), Some(3)); // -> "abde"
        assert_eq!(t.search(b"zzz", Mode::LE), Some(7));
        assert_eq!(t.search(b"ab", Mode::LE), None);
    }

    #[test]
    fn test_strict_lt_gt() {
        let t = sample();
        assert_eq!(t.search(b"abc", Mode::LT), None);
        assert_eq!(t.search(b"abcd", Mode::LT), Some(0));
        assert_eq!(t.search(b"abc", Mode::GT), Some(1));
        assert_eq!(t.search(b"cde", Mode::GT), None);
        // LT|GT without EQ: the successor wins when both exist
        assert_eq!(t.search(b"abcd", Mode::LT | Mode::GT), Some(2));
    }

    #[test]
    fn test_lossy_eq_is_possibly_equal() {
        let keys: &[&[u8]] = &[b"alpha1", b"alpha2"];
        let t = Trie::new(codec::U32, keys, &[1, 2], TrieOpt::default()).unwrap();
        assert_eq!(t.get(b"alpha1"), Some(1));
        assert_eq!(t.get(b"alpha2"), Some(2));
        // same branch nibble, different skipped bits: a false positive
        assert_eq!(t.get(b"aZpha1"), Some(1));
    }
}
