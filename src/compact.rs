//! The legacy compacted trie.
//!
//! Predecessor of the packed [`Trie`](crate::Trie): keys are sequences of
//! 4-bit branch words ("quads", one per byte, values 0..=15), the tree is
//! built explicitly as [`TreeNode`]s and then compacted breadth-first into
//! three sparse arrays:
//!
//! - **Children**: per-node `(u16 bitmap, u16 offset)` where `offset` is the
//!   id of the first child
//! - **Steps**: per-node count of quads consumed entering the node, when > 1
//! - **Leaves**: per-node values
//!
//! The persisted form is exactly those three arrays back-to-back, each
//! framed by [`PackedArray`]; child records are 4 bytes little-endian
//! (bitmap, then offset), steps 2 bytes little-endian.
//!
//! Squashed single-branch chains make lookups lossy the same way the packed
//! trie's skeleton is: skipped quads are not verified.

#[cfg(not(test))]
use alloc::vec::Vec;

use alloc::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::codec::{self, ValueCodec};
use crate::error::{BuildError, DecodeError};
use crate::packed::PackedArray;
use crate::trie::Mode;

/// Mask selecting the quad out of a branch byte.
pub const QUAD_MASK: u8 = 0xf;
/// Sentinel branch word meaning "key exhausted".
const QUAD_END: u8 = 0x10;

/// Split ordinary bytes into their quads, high nibble first.
///
/// The compacted trie consumes keys in this form.
///
/// # Example
///
/// ```
/// use keytrie::compact::quads;
///
/// assert_eq!(quads(b"a"), vec![0x6, 0x1]);
/// ```
pub fn quads(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(b >> 4);
        out.push(b & QUAD_MASK);
    }
    out
}

/// A node of the explicit tree the compacted trie is built from.
///
/// Construct with [`TreeNode::from_sorted`], optionally [`squash`]
/// single-branch chains, then feed to [`CompactTrie::compact`].
///
/// [`squash`]: TreeNode::squash
#[derive(Clone, Debug, Default)]
pub struct TreeNode<V> {
    /// Value attached when a key ends at this node
    pub value: Option<V>,
    /// Quads consumed entering this node (label plus squashed chain)
    pub step: u16,
    /// Children in ascending branch-word order
    pub children: Vec<(u8, TreeNode<V>)>,
}

impl<V> TreeNode<V> {
    /// Build an explicit tree from sorted unique quad-keys and their values.
    ///
    /// Every element of every key must be a quad (< 16).
    pub fn from_sorted<K: AsRef<[u8]>>(keys: &[K], values: Vec<V>) -> Result<Self, BuildError> {
        if keys.len() != values.len() {
            return Err(BuildError::ValueCount {
                keys: keys.len(),
                values: values.len(),
            });
        }
        if keys.is_empty() {
            return Ok(TreeNode {
                value: None,
                step: 1,
                children: Vec::new(),
            });
        }
        for n in 1..keys.len() {
            match keys[n - 1].as_ref().cmp(keys[n].as_ref()) {
                core::cmp::Ordering::Less => {}
                core::cmp::Ordering::Equal => return Err(BuildError::Duplicate { index: n }),
                core::cmp::Ordering::Greater => return Err(BuildError::Unsorted { index: n }),
            }
        }
        for k in keys {
            assert!(
                k.as_ref().iter().all(|&w| w < 16),
                "branch words must be quads (< 16)"
            );
        }

        let mut values = values.into_iter();
        let root = Self::subtree(keys, 0, keys.len(), 0, &mut values, 1);
        Ok(root)
    }

    fn subtree<K: AsRef<[u8]>>(
        keys: &[K],
        s: usize,
        e: usize,
        depth: usize,
        values: &mut impl Iterator<Item = V>,
        step: u16,
    ) -> Self {
        let mut node = TreeNode {
            value: None,
            step,
            children: Vec::new(),
        };
        let mut s = s;
        if keys[s].as_ref().len() == depth {
            // sorted input: the key ending here comes first
            node.value = values.next();
            s += 1;
        }
        let mut j = s;
        while j < e {
            let w = keys[j].as_ref()[depth];
            let mut k = j + 1;
            while k < e && keys[k].as_ref()[depth] == w {
                k += 1;
            }
            node.children
                .push((w, Self::subtree(keys, j, k, depth + 1, values, 1)));
            j = k;
        }
        node
    }

    /// Collapse single-branch chains, accumulating their length into the
    /// surviving node's step.
    pub fn squash(&mut self) {
        for (_, child) in &mut self.children {
            while child.value.is_none() && child.children.len() == 1 {
                let (_, mut grand) = child.children.pop().expect("one child present");
                grand.step += child.step;
                *child = grand;
            }
            child.squash();
        }
    }
}

/// A compacted child record: branch bitmap plus first-child id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Child {
    bitmap: u16,
    offset: u16,
}

/// Codec for the 4-byte little-endian child record.
#[derive(Clone, Copy, Debug, Default)]
struct ChildCodec;

impl ValueCodec for ChildCodec {
    type Value = Child;

    #[inline]
    fn encoded_size(&self) -> usize {
        4
    }

    fn encode(&self, v: &Child, out: &mut Vec<u8>) {
        out.extend_from_slice(&v.bitmap.to_le_bytes());
        out.extend_from_slice(&v.offset.to_le_bytes());
    }

    fn decode(&self, bytes: &[u8]) -> Child {
        Child {
            bitmap: u16::from_le_bytes(bytes[0..2].try_into().expect("sliced 2 bytes")),
            offset: u16::from_le_bytes(bytes[2..4].try_into().expect("sliced 2 bytes")),
        }
    }
}

/// The compacted, persistable form of a [`TreeNode`] tree.
pub struct CompactTrie<C: ValueCodec> {
    children: PackedArray<ChildCodec>,
    steps: PackedArray<codec::U16>,
    leaves: PackedArray<C>,
}

impl<C: ValueCodec> CompactTrie<C> {
    /// Compact an explicit tree, assigning node ids breadth-first.
    ///
    /// Fails with `NodeIdOverflow` when the tree needs more ids than fit in
    /// the 16-bit offsets of the child records.
    pub fn compact(codec: C, root: &TreeNode<C::Value>) -> Result<Self, BuildError> {
        let mut child_idx: Vec<u32> = Vec::new();
        let mut child_data: Vec<Child> = Vec::new();
        let mut step_idx: Vec<u32> = Vec::new();
        let mut step_data: Vec<u16> = Vec::new();
        let mut leaf_idx: Vec<u32> = Vec::new();
        let mut leaf_data: Vec<&C::Value> = Vec::new();

        let mut queue: VecDeque<&TreeNode<C::Value>> = VecDeque::with_capacity(256);
        queue.push_back(root);

        let mut id: usize = 0;
        while let Some(node) = queue.pop_front() {
            if let Some(v) = &node.value {
                leaf_idx.push(id as u32);
                leaf_data.push(v);
            }
            if node.step > 1 {
                step_idx.push(id as u32);
                step_data.push(node.step);
            }
            if !node.children.is_empty() {
                let offset = id + queue.len() + 1;
                if offset > u16::MAX as usize {
                    return Err(BuildError::NodeIdOverflow {
                        nodes: offset + node.children.len(),
                        max: u16::MAX as usize,
                    });
                }
                let mut bitmap = 0u16;
                for (w, _) in &node.children {
                    bitmap |= 1 << (w & QUAD_MASK);
                }
                child_idx.push(id as u32);
                child_data.push(Child {
                    bitmap,
                    offset: offset as u16,
                });
                for (_, c) in &node.children {
                    queue.push_back(c);
                }
            }
            id += 1;
        }

        let mut leaves_bytes = Vec::with_capacity(leaf_data.len() * codec.encoded_size());
        for v in &leaf_data {
            codec.encode(v, &mut leaves_bytes);
        }
        let leaves = PackedArray::from_encoded(codec, &leaf_idx, leaves_bytes)?;

        Ok(Self {
            children: PackedArray::from_pairs(ChildCodec, &child_idx, &child_data)?,
            steps: PackedArray::from_pairs(codec::U16, &step_idx, &step_data)?,
            leaves,
        })
    }

    /// Look up `key` (a quad sequence) under `mode`.
    ///
    /// Same mode semantics as the packed trie: `LT` first, `GT` overrides,
    /// `EQ` overrides both. Skipped quads of squashed chains are not
    /// verified, so matches on absent keys are "possibly equal".
    pub fn search(&self, key: &[u8], mode: Mode) -> Option<C::Value> {
        let mut eq: Option<u16> = Some(0);
        let mut lt: Option<u16> = None;
        let mut gt: Option<u16> = None;
        let mut lt_leaf = false;

        let mut idx = 0usize;
        while let Some(cur) = eq {
            let word = if key.len() == idx {
                QUAD_END
            } else {
                key[idx] & QUAD_MASK
            };

            let nb = self.neighbor_branches(cur, word);
            if let Some(l) = nb.lt {
                lt = Some(l);
                lt_leaf = nb.lt_leaf;
            }
            if let Some(r) = nb.gt {
                gt = Some(r);
            }
            eq = nb.eq;

            let Some(next) = eq else { break };
            if word == QUAD_END {
                break;
            }

            idx += self.step_of(next) as usize;
            if idx > key.len() {
                // key ends inside a squashed chain: the subtree extends it
                gt = Some(next);
                eq = None;
                break;
            }
        }

        let mut value = None;
        if mode.contains(Mode::LT) {
            if let Some(l) = lt {
                let id = if lt_leaf { l } else { self.right_most(l) };
                value = self.leaves.get(id as u32);
            }
        }
        if mode.contains(Mode::GT) {
            if let Some(r) = gt {
                value = self.leaves.get(self.left_most(r) as u32);
            }
        }
        if mode.contains(Mode::EQ) {
            if let Some(e) = eq {
                value = self.leaves.get(e as u32);
            }
        }
        value
    }

    fn child_of(&self, id: u16) -> Option<Child> {
        self.children.get(id as u32)
    }

    fn step_of(&self, id: u16) -> u16 {
        self.steps.get(id as u32).unwrap_or(1)
    }

    /// Id of the child reached through the set bit just below `at`.
    fn child_at(ch: &Child, at: u32) -> u16 {
        let below = crate::bitmap::ones_below(ch.bitmap as u64, at) as u16;
        ch.offset + below - 1
    }

    fn neighbor_branches(&self, id: u16, word: u8) -> Neighbors {
        let mut nb = Neighbors::default();
        let has_leaf = self.leaves.get_bytes(id as u32).is_some();

        if word == QUAD_END {
            if has_leaf {
                nb.eq = Some(id);
            }
        } else if has_leaf {
            nb.lt = Some(id);
            nb.lt_leaf = true;
        }

        let Some(ch) = self.child_of(id) else {
            return nb;
        };

        if word != QUAD_END && (ch.bitmap >> word) & 1 == 1 {
            nb.eq = Some(Self::child_at(&ch, word as u32 + 1));
        }

        if word != QUAD_END {
            let below = ch.bitmap & ((1u16 << word) - 1);
            if below != 0 {
                let b = 15 - below.leading_zeros() as u8;
                nb.lt = Some(Self::child_at(&ch, b as u32 + 1));
                nb.lt_leaf = false;
            }
        }

        // every child extends an exhausted key
        let above_from = if word == QUAD_END { 0 } else { word + 1 };
        let above = ch.bitmap & !((1u32 << above_from) - 1) as u16;
        if above != 0 {
            let b = above.trailing_zeros() as u8;
            nb.gt = Some(Self::child_at(&ch, b as u32 + 1));
        }

        nb
    }

    /// Smallest leaf of the subtree at `id`: follow first branches until a
    /// node carries a value.
    fn left_most(&self, mut id: u16) -> u16 {
        loop {
            if self.leaves.get_bytes(id as u32).is_some() {
                return id;
            }
            let ch = self.child_of(id).expect("valueless node has children");
            id = ch.offset;
        }
    }

    /// Largest leaf of the subtree at `id`: follow last branches to the
    /// bottom.
    fn right_most(&self, mut id: u16) -> u16 {
        loop {
            let Some(ch) = self.child_of(id) else {
                return id;
            };
            id = ch.offset + (ch.bitmap.count_ones() as u16) - 1;
        }
    }

    /// Serialize as Children, Steps, Leaves frames back-to-back.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.children.to_bytes();
        out.extend_from_slice(&self.steps.to_bytes());
        out.extend_from_slice(&self.leaves.to_bytes());
        out
    }

    /// Deserialize from the layout written by [`to_bytes`], returning the
    /// trie and the bytes consumed.
    ///
    /// [`to_bytes`]: CompactTrie::to_bytes
    pub fn from_bytes(codec: C, bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let (children, a) = PackedArray::from_bytes(ChildCodec, bytes)?;
        let (steps, b) = PackedArray::from_bytes(codec::U16, &bytes[a..])?;
        let (leaves, c) = PackedArray::from_bytes(codec, &bytes[a + b..])?;
        Ok((
            Self {
                children,
                steps,
                leaves,
            },
            a + b + c,
        ))
    }
}

#[derive(Default)]
struct Neighbors {
    lt: Option<u16>,
    eq: Option<u16>,
    gt: Option<u16>,
    lt_leaf: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(keys: &[&[u8]], squash: bool) -> CompactTrie<codec::U32> {
        let qkeys: Vec<Vec<u8>> = keys.iter().map(|k| quads(k)).collect();
        let values: Vec<u32> = (0..keys.len() as u32).collect();
        let mut root = TreeNode::from_sorted(&qkeys, values).unwrap();
        if squash {
            root.squash();
        }
        CompactTrie::compact(codec::U32, &root).unwrap()
    }

    #[test]
    fn test_quads() {
        assert_eq!(quads(b"\x6D\x4A"), vec![0x6, 0xD, 0x4, 0xA]);
        assert_eq!(quads(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_search_eq() {
        let keys: &[&[u8]] = &[b"abc", b"abcd", b"abd", b"bc", b"cde"];
        for squash in [false, true] {
            let t = build(keys, squash);
            for (i, k) in keys.iter().enumerate() {
                assert_eq!(
                    t.search(&quads(k), Mode::EQ),
                    Some(i as u32),
                    "key {:?} squash={}",
                    k,
                    squash
                );
            }
            assert_eq!(t.search(&quads(b"ab"), Mode::EQ), None);
        }
    }

    #[test]
    fn test_search_neighbors() {
        let keys: &[&[u8]] = &[b"abc", b"abcd", b"abd", b"bc", b"cde"];
        let t = build(keys, false);
        assert_eq!(t.search(&quads(b"abc"), Mode::LT), None);
        assert_eq!(t.search(&quads(b"abc"), Mode::GT), Some(1));
        assert_eq!(t.search(&quads(b"abcd"), Mode::LT), Some(0));
        assert_eq!(t.search(&quads(b"abd"), Mode::LE), Some(2));
        assert_eq!(t.search(&quads(b"b"), Mode::GT), Some(3));
        assert_eq!(t.search(&quads(b"bz"), Mode::LT), Some(3));
        assert_eq!(t.search(&quads(b"cde"), Mode::GT), None);
        assert_eq!(t.search(&quads(b"zz"), Mode::LE), Some(4));
    }

    #[test]
    fn test_prefix_key_is_node_leaf() {
        // "ab" is both a leaf and an inner path
        let keys: &[&[u8]] = &[b"ab", b"abc"];
        let t = build(keys, false);
        assert_eq!(t.search(&quads(b"ab"), Mode::EQ), Some(0));
        assert_eq!(t.search(&quads(b"abc"), Mode::EQ), Some(1));
        assert_eq!(t.search(&quads(b"abc"), Mode::LT), Some(0));
        assert_eq!(t.search(&quads(b"ab"), Mode::GT), Some(1));
    }

    #[test]
    fn test_squash_skips_are_lossy() {
        let keys: &[&[u8]] = &[b"alpha1", b"alpha2"];
        let t = build(keys, true);
        assert_eq!(t.search(&quads(b"alpha1"), Mode::EQ), Some(0));
        // diverging inside the squashed chain is not detected
        assert_eq!(t.search(&quads(b"aZpha1"), Mode::EQ), Some(0));
    }

    #[test]
    fn test_key_ends_inside_chain() {
        let keys: &[&[u8]] = &[b"alpha1", b"alpha2"];
        let t = build(keys, true);
        // "al" ends inside the squashed chain: subtree is greater
        assert_eq!(t.search(&quads(b"al"), Mode::GT), Some(0));
        assert_eq!(t.search(&quads(b"al"), Mode::EQ), None);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let keys: &[&[u8]] = &[b"abc", b"abcd", b"abd", b"bc", b"cde"];
        let t = build(keys, true);
        let bytes = t.to_bytes();
        let (back, used) = CompactTrie::from_bytes(codec::U32, &bytes).unwrap();
        assert_eq!(used, bytes.len());
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(back.search(&quads(k), Mode::EQ), Some(i as u32));
        }
    }

    #[test]
    fn test_truncated_bytes() {
        let keys: &[&[u8]] = &[b"abc", b"abd"];
        let t = build(keys, false);
        let bytes = t.to_bytes();
        for cut in [0, 3, bytes.len() / 2, bytes.len() - 1] {
            let err = CompactTrie::<codec::U32>::from_bytes(codec::U32, &bytes[..cut]);
            assert!(err.is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_child_record_layout() {
        let mut buf = Vec::new();
        ChildCodec.encode(
            &Child {
                bitmap: 0x0102,
                offset: 0x0304,
            },
            &mut buf,
        );
        assert_eq!(buf, [0x02, 0x01, 0x04, 0x03]);
        assert_eq!(
            ChildCodec.decode(&buf),
            Child {
                bitmap: 0x0102,
                offset: 0x0304
            }
        );
    }
}
