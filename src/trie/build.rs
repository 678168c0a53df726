//! Breadth-first construction of the packed trie.
//!
//! Keys are split into groups sharing a common prefix. Each group becomes one
//! node: a single key is a leaf, anything larger becomes an inner node that
//! branches where the group's keys first diverge. Children are enqueued in
//! label order, so node ids (dequeue order) satisfy the rank invariant the
//! readers rely on: the first child of an inner node whose bitmap starts at
//! bit `from` has id `rank1(inners, from) + 1`.

#[cfg(not(test))]
use alloc::vec::Vec;

use alloc::collections::VecDeque;
use alloc::vec;

use crate::bitmap::BitmapBuilder;
use crate::codec::{self, ValueCodec};
use crate::error::BuildError;
use crate::packed::{PackedArray, VarBytes};

use super::store::{label_bit_index, NodeStore, LONG_SIZE, SHORT_SIZE};
use super::{Trie, TrieOpt};

/// A contiguous key range sharing a common prefix, entered at bit `bit`.
struct Group {
    s: usize,
    e: usize,
    bit: u32,
}

/// First bit position at which `a` and `b` differ.
///
/// When `a` is a prefix of `b` this is where `a` ends.
fn first_diff_bit(a: &[u8], b: &[u8]) -> u32 {
    let n = a.len().min(b.len());
    for i in 0..n {
        let x = a[i] ^ b[i];
        if x != 0 {
            return (i as u32) * 8 + x.leading_zeros();
        }
    }
    (n as u32) * 8
}

impl<C: ValueCodec> Trie<C> {
    /// Build a trie from sorted unique keys and their parallel values.
    ///
    /// `values` may be empty to build a keys-only index; otherwise its length
    /// must match `keys`. Keys must be strictly ascending in unsigned
    /// lexicographic order.
    pub fn new<K: AsRef<[u8]>>(
        codec: C,
        keys: &[K],
        values: &[C::Value],
        opt: TrieOpt,
    ) -> Result<Self, BuildError> {
        if !values.is_empty() && values.len() != keys.len() {
            return Err(BuildError::ValueCount {
                keys: keys.len(),
                values: values.len(),
            });
        }
        for n in 1..keys.len() {
            match keys[n - 1].as_ref().cmp(keys[n].as_ref()) {
                core::cmp::Ordering::Less => {}
                core::cmp::Ordering::Equal => return Err(BuildError::Duplicate { index: n }),
                core::cmp::Ordering::Greater => return Err(BuildError::Unsorted { index: n }),
            }
        }
        // A trie over n keys has at most 2n - 1 nodes.
        if keys.len() > (u32::MAX / 2) as usize {
            return Err(BuildError::NodeIdOverflow {
                nodes: keys.len() * 2,
                max: u32::MAX as usize,
            });
        }

        let value_size = codec.encoded_size();
        let store = build_store(&codec, keys, values, opt)?;
        Ok(Self {
            codec,
            value_size,
            store,
        })
    }
}

fn build_store<C: ValueCodec, K: AsRef<[u8]>>(
    codec: &C,
    keys: &[K],
    values: &[C::Value],
    opt: TrieOpt,
) -> Result<NodeStore, BuildError> {
    let mut node_type = BitmapBuilder::new();
    let mut inners = BitmapBuilder::new();
    let mut short_bm = BitmapBuilder::new();

    let mut step_idx: Vec<u32> = Vec::new();
    let mut step_val: Vec<u32> = Vec::new();
    let mut ipref_idx: Vec<u32> = Vec::new();
    let mut ipref_data: Vec<Vec<u8>> = Vec::new();
    let mut lpref_idx: Vec<u32> = Vec::new();
    let mut lpref_data: Vec<&[u8]> = Vec::new();
    let mut leaves: Vec<u8> = Vec::new();

    let mut inner_cnt = 0u32;
    let mut leaf_cnt = 0u32;

    let mut queue: VecDeque<Group> = VecDeque::new();
    if !keys.is_empty() {
        queue.push_back(Group {
            s: 0,
            e: keys.len(),
            bit: 0,
        });
    }

    while let Some(Group { s, e, bit }) = queue.pop_front() {
        if e - s == 1 {
            node_type.push(false);
            let tail = &keys[s].as_ref()[(bit >> 3) as usize..];
            if opt.store_leaf_prefix() && !tail.is_empty() {
                lpref_idx.push(leaf_cnt);
                lpref_data.push(tail);
            }
            if !values.is_empty() {
                codec.encode(&values[s], &mut leaves);
            }
            leaf_cnt += 1;
            continue;
        }

        // Branch where the group first diverges, cut down to a nibble
        // boundary so labels stay within one branch word.
        let mut diff = u32::MAX;
        for j in s + 1..e {
            diff = diff.min(first_diff_bit(keys[j - 1].as_ref(), keys[j].as_ref()));
        }
        let branch = diff & !3;
        debug_assert!(branch >= bit);

        // A byte-wide branch only pays off when one nibble level cannot
        // cover the fan-out.
        let mut width = 4u32;
        if branch & 7 == 0 {
            let mut distinct = 0u32;
            let mut prev = u32::MAX;
            for k in &keys[s..e] {
                let lb = label_bit_index(k.as_ref(), k.as_ref().len() as u32 * 8, branch, 8);
                if lb != prev {
                    distinct += 1;
                    prev = lb;
                }
            }
            if distinct > 16 {
                width = 8;
            }
        }

        node_type.push(true);
        short_bm.push(width == 4);
        let span = if width == 4 { SHORT_SIZE } else { LONG_SIZE };
        let base = inners.len();
        inners.extend_zeros(span);

        if branch > bit {
            let plen = branch - (bit & !7);
            if opt.store_inner_prefix() {
                let key = keys[s].as_ref();
                let content = &key[(bit >> 3) as usize..((branch + 7) >> 3) as usize];
                let pad = (content.len() as u32 * 8 - plen) as u8;
                let mut entry = vec![pad];
                entry.extend_from_slice(content);
                ipref_idx.push(inner_cnt);
                ipref_data.push(entry);
            } else {
                step_idx.push(inner_cnt);
                step_val.push(plen);
            }
        }

        // Partition by label; equal labels are contiguous in sorted input.
        let mut j = s;
        while j < e {
            let key = keys[j].as_ref();
            let lb = label_bit_index(key, key.len() as u32 * 8, branch, width);
            let mut k = j + 1;
            while k < e {
                let next = keys[k].as_ref();
                if label_bit_index(next, next.len() as u32 * 8, branch, width) != lb {
                    break;
                }
                k += 1;
            }
            inners.set(base + lb);
            queue.push_back(Group {
                s: j,
                e: k,
                bit: branch + if lb == 0 { 0 } else { width },
            });
            j = k;
        }
        inner_cnt += 1;
    }

    let inner_prefixes = if opt.store_inner_prefix() {
        let refs: Vec<&[u8]> = ipref_data.iter().map(|v| v.as_slice()).collect();
        Some(VarBytes::from_pairs(&ipref_idx, &refs)?)
    } else {
        None
    };
    let steps = if opt.store_inner_prefix() {
        None
    } else {
        Some(PackedArray::from_pairs(codec::U32, &step_idx, &step_val)?)
    };
    let leaf_prefixes = if opt.store_leaf_prefix() {
        Some(VarBytes::from_pairs(&lpref_idx, &lpref_data)?)
    } else {
        None
    };

    Ok(NodeStore {
        node_type: node_type.finish(),
        inners: inners.finish(),
        short_bm: short_bm.finish(),
        steps,
        inner_prefixes,
        leaf_prefixes,
        leaves,
    })
}
