//! Ordered scans from a seek key.
//!
//! Scanning is two phases. `ge_path` rebuilds the root-to-leaf path of the
//! smallest key >= the seek key, tracking the best strictly-greater child
//! while descending the exact-match path. The cursor then walks a stack of
//! per-inner-node frames: each frame remembers which label it currently
//! points at and where this node's prefix and label live in the output
//! buffer, so moving to the next key only rewrites the buffer from the
//! deepest changed frame downwards.
//!
//! The output buffer is reused across `next` calls; returned key slices are
//! only valid until the next call.

#[cfg(not(test))]
use alloc::vec::Vec;

use core::cmp::Ordering;

use crate::codec::ValueCodec;

use super::store::{label_bit_index, prefix_compare, NodeStore, QuerySession, SHORT_SIZE};
use super::Trie;

impl<C: ValueCodec> Trie<C> {
    /// Scan keys in ascending order, starting at the smallest key >= `seek`.
    ///
    /// With `with_value` set, `next` also yields the encoded value bytes.
    ///
    /// # Panics
    ///
    /// Panics unless the trie was built with both inner and leaf prefixes
    /// (`TrieOpt::complete`): an incomplete trie cannot reconstruct keys.
    pub fn scan(&self, seek: &[u8], with_value: bool) -> ScanCursor<'_, C> {
        assert!(
            self.store.inner_prefixes.is_some() && self.store.leaf_prefixes.is_some(),
            "incomplete trie does not support scanning: inner and leaf prefixes are required"
        );

        let path = self.ge_path(seek);
        let mut cursor = ScanCursor {
            trie: self,
            with_value,
            buf: Vec::with_capacity(64),
            stack: Vec::with_capacity(path.len() * 2),
            pending_leaf: None,
        };
        if path.is_empty() {
            return cursor;
        }
        if path.len() == 1 {
            // a one-node trie: the root itself is the leaf
            cursor.pending_leaf = Some(path[0]);
            return cursor;
        }

        let ns = &self.store;
        let mut qr = QuerySession::default();
        let mut buf_bits = 0u32;
        for w in path.windows(2) {
            ns.load_node(w[0], &mut qr);
            let frame = Frame::init(ns, &qr, Some(w[1]), buf_bits);
            if qr.has_prefix_content {
                cursor.buf.truncate((frame.prefix_start >> 3) as usize);
                cursor.buf.extend_from_slice(qr.prefix);
            }
            // the first next() call re-writes the deepest label
            frame.append_label(&mut cursor.buf);
            buf_bits = frame.label_end;
            cursor.stack.push(frame);
        }
        cursor
    }

    /// Root-to-leaf path of the smallest key >= `seek`; empty when `seek`
    /// is past the last key.
    fn ge_path(&self, seek: &[u8]) -> Vec<u32> {
        let ns = &self.store;
        let mut path: Vec<u32> = Vec::new();
        if ns.node_count() == 0 {
            return path;
        }

        let seek_bits = seek.len() as u32 * 8;
        let mut qr = QuerySession::default();
        // smallest node id seen so far that is strictly greater than seek,
        // and the path length it branches off at
        let mut right: Option<u32> = None;
        let mut right_len = 0usize;
        let mut eq: Option<u32> = Some(0);
        let mut i = 0u32;

        while let Some(cur) = eq {
            ns.load_node(cur, &mut qr);
            if !qr.is_inner {
                break;
            }

            if qr.has_prefix_content {
                match prefix_compare(&seek[(i >> 3) as usize..], qr.prefix, qr.prefix_len) {
                    Ordering::Equal => i = (i & !7) + qr.prefix_len,
                    Ordering::Less => {
                        right = Some(cur);
                        right_len = path.len();
                        eq = None;
                        break;
                    }
                    Ordering::Greater => {
                        eq = None;
                        break;
                    }
                }
            }

            path.push(cur);

            let bit_idx = label_bit_index(seek, seek_bits, i, qr.word_size);
            let (below, has) = ns.label_rank_bit(&qr, bit_idx);
            let first = ns.first_child(&qr);
            let ch = first + below + has - 1;
            if ch + 1 <= ns.last_child(&qr) {
                right = Some(ch + 1);
                right_len = path.len();
            }
            if has == 0 {
                eq = None;
                break;
            }
            eq = Some(ch);
            if i == seek_bits {
                // the zero-width child is a leaf
                break;
            }
            i += qr.word_size;
        }

        if let Some(leaf) = eq {
            ns.load_node(leaf, &mut qr);
            let tail = &seek[(i >> 3) as usize..];
            let lp = if qr.has_leaf_prefix { qr.leaf_prefix } else { &[] };
            if tail <= lp {
                path.push(leaf);
                return path;
            }
        }

        let Some(mut id) = right else {
            path.clear();
            return path;
        };
        // discard the exact-match part, then take the smallest leaf of the
        // successor subtree
        path.truncate(right_len);
        loop {
            path.push(id);
            ns.load_node(id, &mut qr);
            if !qr.is_inner {
                return path;
            }
            id = ns.first_child(&qr);
        }
    }
}

/// Cursor state of one inner node on the current path.
struct Frame {
    first_child: u32,
    /// Index of the current label among this node's set labels
    ith_label: i32,
    /// Current bit position inside the branch bitmap, -1 before the first
    label_bit: i32,
    short: bool,
    /// Cached 17-bit bitmap when `short`
    bm: u64,
    from: u32,
    to: u32,
    /// Current label value and its width in bits (0, 4 or 8)
    label: u32,
    label_width: u32,
    /// Bit offsets into the output buffer: this node's prefix and label
    prefix_start: u32,
    prefix_end: u32,
    label_end: u32,
}

impl Frame {
    /// Initialize a frame for a loaded inner node, aimed at `child`
    /// (or at the node's first label when `None`).
    fn init(ns: &NodeStore, qr: &QuerySession, child: Option<u32>, buf_bits: u32) -> Frame {
        let prefix_start = buf_bits;
        let prefix_end = if qr.has_prefix_content {
            (buf_bits & !7) + qr.prefix_len
        } else {
            buf_bits
        };
        let first_child = ns.first_child(qr);
        let label_idx = child.map_or(0, |c| c - first_child);

        let mut frame = Frame {
            first_child,
            ith_label: label_idx as i32 - 1,
            label_bit: -1,
            short: qr.short,
            bm: if qr.short { qr.bm } else { 0 },
            from: qr.from,
            to: qr.to,
            label: 0,
            label_width: 0,
            prefix_start,
            prefix_end,
            label_end: prefix_end,
        };
        let found = frame.next_label(ns, label_idx + 1);
        debug_assert!(found, "child {} not under this node", label_idx);
        frame
    }

    /// Advance to the `n`-th next set label. Returns false when the bitmap
    /// is exhausted.
    fn next_label(&mut self, ns: &NodeStore, n: u32) -> bool {
        self.ith_label += 1;
        let span = (self.to - self.from) as i32;
        let mut need = n;
        loop {
            self.label_bit += 1;
            if self.label_bit >= span {
                return false;
            }
            let set = if self.short {
                (self.bm >> self.label_bit) & 1 == 1
            } else {
                ns.inners.get(self.from + self.label_bit as u32)
            };
            if set {
                need -= 1;
                if need == 0 {
                    break;
                }
            }
        }
        self.update_label();
        true
    }

    fn update_label(&mut self) {
        if self.label_bit == 0 {
            self.label_width = 0;
            self.label = 0;
        } else {
            self.label_width = if self.to - self.from == SHORT_SIZE { 4 } else { 8 };
            self.label = self.label_bit as u32 - 1;
        }
        self.label_end = self.prefix_end + self.label_width;
    }

    /// Write the current label into the buffer at `prefix_end`, merging into
    /// a shared byte when the position is not byte-aligned.
    fn append_label(&self, buf: &mut Vec<u8>) {
        let len = ((self.prefix_end + 7) >> 3) as usize;
        debug_assert!(len <= buf.len());
        buf.truncate(len);
        if self.label_width == 0 {
            return;
        }
        let mask = ((1u32 << self.label_width) - 1) as u8;
        if self.prefix_end & 7 != 0 {
            let merged = (buf[len - 1] & !mask) | (self.label as u8 & mask);
            buf[len - 1] = merged;
        } else {
            buf.push((self.label as u8 & mask) << (8 - self.label_width));
        }
    }
}

/// Stateful scan cursor yielding `(key, value)` pairs in ascending order.
///
/// Returned key slices alias the cursor's internal buffer and are invalidated
/// by the next [`ScanCursor::next`] call; value slices borrow from the trie.
pub struct ScanCursor<'t, C: ValueCodec> {
    trie: &'t Trie<C>,
    with_value: bool,
    buf: Vec<u8>,
    stack: Vec<Frame>,
    /// Set when the path is a bare root leaf
    pending_leaf: Option<u32>,
}

impl<'t, C: ValueCodec> ScanCursor<'t, C> {
    /// Yield the next key, or `None` when the scan is exhausted.
    ///
    /// Exhaustion is stable: further calls keep returning `None`.
    pub fn next(&mut self) -> Option<(&[u8], Option<&'t [u8]>)> {
        let trie: &'t Trie<C> = self.trie;
        let ns = &trie.store;

        if let Some(leaf) = self.pending_leaf.take() {
            let mut qr = QuerySession::default();
            ns.load_node(leaf, &mut qr);
            self.buf.clear();
            if qr.has_leaf_prefix {
                self.buf.extend_from_slice(qr.leaf_prefix);
            }
            let val = self.value_of(leaf);
            return Some((&self.buf, val));
        }
        if self.stack.is_empty() {
            return None;
        }

        // walk down to a leaf, filling the buffer
        let mut qr = QuerySession::default();
        let mut val = None;
        loop {
            let last = self.stack.last_mut().expect("descending with empty stack");
            last.append_label(&mut self.buf);
            let child = last.first_child + last.ith_label as u32;
            let label_end = last.label_end;

            ns.load_node(child, &mut qr);
            if !qr.is_inner {
                self.buf.truncate((label_end >> 3) as usize);
                if qr.has_leaf_prefix {
                    self.buf.extend_from_slice(qr.leaf_prefix);
                }
                if self.with_value {
                    val = trie.leaf_bytes(ns.leaf_index(child));
                }
                break;
            }

            let frame = Frame::init(ns, &qr, None, label_end);
            if qr.has_prefix_content {
                self.buf.truncate((frame.prefix_start >> 3) as usize);
                self.buf.extend_from_slice(qr.prefix);
            }
            self.stack.push(frame);
        }

        // drop the leaf and advance to the next label, popping exhausted
        // frames
        while let Some(last) = self.stack.last_mut() {
            if last.next_label(ns, 1) {
                break;
            }
            self.stack.pop();
        }

        Some((&self.buf, val))
    }

    fn value_of(&self, leaf: u32) -> Option<&'t [u8]> {
        if self.with_value {
            self.trie.leaf_bytes(self.trie.store.leaf_index(leaf))
        } else {
            None
        }
    }
}
