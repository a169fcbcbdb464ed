//! A watermark-gated, copy-on-write treap over an [`Arena`].
//!
//! This is the "ordered directory index" of spec.md §4.3, reused verbatim
//! (same type, same rotation logic) as the interner's lookup index per
//! spec.md §4.2's "the interner maintains its own ordered index (the same
//! ordered-index abstraction used inside directories)".
//!
//! Every write (`set_by`/`remove_by`) walks from the subtree root to the
//! target key. At each node visited, if the node's own arena offset is
//! still below the `committed` watermark passed in, the node is cloned
//! (its fields copied into a freshly pushed arena slot) before any of its
//! child pointers are changed; a node already in the mutable region is
//! updated through `Arena::get_mut` instead. Everything off the search
//! path — which, for a balanced treap, is the overwhelming majority of the
//! tree — is never touched and is shared by both the old and new root,
//! which is exactly the O(1) subtree-copy trick spec.md's Design Notes
//! call out as the point of the watermark design.
//!
//! Ordering is always by `K`'s comparator, supplied per call as an
//! `Fn(&K, &K) -> Ordering` rather than via the `Ord` trait, so the same
//! implementation can order directory entries by raw `StringId` value and
//! the interner's lookup index by the bytes a `StringId` refers to (a
//! comparison that needs the byte arena as context, not just the ids).

use std::cmp::Ordering;

use crate::arena::{Arena, NIL};
use crate::error::Result;

/// One node of the treap: a key/value pair, a heap-ordering priority, and
/// offsets of its two children (`NIL` meaning absent).
#[derive(Debug, Clone, Copy)]
pub struct TreapNode<K, V> {
    pub key: K,
    pub value: V,
    pub priority: u32,
    pub left: u32,
    pub right: u32,
}

/// An ordered index over `(K, V)` pairs, backed by an arena of
/// [`TreapNode`]s shared across every revision that references it.
#[derive(Debug, Default)]
pub struct Treap<K, V> {
    nodes: Arena<TreapNode<K, V>>,
}

/// Deterministic priority for `key`, mixed with an insertion counter so
/// repeated keys (after delete+reinsert) still get distinct priorities.
/// Any deterministic function is correct here — the heap property only
/// affects balance, never the in-order (ascending key) iteration order
/// that spec.md's invariants actually require.
pub fn priority_of(counter: u32) -> u32 {
    let mut x = counter.wrapping_add(0x9E37_79B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    x ^= x >> 16;
    x
}

impl<K: Copy, V: Copy> Treap<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Treap {
            nodes: Arena::with_capacity(capacity),
        }
    }

    pub fn committed(&self) -> u32 {
        self.nodes.committed()
    }

    pub fn commit(&mut self) {
        self.nodes.commit()
    }

    pub fn reset(&mut self) {
        self.nodes.reset()
    }

    pub fn arena(&self) -> &Arena<TreapNode<K, V>> {
        &self.nodes
    }

    pub fn arena_mut(&mut self) -> &mut Arena<TreapNode<K, V>> {
        &mut self.nodes
    }

    fn node(&self, off: u32) -> TreapNode<K, V> {
        *self.nodes.get(off).expect("dangling treap offset")
    }

    /// Clone-or-mutate-in-place: rebuild the node at `off` with new child
    /// pointers, respecting the watermark.
    fn rebuild(
        &mut self,
        off: u32,
        mut node: TreapNode<K, V>,
        left: u32,
        right: u32,
        committed: u32,
    ) -> Result<u32> {
        node.left = left;
        node.right = right;
        if off < committed {
            self.nodes.push(node)
        } else {
            *self.nodes.get_mut(off) = node;
            Ok(off)
        }
    }

    /// Look up `key` in the subtree rooted at `root`, returning its value.
    pub fn search_by(
        &self,
        mut root: u32,
        key: &K,
        cmp: impl Fn(&K, &K) -> Ordering,
    ) -> Option<&V> {
        while root != NIL {
            let node = self.nodes.get(root).expect("dangling treap offset");
            match cmp(key, &node.key) {
                Ordering::Less => root = node.left,
                Ordering::Greater => root = node.right,
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    fn fix_left(&mut self, off: u32, committed: u32) -> Result<u32> {
        let node = self.node(off);
        if node.left == NIL {
            return Ok(off);
        }
        let left = self.node(node.left);
        if left.priority > node.priority {
            self.rotate_right(off, committed)
        } else {
            Ok(off)
        }
    }

    fn fix_right(&mut self, off: u32, committed: u32) -> Result<u32> {
        let node = self.node(off);
        if node.right == NIL {
            return Ok(off);
        }
        let right = self.node(node.right);
        if right.priority > node.priority {
            self.rotate_left(off, committed)
        } else {
            Ok(off)
        }
    }

    /// Promote `off`'s left child to subtree root.
    fn rotate_right(&mut self, off: u32, committed: u32) -> Result<u32> {
        let node = self.node(off);
        let left = self.node(node.left);
        let new_top = self.rebuild(off, node, left.right, node.right, committed)?;
        self.rebuild(node.left, left, left.left, new_top, committed)
    }

    /// Promote `off`'s right child to subtree root.
    fn rotate_left(&mut self, off: u32, committed: u32) -> Result<u32> {
        let node = self.node(off);
        let right = self.node(node.right);
        let new_top = self.rebuild(off, node, node.left, right.left, committed)?;
        self.rebuild(node.right, right, new_top, right.right, committed)
    }

    /// Insert-or-update `key` in the subtree rooted at `root`. Returns the
    /// new subtree root and the previous value, if `key` was already
    /// present (spec.md's `replace` contract needs the old value back).
    #[allow(clippy::too_many_arguments)]
    pub fn set_by(
        &mut self,
        root: u32,
        key: K,
        value: V,
        priority: u32,
        committed: u32,
        cmp: impl Fn(&K, &K) -> Ordering + Copy,
    ) -> Result<(u32, Option<V>)> {
        if root == NIL {
            let off = self.nodes.push(TreapNode {
                key,
                value,
                priority,
                left: NIL,
                right: NIL,
            })?;
            return Ok((off, None));
        }
        let node = self.node(root);
        match cmp(&key, &node.key) {
            Ordering::Equal => {
                let old = node.value;
                let mut updated = node;
                updated.value = value;
                let off = self.rebuild(root, updated, node.left, node.right, committed)?;
                Ok((off, Some(old)))
            }
            Ordering::Less => {
                let (new_left, old) = self.set_by(node.left, key, value, priority, committed, cmp)?;
                let off = self.rebuild(root, node, new_left, node.right, committed)?;
                Ok((self.fix_left(off, committed)?, old))
            }
            Ordering::Greater => {
                let (new_right, old) =
                    self.set_by(node.right, key, value, priority, committed, cmp)?;
                let off = self.rebuild(root, node, node.left, new_right, committed)?;
                Ok((self.fix_right(off, committed)?, old))
            }
        }
    }

    /// Merge two subtrees that are known to be split by key (everything
    /// under `left` orders before everything under `right`), preserving
    /// heap order. Used by [`Treap::remove_by`] to splice out a node.
    fn merge(&mut self, left: u32, right: u32, committed: u32) -> Result<u32> {
        if left == NIL {
            return Ok(right);
        }
        if right == NIL {
            return Ok(left);
        }
        let ln = self.node(left);
        let rn = self.node(right);
        if ln.priority >= rn.priority {
            let new_right = self.merge(ln.right, right, committed)?;
            self.rebuild(left, ln, ln.left, new_right, committed)
        } else {
            let new_left = self.merge(left, rn.left, committed)?;
            self.rebuild(right, rn, new_left, rn.right, committed)
        }
    }

    /// Remove `key` from the subtree rooted at `root`, if present. Returns
    /// the new subtree root and the removed value.
    pub fn remove_by(
        &mut self,
        root: u32,
        key: &K,
        committed: u32,
        cmp: impl Fn(&K, &K) -> Ordering + Copy,
    ) -> Result<(u32, Option<V>)> {
        if root == NIL {
            return Ok((NIL, None));
        }
        let node = self.node(root);
        match cmp(key, &node.key) {
            Ordering::Less => {
                let (new_left, old) = self.remove_by(node.left, key, committed, cmp)?;
                Ok((self.rebuild(root, node, new_left, node.right, committed)?, old))
            }
            Ordering::Greater => {
                let (new_right, old) = self.remove_by(node.right, key, committed, cmp)?;
                Ok((
                    self.rebuild(root, node, node.left, new_right, committed)?,
                    old,
                ))
            }
            Ordering::Equal => {
                let new_root = self.merge(node.left, node.right, committed)?;
                Ok((new_root, Some(node.value)))
            }
        }
    }

    /// Number of entries in the subtree rooted at `root` (used sparingly —
    /// callers maintain their own counts rather than recomputing this).
    pub fn count(&self, root: u32) -> u32 {
        if root == NIL {
            return 0;
        }
        let node = self.node(root);
        1 + self.count(node.left) + self.count(node.right)
    }

    /// An in-order cursor over the subtree rooted at `root`, yielding
    /// `(&K, &V)` pairs in ascending key order.
    pub fn iter(&self, root: u32) -> TreapIter<'_, K, V> {
        let mut stack = Vec::new();
        Self::push_left_spine(&self.nodes, root, &mut stack);
        TreapIter {
            nodes: &self.nodes,
            stack,
        }
    }

    fn push_left_spine(nodes: &Arena<TreapNode<K, V>>, mut off: u32, stack: &mut Vec<u32>) {
        while off != NIL {
            stack.push(off);
            off = nodes.get(off).expect("dangling treap offset").left;
        }
    }
}

/// In-order iterator over a [`Treap`] subtree.
pub struct TreapIter<'a, K, V> {
    nodes: &'a Arena<TreapNode<K, V>>,
    stack: Vec<u32>,
}

impl<'a, K, V> Iterator for TreapIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let off = self.stack.pop()?;
        let node = self.nodes.get(off).expect("dangling treap offset");
        let mut right = node.right;
        while right != NIL {
            self.stack.push(right);
            right = self.nodes.get(right).expect("dangling treap offset").left;
        }
        Some((&node.key, &node.value))
    }
}
