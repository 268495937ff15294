// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

/// Opaque handle to an entry of a [`PairingHeap`], valid until that entry is popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(usize);

#[derive(Debug)]
struct Node<P> {
    key: f64,
    payload: Option<P>,
    // Parent when this node is a first child, left sibling otherwise.
    prev: Option<usize>,
    child: Option<usize>,
    next: Option<usize>,
}

/// Min-ordered pairing heap with decrease-key, stored in an index arena.
///
/// Every node's key is <= the keys of its descendants. Merging two trees makes
/// the one with the larger root the first child of the other. `pop` combines the
/// root's children with a two-pass pairwise merge (left to right, then right to
/// left). Operations are amortized O(log n); a single pop can cost O(n).
///
/// Entries with equal keys come out in an order decided by the merge structure,
/// not in insertion order.
#[derive(Debug)]
pub struct PairingHeap<P> {
    nodes: Vec<Node<P>>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
    scratch: Vec<usize>,
}

impl<P> Default for PairingHeap<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PairingHeap<P> {
    /// Create an empty heap.
    pub fn new() -> Self {
        PairingHeap {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            scratch: Vec::with_capacity(8),
        }
    }

    /// Create an empty heap with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut heap = Self::new();
        heap.nodes.reserve(capacity);
        heap
    }

    /// True if no entries are queued.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Insert an entry and return its handle.
    pub fn push(&mut self, key: f64, payload: P) -> NodeHandle {
        let node = Node {
            key,
            payload: Some(payload),
            prev: None,
            child: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.root = Some(match self.root {
            None => idx,
            Some(root) => self.link(root, idx),
        });
        self.len += 1;
        NodeHandle(idx)
    }

    /// The minimum key and its payload, without removing it.
    pub fn peek(&self) -> Option<(f64, &P)> {
        let node = &self.nodes[self.root?];
        node.payload.as_ref().map(|p| (node.key, p))
    }

    /// Remove and return the entry with the minimum key.
    pub fn pop(&mut self) -> Option<(f64, P)> {
        let root = self.root?;
        self.root = match self.nodes[root].child.take() {
            None => None,
            Some(first) => Some(self.combine_siblings(first)),
        };
        self.len -= 1;
        self.free.push(root);
        let node = &mut self.nodes[root];
        node.payload.take().map(|p| (node.key, p))
    }

    /// Current key of a queued entry.
    pub fn key(&self, handle: NodeHandle) -> f64 {
        self.nodes[handle.0].key
    }

    /// Lower the key of a queued entry.
    ///
    /// Does nothing unless `key` is strictly smaller than the current key. The
    /// handle must refer to an entry that has not been popped yet.
    pub fn decrease_key(&mut self, handle: NodeHandle, key: f64) {
        let idx = handle.0;
        debug_assert!(self.nodes[idx].payload.is_some(), "stale heap handle");
        if !(key < self.nodes[idx].key) {
            return;
        }
        self.nodes[idx].key = key;
        let Some(root) = self.root else {
            return;
        };
        if idx == root {
            return;
        }

        // Cut the subtree out of its sibling list, then merge it with the root.
        let prev = self.nodes[idx].prev.take();
        let next = self.nodes[idx].next.take();
        if let Some(p) = prev {
            if self.nodes[p].child == Some(idx) {
                self.nodes[p].child = next;
            } else {
                self.nodes[p].next = next;
            }
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        self.root = Some(self.link(root, idx));
    }

    /// Drop every entry. Outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.scratch.clear();
        self.root = None;
        self.len = 0;
    }

    /// Merge two detached trees and return the new root. Ties keep `a` on top.
    fn link(&mut self, a: usize, b: usize) -> usize {
        let (parent, child) = if self.nodes[b].key < self.nodes[a].key {
            (b, a)
        } else {
            (a, b)
        };
        let old_first = self.nodes[parent].child;
        self.nodes[child].next = old_first;
        if let Some(f) = old_first {
            self.nodes[f].prev = Some(child);
        }
        self.nodes[child].prev = Some(parent);
        self.nodes[parent].child = Some(child);
        parent
    }

    fn combine_siblings(&mut self, first: usize) -> usize {
        let mut trees = std::mem::take(&mut self.scratch);
        trees.clear();

        let mut cursor = Some(first);
        while let Some(idx) = cursor {
            cursor = self.nodes[idx].next.take();
            self.nodes[idx].prev = None;
            trees.push(idx);
        }

        // First pass: pair up neighbors left to right.
        let mut paired = 0;
        let mut i = 0;
        while i + 1 < trees.len() {
            trees[paired] = self.link(trees[i], trees[i + 1]);
            paired += 1;
            i += 2;
        }
        if i < trees.len() {
            trees[paired] = trees[i];
            paired += 1;
        }

        // Second pass: fold right to left.
        let mut acc = trees[paired - 1];
        for j in (0..paired - 1).rev() {
            acc = self.link(trees[j], acc);
        }

        self.scratch = trees;
        acc
    }
}
