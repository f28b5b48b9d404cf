//! B+ tree core implementation.
//!
//! This module provides the main `BPlusTree` struct with operations for:
//! - insert: point inserts and in-place updates
//! - remove: point deletes with borrow/merge rebalancing
//! - get: point lookups
//! - leaf_scan / level_scan: ordered and breadth-first traversal
//!
//! Mutations locate the target leaf by walking down from the root while
//! recording the path, then replay maintenance bottom-up along that path:
//! splits after an insert, borrows and merges after a remove. The leaf
//! chain is kept consistent inside leaf split/merge, never repaired after
//! the fact.

mod iter;
mod serial;

pub use iter::{LeafScan, LeafScanRev};

use crate::node::{InternalNode, LeafNode, Node, NodeArena};
use crate::types::{NodeId, TreeConfig};

/// Result of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was new; the tree grew by one entry
    Inserted,
    /// The key already existed; its value was overwritten in place
    Updated,
}

/// Result of a remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The key was present and is gone
    Removed,
    /// The key was not in the tree; nothing changed
    NotFound,
}

/// One level of the descent: an internal node and the child slot taken.
struct PathStep {
    node: NodeId,
    child: usize,
}

/// An in-memory B+ tree.
///
/// Keys are ordered by their `Ord` impl and must be `Clone` (separator keys
/// in internal nodes are copies of leaf minima). All values live in the
/// leaves, which form a doubly linked chain in ascending key order.
pub struct BPlusTree<K, V> {
    arena: NodeArena<K, V>,
    root: Option<NodeId>,
    head: Option<NodeId>,
    order: usize,
    len: usize,
}

impl<K, V> BPlusTree<K, V> {
    /// Create an empty tree with the given configuration
    pub fn new(config: TreeConfig) -> Self {
        Self {
            arena: NodeArena::new(),
            root: None,
            head: None,
            order: config.order,
            len: 0,
        }
    }

    /// Create an empty tree with a custom order (clamped to the minimum)
    pub fn with_order(order: usize) -> Self {
        Self::new(TreeConfig::new(order))
    }

    /// The node capacity this tree was built with
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of distinct keys in the tree
    pub fn len(&self) -> usize {
        self.len
    }

    /// True iff the tree holds no keys
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live nodes (diagnostic)
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Height of the tree: 0 when empty, 1 for a lone root leaf
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root;
        while let Some(id) = current {
            height += 1;
            current = match self.arena.get(id) {
                Node::Internal(internal) => Some(internal.child(0)),
                Node::Leaf(_) => None,
            };
        }
        height
    }

    fn min_keys(&self) -> usize {
        (self.order - 1) / 2
    }

    fn leaf(&self, id: NodeId) -> &LeafNode<K, V> {
        match self.arena.get(id).as_leaf() {
            Ok(leaf) => leaf,
            Err(_) => unreachable!("node {} is not a leaf", id),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode<K, V> {
        match self.arena.get_mut(id).as_leaf_mut() {
            Ok(leaf) => leaf,
            Err(_) => unreachable!("node {} is not a leaf", id),
        }
    }

    fn internal(&self, id: NodeId) -> &InternalNode<K> {
        match self.arena.get(id).as_internal() {
            Ok(internal) => internal,
            Err(_) => unreachable!("node {} is not internal", id),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode<K> {
        match self.arena.get_mut(id).as_internal_mut() {
            Ok(internal) => internal,
            Err(_) => unreachable!("node {} is not internal", id),
        }
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Walk from the root to the leaf that must contain `key`.
    ///
    /// Records every internal node visited together with the child slot
    /// taken; a key equal to a separator routes to the right subtree. The
    /// caller ensures the tree is non-empty.
    fn locate_leaf(&self, key: &K, root: NodeId) -> (NodeId, Vec<PathStep>) {
        let mut path = Vec::new();
        let mut current = root;
        loop {
            match self.arena.get(current) {
                Node::Internal(internal) => {
                    let mut child = internal.search(key);
                    if child < internal.key_count() && *internal.key(child) == *key {
                        child += 1;
                    }
                    path.push(PathStep {
                        node: current,
                        child,
                    });
                    current = internal.child(child);
                }
                Node::Leaf(_) => return (current, path),
            }
        }
    }

    /// Look up a key and return a reference to its value
    pub fn get(&self, key: &K) -> Option<&V> {
        let root = self.root?;
        let (leaf_id, _) = self.locate_leaf(key, root);
        let leaf = self.leaf(leaf_id);
        let index = leaf.search(key);
        if index < leaf.key_count() && leaf.key(index) == key {
            Some(leaf.value(index))
        } else {
            None
        }
    }

    /// Look up a key and return a mutable reference to its value
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let root = self.root?;
        let (leaf_id, _) = self.locate_leaf(key, root);
        let leaf = self.leaf_mut(leaf_id);
        let index = leaf.search(key);
        if index < leaf.key_count() && leaf.key(index) == key {
            Some(leaf.value_mut(index))
        } else {
            None
        }
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key/value pair.
    ///
    /// An already-present key has its value overwritten in place and the
    /// size is unchanged.
    pub fn insert(&mut self, key: K, value: V) -> InsertOutcome {
        let Some(root) = self.root else {
            let mut leaf = LeafNode::new(self.order);
            leaf.insert(key, value);
            let id = self.arena.alloc(Node::Leaf(leaf));
            self.root = Some(id);
            self.head = Some(id);
            self.len = 1;
            tracing::debug!(node = %id, "created root leaf");
            return InsertOutcome::Inserted;
        };

        let (leaf_id, path) = self.locate_leaf(&key, root);
        let leaf = self.leaf_mut(leaf_id);
        if leaf.has_key(&key) {
            leaf.update(&key, value);
            return InsertOutcome::Updated;
        }

        leaf.insert(key, value);
        self.len += 1;
        self.maintain_after_insert(leaf_id, path);
        InsertOutcome::Inserted
    }

    /// Split overfull nodes bottom-up along the recorded path, growing a
    /// new root if the split reaches the top.
    fn maintain_after_insert(&mut self, start: NodeId, mut path: Vec<PathStep>) {
        let mut current = start;
        while self.arena.get(current).key_count() >= self.order {
            let (separator, right_id) = self.split_node(current);
            match path.pop() {
                Some(step) => {
                    self.internal_mut(step.node).insert(separator, right_id);
                    current = step.node;
                }
                None => {
                    // the old root itself split: grow one level
                    let mut new_root = InternalNode::with_first_child(self.order, current);
                    new_root.insert(separator, right_id);
                    let root_id = self.arena.alloc(Node::Internal(new_root));
                    self.root = Some(root_id);
                    tracing::debug!(node = %root_id, "tree grew a new root");
                    break;
                }
            }
        }
    }

    /// Split one overfull node, returning the separator to promote and the
    /// new right node. A leaf split splices the new leaf into the chain.
    fn split_node(&mut self, id: NodeId) -> (K, NodeId) {
        let order = self.order;
        if self.arena.get(id).is_leaf() {
            let (separator, mut right) = self.leaf_mut(id).split(order);
            let old_next = self.leaf(id).next();
            right.set_prev(Some(id));
            right.set_next(old_next);

            let right_id = self.arena.alloc(Node::Leaf(right));
            self.leaf_mut(id).set_next(Some(right_id));
            if let Some(next_id) = old_next {
                self.leaf_mut(next_id).set_prev(Some(right_id));
            }
            (separator, right_id)
        } else {
            let (separator, right) = self.internal_mut(id).split(order);
            let right_id = self.arena.alloc(Node::Internal(right));
            (separator, right_id)
        }
    }

    /// Remove a key and its value.
    pub fn remove(&mut self, key: &K) -> RemoveOutcome {
        let Some(root) = self.root else {
            return RemoveOutcome::NotFound;
        };

        let (leaf_id, path) = self.locate_leaf(key, root);
        if self.leaf_mut(leaf_id).remove(key).is_none() {
            return RemoveOutcome::NotFound;
        }

        self.len -= 1;
        self.rebalance_after_remove(leaf_id, path);
        RemoveOutcome::Removed
    }

    /// Fix underfull nodes bottom-up along the recorded path.
    ///
    /// A borrow from either sibling settles the tree immediately; a merge
    /// removes a separator from the parent and may cascade. The recorded
    /// child slots say where each node sits under its parent, so siblings
    /// are found without re-searching by key.
    fn rebalance_after_remove(&mut self, start: NodeId, mut path: Vec<PathStep>) {
        let min_keys = self.min_keys();
        let mut current = start;

        while self.arena.get(current).key_count() < min_keys {
            let Some(step) = path.pop() else {
                break; // the root is exempt from the minimum
            };
            let parent_id = step.node;
            let index = step.child;

            let parent = self.internal(parent_id);
            let left = (index > 0).then(|| parent.child(index - 1));
            let right = (index + 1 < parent.child_count()).then(|| parent.child(index + 1));

            if let Some(left_id) = left {
                if self.arena.get(left_id).key_count() > min_keys {
                    self.borrow_from_left(parent_id, index, left_id, current);
                    return;
                }
            }
            if let Some(right_id) = right {
                if self.arena.get(right_id).key_count() > min_keys {
                    self.borrow_from_right(parent_id, index, right_id, current);
                    return;
                }
            }

            // neither sibling can lend: merge, preferring the right sibling
            if let Some(right_id) = right {
                self.merge_children(parent_id, index, current, right_id);
            } else if let Some(left_id) = left {
                self.merge_children(parent_id, index - 1, left_id, current);
            }
            current = parent_id;
        }

        self.collapse_root();
    }

    /// Move the left sibling's last entry into `node_id`, promoting the
    /// moved boundary into the parent separator.
    fn borrow_from_left(
        &mut self,
        parent_id: NodeId,
        index: usize,
        left_id: NodeId,
        node_id: NodeId,
    ) {
        if self.arena.get(node_id).is_leaf() {
            let Some((key, value)) = self.leaf_mut(left_id).pop_last() else {
                unreachable!("donor leaf {} was empty", left_id);
            };
            self.internal_mut(parent_id).replace_key(index - 1, key.clone());
            self.leaf_mut(node_id).insert(key, value);
        } else {
            let Some((donor_key, donor_child)) = self.internal_mut(left_id).pop_last() else {
                unreachable!("donor node {} was empty", left_id);
            };
            // the old separator rotates down in front of the receiver's
            // keys; the donor's last key rotates up into the parent
            let demoted = self.internal_mut(parent_id).replace_key(index - 1, donor_key);
            let node = self.internal_mut(node_id);
            let first_child = node.child(0);
            node.insert(demoted, first_child);
            node.set_child(0, donor_child);
        }
    }

    /// Move the right sibling's first entry into `node_id`, promoting the
    /// right sibling's new minimum into the parent separator.
    fn borrow_from_right(
        &mut self,
        parent_id: NodeId,
        index: usize,
        right_id: NodeId,
        node_id: NodeId,
    ) {
        if self.arena.get(node_id).is_leaf() {
            let Some((key, value)) = self.leaf_mut(right_id).pop_front() else {
                unreachable!("donor leaf {} was empty", right_id);
            };
            let promoted = match self.leaf(right_id).first_key() {
                Some(first) => first.clone(),
                None => unreachable!("donor leaf {} drained below minimum", right_id),
            };
            self.internal_mut(parent_id).replace_key(index, promoted);
            self.leaf_mut(node_id).insert(key, value);
        } else {
            let Some((promoted, first_child)) = self.internal_mut(right_id).pop_front() else {
                unreachable!("donor node {} was empty", right_id);
            };
            let demoted = self.internal_mut(parent_id).replace_key(index, promoted);
            self.internal_mut(node_id).insert(demoted, first_child);
        }
    }

    /// Merge the child right of separator `sep_index` into the child left of
    /// it, consuming the separator. Leaf merges unlink the absorbed leaf
    /// from the chain; internal merges demote the separator between the two
    /// key runs.
    fn merge_children(
        &mut self,
        parent_id: NodeId,
        sep_index: usize,
        left_id: NodeId,
        right_id: NodeId,
    ) {
        let (separator, removed) = self.internal_mut(parent_id).remove_entry(sep_index);
        debug_assert_eq!(removed, right_id);

        match self.arena.take(right_id) {
            Node::Leaf(right) => {
                let next = right.next();
                self.leaf_mut(left_id).merge(right);
                if let Some(next_id) = next {
                    self.leaf_mut(next_id).set_prev(Some(left_id));
                }
            }
            Node::Internal(right) => {
                self.internal_mut(left_id).merge(separator, right);
            }
        }
    }

    /// Shrink at the top after a remove: an empty internal root hands the
    /// tree to its only child, an empty leaf root empties the tree.
    fn collapse_root(&mut self) {
        let Some(root_id) = self.root else { return };
        if self.arena.get(root_id).key_count() > 0 {
            return;
        }

        if self.arena.get(root_id).is_leaf() {
            self.arena.free(root_id);
            self.root = None;
            self.head = None;
            tracing::debug!("tree is now empty");
        } else {
            let child = self.internal(root_id).child(0);
            self.arena.free(root_id);
            self.root = Some(child);
            tracing::debug!(node = %child, "root collapsed into its only child");
        }
    }
}

#[cfg(test)]
impl<K: Ord + Clone + std::fmt::Debug, V> BPlusTree<K, V> {
    /// Assert every structural invariant: in-node ordering, occupancy
    /// bounds, uniform leaf depth, parent/child key partitioning, and a
    /// complete, ordered leaf chain in both directions.
    pub(crate) fn check_invariants(&self) {
        let Some(root) = self.root else {
            assert!(self.head.is_none(), "empty tree kept a head");
            assert_eq!(self.len, 0, "empty tree claims {} keys", self.len);
            return;
        };

        let mut leaf_depth = None;
        let mut total = 0;
        self.check_node(root, 0, None, None, true, &mut leaf_depth, &mut total);
        assert_eq!(total, self.len, "len does not match leaf contents");

        // head must be the leftmost leaf
        let mut leftmost = root;
        while let Node::Internal(internal) = self.arena.get(leftmost) {
            leftmost = internal.child(0);
        }
        assert_eq!(self.head, Some(leftmost), "head is not the leftmost leaf");

        // forward chain covers every key in ascending order, back links agree
        let mut walked: Vec<K> = Vec::new();
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let leaf = self.leaf(id);
            assert_eq!(leaf.prev(), prev, "broken back link at node {}", id);
            walked.extend(leaf.keys().iter().cloned());
            prev = Some(id);
            cursor = leaf.next();
        }
        assert_eq!(walked.len(), self.len, "leaf chain misses keys");
        for pair in walked.windows(2) {
            assert!(pair[0] < pair[1], "leaf chain out of order");
        }
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        is_root: bool,
        leaf_depth: &mut Option<usize>,
        total: &mut usize,
    ) {
        let node = self.arena.get(id);
        let keys = node.keys();
        let max_keys = self.order - 1;

        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "node {} keys out of order", id);
        }
        if let Some(lo) = lower {
            assert!(keys.iter().all(|k| k >= lo), "node {} below its bound", id);
        }
        if let Some(hi) = upper {
            assert!(keys.iter().all(|k| k < hi), "node {} above its bound", id);
        }

        match node {
            Node::Leaf(_) => {
                if !is_root {
                    assert!(
                        keys.len() >= self.min_keys() && keys.len() <= max_keys,
                        "leaf {} occupancy {} out of bounds",
                        id,
                        keys.len()
                    );
                }
                match *leaf_depth {
                    Some(expected) => assert_eq!(expected, depth, "leaf {} off-depth", id),
                    None => *leaf_depth = Some(depth),
                }
                *total += keys.len();
            }
            Node::Internal(internal) => {
                assert_eq!(
                    internal.child_count(),
                    keys.len() + 1,
                    "node {} child count mismatch",
                    id
                );
                if is_root {
                    assert!(!keys.is_empty(), "internal root {} has no keys", id);
                } else {
                    assert!(
                        keys.len() >= self.min_keys() && keys.len() <= max_keys,
                        "node {} occupancy {} out of bounds",
                        id,
                        keys.len()
                    );
                }
                for i in 0..internal.child_count() {
                    let lo = if i == 0 { lower } else { Some(internal.key(i - 1)) };
                    let hi = if i == keys.len() { upper } else { Some(internal.key(i)) };
                    self.check_node(internal.child(i), depth + 1, lo, hi, false, leaf_depth, total);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn collect_keys(tree: &BPlusTree<i32, String>) -> Vec<i32> {
        tree.leaf_scan().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_insert_small_sequence() {
        let mut tree = BPlusTree::with_order(3);
        for key in [10, 20, 5, 15, 25, 18, 30] {
            let outcome = tree.insert(key, format!("value_{key}"));
            assert_eq!(outcome, InsertOutcome::Inserted);
        }

        assert_eq!(tree.len(), 7);
        assert_eq!(collect_keys(&tree), vec![5, 10, 15, 18, 20, 25, 30]);
        tree.check_invariants();
    }

    #[test]
    fn test_remove_small_sequence() {
        let mut tree = BPlusTree::with_order(3);
        for key in [10, 20, 5, 15, 25, 18, 30] {
            tree.insert(key, format!("value_{key}"));
        }

        assert_eq!(tree.remove(&5), RemoveOutcome::Removed);
        assert_eq!(tree.remove(&5), RemoveOutcome::NotFound);
        assert_eq!(tree.remove(&18), RemoveOutcome::Removed);
        assert_eq!(tree.remove(&100), RemoveOutcome::NotFound);

        assert_eq!(tree.len(), 5);
        assert_eq!(collect_keys(&tree), vec![10, 15, 20, 25, 30]);
        tree.check_invariants();
    }

    #[test]
    fn test_update_keeps_size() {
        let mut tree = BPlusTree::with_order(3);
        assert_eq!(tree.insert(7, "a".to_string()), InsertOutcome::Inserted);
        assert_eq!(tree.insert(7, "b".to_string()), InsertOutcome::Updated);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&7), Some(&"b".to_string()));
    }

    #[test]
    fn test_get_and_contains() {
        let mut tree = BPlusTree::with_order(4);
        for key in 0..50 {
            tree.insert(key, format!("v{key}"));
        }
        assert!(tree.contains_key(&31));
        assert_eq!(tree.get(&31), Some(&"v31".to_string()));
        assert_eq!(tree.get(&50), None);

        if let Some(value) = tree.get_mut(&31) {
            *value = "patched".to_string();
        }
        assert_eq!(tree.get(&31), Some(&"patched".to_string()));
    }

    #[test]
    fn test_empty_tree() {
        let mut tree: BPlusTree<i32, String> = BPlusTree::with_order(3);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.get(&1), None);
        assert_eq!(tree.remove(&1), RemoveOutcome::NotFound);
        assert_eq!(collect_keys(&tree), Vec::<i32>::new());
        tree.check_invariants();
    }

    #[test]
    fn test_drain_to_empty_and_reuse() {
        let mut tree = BPlusTree::with_order(3);
        for key in 0..40 {
            tree.insert(key, key.to_string());
        }
        for key in 0..40 {
            assert_eq!(tree.remove(&key), RemoveOutcome::Removed);
            tree.check_invariants();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);

        // the emptied tree must accept inserts again
        tree.insert(99, "back".to_string());
        assert_eq!(collect_keys(&tree), vec![99]);
        tree.check_invariants();
    }

    #[test]
    fn test_shuffled_permutation() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut keys: Vec<i32> = (0..1000).collect();
        keys.shuffle(&mut rng);

        let mut tree = BPlusTree::with_order(10);
        for &key in &keys {
            assert_eq!(tree.insert(key, key), InsertOutcome::Inserted);
        }

        assert_eq!(tree.len(), 1000);
        let scanned: Vec<i32> = tree.leaf_scan().map(|(k, _)| *k).collect();
        assert_eq!(scanned, (0..1000).collect::<Vec<_>>());
        tree.check_invariants();
    }

    #[test]
    fn test_descending_removal_collapses_levels() {
        let mut tree = BPlusTree::with_order(3);
        for key in 1..=60 {
            tree.insert(key, key.to_string());
        }
        let tall = tree.height();
        assert!(tall > 2);

        for key in (21..=60).rev() {
            assert_eq!(tree.remove(&key), RemoveOutcome::Removed);
            tree.check_invariants();
        }
        assert!(tree.height() < tall);
        assert_eq!(collect_keys(&tree), (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_random_workload_order_3() {
        random_workload(3, 500, 0xB7EE);
    }

    #[test]
    fn test_random_workload_order_5() {
        random_workload(5, 800, 0x5EED);
    }

    fn random_workload(order: usize, operations: usize, seed: u64) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut tree = BPlusTree::with_order(order);
        let mut model = std::collections::BTreeMap::new();

        for _ in 0..operations {
            let key: i32 = rng.gen_range(0..200);
            if rng.gen_bool(0.6) {
                let value = format!("v{key}");
                let outcome = tree.insert(key, value.clone());
                let expected = if model.insert(key, value).is_some() {
                    InsertOutcome::Updated
                } else {
                    InsertOutcome::Inserted
                };
                assert_eq!(outcome, expected);
            } else {
                let outcome = tree.remove(&key);
                let expected = if model.remove(&key).is_some() {
                    RemoveOutcome::Removed
                } else {
                    RemoveOutcome::NotFound
                };
                assert_eq!(outcome, expected);
            }

            tree.check_invariants();
            assert_eq!(tree.len(), model.len());
        }

        let scanned: Vec<(i32, String)> = tree
            .leaf_scan()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        let expected: Vec<(i32, String)> =
            model.iter().map(|(k, v)| (*k, v.clone())).collect();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn test_node_slots_are_recycled() {
        let mut tree = BPlusTree::with_order(3);
        for key in 0..100 {
            tree.insert(key, key);
        }
        let grown = tree.node_count();
        for key in 0..100 {
            tree.remove(&key);
        }
        assert_eq!(tree.node_count(), 0);

        for key in 0..100 {
            tree.insert(key, key);
        }
        assert_eq!(tree.node_count(), grown);
    }
}
