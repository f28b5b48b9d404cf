//! Internal nodes.

use crate::types::NodeId;

use super::lower_bound;

/// An internal node: `n` separator keys routing between `n + 1` children.
///
/// Every key in child `i` is less than `keys[i]`; every key in child
/// `i + 1` is greater than or equal to `keys[i]`.
pub(crate) struct InternalNode<K> {
    keys: Vec<K>,
    children: Vec<NodeId>,
}

impl<K> InternalNode<K> {
    pub(crate) fn new(order: usize) -> Self {
        Self {
            keys: Vec::with_capacity(order),
            children: Vec::with_capacity(order + 1),
        }
    }

    /// A fresh node one level above `child`, ready to receive a split
    pub(crate) fn with_first_child(order: usize, child: NodeId) -> Self {
        let mut node = Self::new(order);
        node.children.push(child);
        node
    }

    /// Rebuild an internal node from ordered keys and children
    /// (deserialization)
    pub(crate) fn from_parts(keys: Vec<K>, children: Vec<NodeId>) -> Self {
        debug_assert_eq!(children.len(), keys.len() + 1);
        Self { keys, children }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub(crate) fn child(&self, index: usize) -> NodeId {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn set_child(&mut self, index: usize, child: NodeId) {
        self.children[index] = child;
    }

    /// Swap in a new separator key, returning the old one
    pub(crate) fn replace_key(&mut self, index: usize, key: K) -> K {
        std::mem::replace(&mut self.keys[index], key)
    }
}

impl<K: Ord> InternalNode<K> {
    /// First index whose key is `>= key`, or the key count if none
    pub(crate) fn search(&self, key: &K) -> usize {
        lower_bound(&self.keys, key)
    }

    /// Insert a separator with the child holding keys to its right.
    ///
    /// Subsequent keys and children shift one slot to make room.
    pub(crate) fn insert(&mut self, key: K, right_child: NodeId) {
        let index = self.search(&key);
        self.keys.insert(index, key);
        self.children.insert(index + 1, right_child);
    }

    /// Remove the separator at `index` together with its right child slot
    pub(crate) fn remove_entry(&mut self, index: usize) -> (K, NodeId) {
        let key = self.keys.remove(index);
        let child = self.children.remove(index + 1);
        (key, child)
    }

    /// Remove and return the last separator and last child (left donation)
    pub(crate) fn pop_last(&mut self) -> Option<(K, NodeId)> {
        let key = self.keys.pop()?;
        let child = self.children.pop()?;
        Some((key, child))
    }

    /// Remove and return the first separator and first child (right donation)
    pub(crate) fn pop_front(&mut self) -> Option<(K, NodeId)> {
        if self.keys.is_empty() {
            return None;
        }
        Some((self.keys.remove(0), self.children.remove(0)))
    }

    /// Split an overfull node at `mid = order / 2`.
    ///
    /// Keys `[mid + 1, n)` and children `[mid + 1, n + 1)` move to a new
    /// right node; key `mid` is removed from both halves and returned for
    /// promotion into the parent.
    pub(crate) fn split(&mut self, order: usize) -> (K, InternalNode<K>) {
        let mid = order / 2;
        let mut right = InternalNode::new(order);
        right.keys = self.keys.split_off(mid + 1);
        right.children = self.children.split_off(mid + 1);

        let separator = match self.keys.pop() {
            Some(key) => key,
            None => unreachable!("split called on a node with no keys"),
        };
        (separator, right)
    }

    /// Absorb a right sibling, with the parent's demoted separator between
    /// the two key runs
    pub(crate) fn merge(&mut self, separator: K, mut right: InternalNode<K>) {
        self.keys.push(separator);
        self.keys.append(&mut right.keys);
        self.children.append(&mut right.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> NodeId {
        NodeId::new(n)
    }

    fn node_with(keys: &[i32]) -> InternalNode<i32> {
        // child i gets ID i for easy inspection
        let mut node = InternalNode::with_first_child(8, id(0));
        for (i, &k) in keys.iter().enumerate() {
            node.insert(k, id(i as u32 + 1));
        }
        node
    }

    #[test]
    fn test_insert_places_right_child() {
        let mut node = node_with(&[10, 30]);
        node.insert(20, id(9));
        assert_eq!(node.keys(), &[10, 20, 30]);
        assert_eq!(node.children(), &[id(0), id(1), id(9), id(2)]);
    }

    #[test]
    fn test_remove_entry_drops_right_child() {
        let mut node = node_with(&[10, 20, 30]);
        let (key, child) = node.remove_entry(1);
        assert_eq!(key, 20);
        assert_eq!(child, id(2));
        assert_eq!(node.keys(), &[10, 30]);
        assert_eq!(node.children(), &[id(0), id(1), id(3)]);
    }

    #[test]
    fn test_split_promotes_mid_key() {
        // order 4: node splits at 4 keys, mid = 2
        let mut node = node_with(&[10, 20, 30, 40]);
        let (separator, right) = node.split(4);
        assert_eq!(separator, 30);
        assert_eq!(node.keys(), &[10, 20]);
        assert_eq!(node.children(), &[id(0), id(1), id(2)]);
        assert_eq!(right.keys(), &[40]);
        assert_eq!(right.children(), &[id(3), id(4)]);
    }

    #[test]
    fn test_merge_demotes_separator() {
        let mut left = node_with(&[10]);
        let right = {
            let mut n = InternalNode::with_first_child(8, id(10));
            n.insert(40, id(11));
            n
        };
        left.merge(30, right);
        assert_eq!(left.keys(), &[10, 30, 40]);
        assert_eq!(left.children(), &[id(0), id(1), id(10), id(11)]);
    }

    #[test]
    fn test_pop_front_and_last() {
        let mut node = node_with(&[10, 20, 30]);
        assert_eq!(node.pop_front(), Some((10, id(0))));
        assert_eq!(node.pop_last(), Some((30, id(3))));
        assert_eq!(node.keys(), &[20]);
        assert_eq!(node.children(), &[id(1), id(2)]);
    }
}
