//! Ordered and breadth-first traversal.
//!
//! Traversals produce data, never output: the leaf scans are plain
//! iterators over the leaf chain, and the level scan returns the keys
//! grouped by depth and node. All of them borrow the tree immutably and can
//! be restarted by calling the constructor again.

use crate::node::Node;
use crate::types::NodeId;

use super::BPlusTree;

impl<K, V> BPlusTree<K, V> {
    /// Scan every entry in ascending key order by walking the leaf chain
    /// from the head.
    pub fn leaf_scan(&self) -> LeafScan<'_, K, V> {
        LeafScan {
            tree: self,
            leaf: self.head,
            index: 0,
        }
    }

    /// Scan every entry in descending key order by walking the leaf chain
    /// backwards from the rightmost leaf.
    pub fn leaf_scan_rev(&self) -> LeafScanRev<'_, K, V> {
        let last = self.last_leaf();
        let remaining = last.map_or(0, |id| self.leaf(id).key_count());
        LeafScanRev {
            tree: self,
            leaf: last,
            remaining,
        }
    }

    /// Collect the keys of every node, grouped by depth and then by node,
    /// in breadth-first order.
    pub fn level_scan(&self) -> Vec<Vec<Vec<K>>>
    where
        K: Clone,
    {
        let Some(root) = self.root else {
            return Vec::new();
        };

        let mut levels = Vec::new();
        let mut frontier = vec![root];
        while !frontier.is_empty() {
            let mut level = Vec::with_capacity(frontier.len());
            let mut next_frontier = Vec::new();
            for &id in &frontier {
                let node = self.arena.get(id);
                level.push(node.keys().to_vec());
                if let Node::Internal(internal) = node {
                    next_frontier.extend_from_slice(internal.children());
                }
            }
            levels.push(level);
            frontier = next_frontier;
        }
        levels
    }

    /// Export the tree structure for visualization
    pub fn export_tree(&self) -> Option<crate::TreeNode>
    where
        K: std::fmt::Display,
        V: std::fmt::Display,
    {
        self.root.map(|root| self.export_node(root))
    }

    fn export_node(&self, id: NodeId) -> crate::TreeNode
    where
        K: std::fmt::Display,
        V: std::fmt::Display,
    {
        match self.arena.get(id) {
            Node::Leaf(leaf) => crate::TreeNode {
                node_id: id.value(),
                is_leaf: true,
                keys: leaf.keys().iter().map(ToString::to_string).collect(),
                values: (0..leaf.key_count())
                    .map(|index| leaf.value(index).to_string())
                    .collect(),
                children: Vec::new(),
            },
            Node::Internal(internal) => crate::TreeNode {
                node_id: id.value(),
                is_leaf: false,
                keys: internal.keys().iter().map(ToString::to_string).collect(),
                values: Vec::new(),
                children: internal
                    .children()
                    .iter()
                    .map(|&child| self.export_node(child))
                    .collect(),
            },
        }
    }

    /// Rightmost leaf, found by descending last children from the root
    fn last_leaf(&self) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            match self.arena.get(current) {
                Node::Internal(internal) => {
                    current = internal.child(internal.child_count() - 1);
                }
                Node::Leaf(_) => return Some(current),
            }
        }
    }
}

/// Forward iterator over the leaf chain
pub struct LeafScan<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeId>,
    index: usize,
}

impl<'a, K, V> Iterator for LeafScan<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.leaf {
            let leaf = self.tree.leaf(id);
            if self.index < leaf.key_count() {
                let index = self.index;
                self.index += 1;
                return Some((leaf.key(index), leaf.value(index)));
            }
            self.leaf = leaf.next();
            self.index = 0;
        }
        None
    }
}

/// Backward iterator over the leaf chain
pub struct LeafScanRev<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeId>,
    /// Entries of the current leaf not yet yielded
    remaining: usize,
}

impl<'a, K, V> Iterator for LeafScanRev<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.leaf?;
            let leaf = self.tree.leaf(id);
            if self.remaining > 0 {
                self.remaining -= 1;
                return Some((leaf.key(self.remaining), leaf.value(self.remaining)));
            }
            self.leaf = leaf.prev();
            self.remaining = self.leaf.map_or(0, |prev| self.tree.leaf(prev).key_count());
        }
    }
}
