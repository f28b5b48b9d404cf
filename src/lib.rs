//! # B+ Tree Index
//!
//! An in-memory ordered index: a generic B+ tree with point inserts and
//! deletes, ascending and descending range scans over a doubly linked leaf
//! chain, and binary persistence.
//!
//! ## Architecture
//!
//! The crate is composed of small, layered components:
//!
//! - **Node Model** (`node`): leaf/internal node shapes, local node
//!   operations, and the arena the nodes live in
//! - **Tree Layer** (`tree`): descent with path tracking, split-driven
//!   insertion, borrow/merge-driven deletion, traversal, serialization
//! - **Facade** (`Index`): a shared handle serializing writers behind one
//!   lock while scans share read access
//!
//! ## Usage
//!
//! ```rust
//! use bptree_index::{BPlusTree, InsertOutcome};
//!
//! let mut tree = BPlusTree::with_order(10);
//! tree.insert(7, "seven".to_string());
//! assert_eq!(tree.insert(7, "VII".to_string()), InsertOutcome::Updated);
//!
//! for (key, value) in tree.leaf_scan() {
//!     println!("{key} -> {value}");
//! }
//! ```
//!
//! There is no durability log, no page cache, and no transaction layer;
//! the tree is an indexing primitive, not a storage engine.

pub mod error;
mod node;
pub mod tree;
pub mod types;

pub use error::{IndexError, Result};
pub use tree::{BPlusTree, InsertOutcome, LeafScan, LeafScanRev, RemoveOutcome};
pub use types::{Datum, NodeId, TreeConfig, DEFAULT_ORDER, MIN_ORDER};

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Node snapshot for visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Arena slot of the node
    pub node_id: u32,
    /// Whether this is a leaf node
    pub is_leaf: bool,
    /// Keys in this node
    pub keys: Vec<String>,
    /// Values (only for leaf nodes)
    pub values: Vec<String>,
    /// Child nodes (only for internal nodes)
    pub children: Vec<TreeNode>,
}

/// Index statistics
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Number of distinct keys
    pub len: usize,
    /// Height of the tree (0 when empty)
    pub height: usize,
    /// Number of live nodes
    pub node_count: usize,
}

/// Shared handle to a B+ tree.
///
/// This is the primary interface for embedding the index in a larger
/// system: all mutation is serialized behind a single writer lock, and
/// scans take shared read access, so one `Index` can be cloned across
/// threads freely. Code that owns its tree exclusively can use
/// [`BPlusTree`] directly and let the borrow checker enforce the
/// single-writer rule instead.
pub struct Index<K, V> {
    tree: Arc<RwLock<BPlusTree<K, V>>>,
}

impl<K, V> Clone for Index<K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
        }
    }
}

impl<K: Ord + Clone, V> Index<K, V> {
    /// Create an empty index with the given configuration
    pub fn new(config: TreeConfig) -> Self {
        Self {
            tree: Arc::new(RwLock::new(BPlusTree::new(config))),
        }
    }

    /// Create an empty index with a custom order (clamped to the minimum)
    pub fn with_order(order: usize) -> Self {
        Self::new(TreeConfig::new(order))
    }

    /// Insert or update a key/value pair
    pub fn insert(&self, key: K, value: V) -> InsertOutcome {
        self.tree.write().insert(key, value)
    }

    /// Remove a key/value pair
    pub fn remove(&self, key: &K) -> RemoveOutcome {
        self.tree.write().remove(key)
    }

    /// Check if a key exists
    pub fn contains(&self, key: &K) -> bool {
        self.tree.read().contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    /// True iff the index holds no keys
    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    /// Get statistics about the index
    pub fn stats(&self) -> IndexStats {
        let tree = self.tree.read();
        IndexStats {
            len: tree.len(),
            height: tree.height(),
            node_count: tree.node_count(),
        }
    }

    /// Collect the keys of every node, grouped by depth and then by node
    pub fn levels(&self) -> Vec<Vec<Vec<K>>> {
        self.tree.read().level_scan()
    }
}

impl<K: Ord + Clone, V: Clone> Index<K, V> {
    /// Get a value by key
    pub fn get(&self, key: &K) -> Option<V> {
        self.tree.read().get(key).cloned()
    }

    /// Collect all key/value pairs in ascending key order
    pub fn scan(&self) -> Vec<(K, V)> {
        self.tree
            .read()
            .leaf_scan()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K, V> Index<K, V>
where
    K: Ord + Clone + Datum,
    V: Datum,
{
    /// Write the index to a binary stream
    pub fn serialize_to(&self, out: &mut impl Write) -> Result<()> {
        self.tree.read().serialize(out)
    }

    /// Rebuild an index from a binary stream written at the same order
    pub fn deserialize_from(input: &mut impl Read, config: TreeConfig) -> Result<Self> {
        let tree = BPlusTree::deserialize(input, config)?;
        Ok(Self {
            tree: Arc::new(RwLock::new(tree)),
        })
    }
}

impl<K, V> Index<K, V>
where
    K: Ord + Clone + fmt::Display,
    V: fmt::Display,
{
    /// Export the tree structure for visualization
    pub fn export_tree(&self) -> Option<TreeNode> {
        self.tree.read().export_tree()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let index: Index<String, String> = Index::with_order(4);

        // insert and get
        assert_eq!(
            index.insert("key1".to_string(), "value1".to_string()),
            InsertOutcome::Inserted
        );
        assert_eq!(index.get(&"key1".to_string()), Some("value1".to_string()));

        // update
        assert_eq!(
            index.insert("key1".to_string(), "value2".to_string()),
            InsertOutcome::Updated
        );
        assert_eq!(index.get(&"key1".to_string()), Some("value2".to_string()));

        // delete
        assert_eq!(index.remove(&"key1".to_string()), RemoveOutcome::Removed);
        assert_eq!(index.get(&"key1".to_string()), None);

        // non-existent key
        assert_eq!(index.get(&"nope".to_string()), None);
        assert_eq!(index.remove(&"nope".to_string()), RemoveOutcome::NotFound);
        assert!(index.is_empty());
    }

    #[test]
    fn test_scan_is_ordered() {
        let index: Index<String, i32> = Index::with_order(3);
        index.insert("banana".to_string(), 2);
        index.insert("apple".to_string(), 1);
        index.insert("date".to_string(), 4);
        index.insert("cherry".to_string(), 3);

        let scanned = index.scan();
        let keys: Vec<&str> = scanned.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["apple", "banana", "cherry", "date"]);
    }

    #[test]
    fn test_stats() {
        let index: Index<i32, i32> = Index::with_order(3);
        for key in 0..30 {
            index.insert(key, key);
        }
        let stats = index.stats();
        assert_eq!(stats.len, 30);
        assert!(stats.height >= 3);
        assert!(stats.node_count >= stats.height);
    }

    #[test]
    fn test_shared_across_threads() {
        let index: Index<i32, i32> = Index::with_order(10);

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for key in (t * 100)..(t * 100 + 100) {
                        index.insert(key, key);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(index.len(), 400);
        let scanned: Vec<i32> = index.scan().into_iter().map(|(k, _)| k).collect();
        assert_eq!(scanned, (0..400).collect::<Vec<_>>());
    }

    #[test]
    fn test_export_tree_to_json() {
        let index: Index<i32, String> = Index::with_order(3);
        for key in [10, 20, 5] {
            index.insert(key, format!("v{key}"));
        }

        let export = index.export_tree().expect("non-empty tree exports");
        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"isLeaf\""));
        assert!(json.contains("v10"));

        let empty: Index<i32, String> = Index::with_order(3);
        assert!(empty.export_tree().is_none());
    }

    #[test]
    fn test_facade_roundtrip() -> Result<()> {
        let index: Index<i32, i32> = Index::with_order(3);
        for key in 0..50 {
            index.insert(key, key * 10);
        }

        let mut buf = Vec::new();
        index.serialize_to(&mut buf)?;
        let restored = Index::<i32, i32>::deserialize_from(&mut buf.as_slice(), TreeConfig::new(3))?;

        assert_eq!(restored.len(), 50);
        assert_eq!(restored.scan(), index.scan());
        Ok(())
    }
}
