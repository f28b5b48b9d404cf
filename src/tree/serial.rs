//! Binary serialization.
//!
//! Layout, written and read in this exact order:
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Tree order (i32, little-endian)
//! 4       4     Key count (i32, little-endian)
//! 8       ...   Pre-order node dump
//! ```
//!
//! Every node slot starts with a 1-byte null flag (1 = absent). A present
//! node is `count: i32`, `is_leaf: u8`, then `count` keys; a leaf follows
//! with `count` values, an internal node with its `count + 1` children
//! dumped recursively left to right. Keys and values encode through
//! [`Datum`]. The leaf chain is not persisted; it is rebuilt after decode
//! from a left-to-right collection of the leaves.
//!
//! The stored order must match the order the caller expects, and every
//! count read from the stream is bounds-checked before it is trusted.

use std::io::{Read, Write};

use crate::error::{IndexError, Result};
use crate::node::{InternalNode, LeafNode, Node};
use crate::types::{Datum, NodeId, TreeConfig};

use super::BPlusTree;

impl<K, V> BPlusTree<K, V>
where
    K: Ord + Clone + Datum,
    V: Datum,
{
    /// Write the whole tree to a binary stream.
    pub fn serialize(&self, out: &mut impl Write) -> Result<()> {
        (self.order as i32).write_to(out)?;
        (self.len as i32).write_to(out)?;
        self.write_node(out, self.root)
    }

    fn write_node(&self, out: &mut impl Write, id: Option<NodeId>) -> Result<()> {
        let Some(id) = id else {
            out.write_all(&[1])?;
            return Ok(());
        };
        out.write_all(&[0])?;

        let node = self.arena.get(id);
        (node.key_count() as i32).write_to(out)?;
        out.write_all(&[u8::from(node.is_leaf())])?;
        for key in node.keys() {
            key.write_to(out)?;
        }

        match node {
            Node::Leaf(leaf) => {
                for index in 0..leaf.key_count() {
                    leaf.value(index).write_to(out)?;
                }
            }
            Node::Internal(internal) => {
                for &child in internal.children() {
                    self.write_node(out, Some(child))?;
                }
            }
        }
        Ok(())
    }

    /// Rebuild a tree from a binary stream.
    ///
    /// Fails with [`IndexError::OrderMismatch`] when the stream was written
    /// at a different order than `config` expects; no tree is produced.
    pub fn deserialize(input: &mut impl Read, config: TreeConfig) -> Result<Self> {
        let stored = i32::read_from(input)?;
        let expected = config.order as i32;
        if stored != expected {
            tracing::warn!(stored, expected, "refusing to load tree with mismatched order");
            return Err(IndexError::OrderMismatch { stored, expected });
        }

        let size = i32::read_from(input)?;
        if size < 0 {
            return Err(IndexError::corruption(format!(
                "stream claims negative key count {size}"
            )));
        }

        let mut tree = Self::new(config);
        tree.root = tree.read_node(input)?;
        tree.len = size as usize;
        tree.rebuild_leaf_chain();
        Ok(tree)
    }

    fn read_node(&mut self, input: &mut impl Read) -> Result<Option<NodeId>> {
        let mut flag = [0u8; 1];
        input.read_exact(&mut flag)?;
        if flag[0] != 0 {
            return Ok(None);
        }

        let count = i32::read_from(input)?;
        let mut kind = [0u8; 1];
        input.read_exact(&mut kind)?;
        let is_leaf = kind[0] != 0;

        // a stored node always has at least one key and fewer than `order`
        if count < 1 || count as usize > self.order - 1 {
            return Err(IndexError::corruption(format!(
                "node claims {count} keys at order {}",
                self.order
            )));
        }
        let count = count as usize;

        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            keys.push(K::read_from(input)?);
        }

        if is_leaf {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(V::read_from(input)?);
            }
            let id = self.arena.alloc(Node::Leaf(LeafNode::from_parts(keys, values)));
            Ok(Some(id))
        } else {
            let mut children = Vec::with_capacity(count + 1);
            for _ in 0..=count {
                match self.read_node(input)? {
                    Some(child) => children.push(child),
                    None => {
                        return Err(IndexError::corruption(
                            "internal node is missing a child",
                        ));
                    }
                }
            }
            let id = self
                .arena
                .alloc(Node::Internal(InternalNode::from_parts(keys, children)));
            Ok(Some(id))
        }
    }

    /// Relink the leaf chain from a depth-first, left-to-right collection
    /// of the leaves.
    fn rebuild_leaf_chain(&mut self) {
        let Some(root) = self.root else {
            self.head = None;
            return;
        };

        let mut leaves = Vec::new();
        self.collect_leaves(root, &mut leaves);
        self.head = leaves.first().copied();

        for pair in leaves.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            self.leaf_mut(left).set_next(Some(right));
            self.leaf_mut(right).set_prev(Some(left));
        }
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match self.arena.get(id) {
            Node::Leaf(_) => out.push(id),
            Node::Internal(internal) => {
                for &child in internal.children() {
                    self.collect_leaves(child, out);
                }
            }
        }
    }
}
