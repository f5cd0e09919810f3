//! Consistent hashing implementation with virtual nodes.
//!
//! Each cluster member is represented by multiple virtual nodes (vnodes) on
//! a 64-bit ring so that partitions spread evenly and a membership change
//! only moves the partitions adjacent to the affected member's vnodes.

use crate::types::NodeName;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Number of virtual nodes per physical node.
/// More vnodes = more even distribution but higher memory usage.
pub const DEFAULT_VNODES_PER_NODE: usize = 256;

/// A consistent hash ring mapping string keys to cluster member names.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Virtual nodes mapped to their owning member.
    /// The key is the hash position on the ring.
    vnodes: BTreeMap<u64, NodeName>,

    /// Number of virtual nodes per member.
    vnodes_per_node: usize,

    /// Members in the ring, sorted.
    nodes: Vec<NodeName>,
}

impl HashRing {
    /// Create a new empty hash ring.
    pub fn new() -> Self {
        Self::with_vnodes(DEFAULT_VNODES_PER_NODE)
    }

    /// Create a new hash ring with custom vnode count.
    pub fn with_vnodes(vnodes_per_node: usize) -> Self {
        Self {
            vnodes: BTreeMap::new(),
            vnodes_per_node: vnodes_per_node.max(1),
            nodes: Vec::new(),
        }
    }

    /// Create a ring populated with `nodes`.
    pub fn from_nodes<I, S>(vnodes_per_node: usize, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeName>,
    {
        let mut ring = Self::with_vnodes(vnodes_per_node);
        ring.add_nodes(nodes);
        ring
    }

    /// Get the number of virtual nodes per member.
    pub fn vnodes_per_node(&self) -> usize {
        self.vnodes_per_node
    }

    /// Get the number of members in the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the ring has no members.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get all members in the ring, sorted by name.
    pub fn nodes(&self) -> &[NodeName] {
        &self.nodes
    }

    /// Check if a member is in the ring.
    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.binary_search_by(|n| n.as_str().cmp(node)).is_ok()
    }

    /// Add a member to the ring.
    ///
    /// Only the positions of the new member's vnodes change hands. When two
    /// vnodes collide on a position the smaller name keeps it, so the ring
    /// layout does not depend on insertion order.
    pub fn add_node(&mut self, node: impl Into<NodeName>) {
        let node = node.into();
        let idx = match self.nodes.binary_search(&node) {
            Ok(_) => return,
            Err(idx) => idx,
        };

        for i in 0..self.vnodes_per_node {
            let hash = Self::vnode_hash(&node, i);
            match self.vnodes.get(&hash) {
                Some(existing) if existing < &node => {}
                _ => {
                    self.vnodes.insert(hash, node.clone());
                }
            }
        }

        self.nodes.insert(idx, node);
    }

    /// Remove a member from the ring.
    pub fn remove_node(&mut self, node: &str) {
        let idx = match self.nodes.binary_search_by(|n| n.as_str().cmp(node)) {
            Ok(idx) => idx,
            Err(_) => return,
        };
        self.nodes.remove(idx);

        for i in 0..self.vnodes_per_node {
            let hash = Self::vnode_hash(node, i);
            if self.vnodes.get(&hash).map(String::as_str) == Some(node) {
                self.vnodes.remove(&hash);
            }
        }
    }

    /// Add several members.
    pub fn add_nodes<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeName>,
    {
        for node in nodes {
            self.add_node(node);
        }
    }

    /// Remove several members.
    pub fn del_nodes<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            self.remove_node(node.as_ref());
        }
    }

    /// Get the member owning `key`.
    ///
    /// Returns None if the ring is empty.
    pub fn get_node(&self, key: &str) -> Option<&str> {
        self.get_owner_at_position(Self::hash_key(key.as_bytes()))
    }

    /// Check if `node` owns `key`.
    pub fn is_owner(&self, key: &str, node: &str) -> bool {
        self.get_node(key) == Some(node)
    }

    /// Get the distribution of keys across members for a sample.
    ///
    /// This is useful for testing/monitoring key distribution.
    pub fn get_distribution(&self, sample_size: usize) -> HashMap<NodeName, usize> {
        let mut distribution = HashMap::new();

        for i in 0..sample_size {
            let key = format!("sample_key_{}", i);
            if let Some(owner) = self.get_node(&key) {
                *distribution.entry(owner.to_string()).or_insert(0) += 1;
            }
        }

        distribution
    }

    /// Get the member that owns a specific position on the ring.
    fn get_owner_at_position(&self, hash: u64) -> Option<&str> {
        // Find the first vnode >= hash, or wrap around
        self.vnodes
            .range(hash..)
            .next()
            .or_else(|| self.vnodes.iter().next())
            .map(|(_, node)| node.as_str())
    }

    fn vnode_hash(node: &str, index: usize) -> u64 {
        let vnode_key = format!("{}:{}", node, index);
        Self::hash_key(vnode_key.as_bytes())
    }

    /// Calculate the hash of a key using xxHash64.
    fn hash_key(key: &[u8]) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        key.hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}
