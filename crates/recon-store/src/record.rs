//! Node record types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A persisted prefix tree node
///
/// The numeric payloads are opaque to the store: `svalues` and `elements`
/// hold length-prefixed big-integer arrays written by the tree crate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Raw bit-prefix key bytes
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
    /// Number of elements stored under this node
    pub num_elements: u64,
    /// Encoded sample values
    #[serde(with = "serde_bytes")]
    pub svalues: Vec<u8>,
    /// Encoded leaf elements (empty for internal nodes)
    #[serde(with = "serde_bytes")]
    pub elements: Vec<u8>,
    /// Child indices, present iff the node is internal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_keys: Option<Vec<u32>>,
}

impl NodeRecord {
    /// Create a leaf record
    pub fn leaf(key: Vec<u8>, num_elements: u64, svalues: Vec<u8>, elements: Vec<u8>) -> Self {
        Self {
            key,
            num_elements,
            svalues,
            elements,
            child_keys: None,
        }
    }

    /// Create an internal record with `fan_out` children
    pub fn internal(key: Vec<u8>, num_elements: u64, svalues: Vec<u8>, fan_out: u32) -> Self {
        Self {
            key,
            num_elements,
            svalues,
            elements: Vec::new(),
            child_keys: Some((0..fan_out).collect()),
        }
    }

    /// Whether this record describes a leaf
    pub fn is_leaf(&self) -> bool {
        self.child_keys.is_none()
    }
}

impl fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRecord")
            .field("key", &hex::encode(&self.key))
            .field("num_elements", &self.num_elements)
            .field("svalues_len", &self.svalues.len())
            .field("elements_len", &self.elements.len())
            .field("children", &self.child_keys.as_ref().map(Vec::len))
            .finish()
    }
}
