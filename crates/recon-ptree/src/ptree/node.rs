//! Prefix tree node types

use super::BitKey;
use crate::codec::{encoded_len, encoded_value_len, read_zz_array, write_zz_array};
use crate::config::TreeConfig;
use crate::field::Zp;
use crate::{CoreError, Result};
use num_bigint::BigUint;
use recon_store::NodeRecord;
use std::fmt;
use std::sync::Arc;

/// Payload of a node
#[derive(Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Leaf holding its elements in insertion order
    Leaf(Vec<Zp>),
    /// Internal node with `fan_out` children
    Internal { fan_out: usize },
}

/// A node in the prefix tree
///
/// `svalues[j]` is the product of `point_j - e` over every element `e`
/// stored anywhere below this node.
#[derive(Clone, PartialEq, Eq)]
pub struct PrefixNode {
    key: BitKey,
    num_elements: u64,
    svalues: Vec<Zp>,
    kind: NodeKind,
}

impl PrefixNode {
    /// Create an empty leaf: no elements, every sample value one
    pub fn new_leaf(key: BitKey, num_samples: usize, modulus: &Arc<BigUint>) -> Self {
        Self {
            key,
            num_elements: 0,
            svalues: vec![Zp::one(Arc::clone(modulus)); num_samples],
            kind: NodeKind::Leaf(Vec::new()),
        }
    }

    /// The node's bit-prefix key
    pub fn key(&self) -> &BitKey {
        &self.key
    }

    /// Number of elements stored under this node
    pub fn size(&self) -> u64 {
        self.num_elements
    }

    /// Sample values of this node's sketch
    pub fn svalues(&self) -> &[Zp] {
        &self.svalues
    }

    /// Elements stored in this leaf; empty for internal nodes
    pub fn elements(&self) -> &[Zp] {
        match &self.kind {
            NodeKind::Leaf(elements) => elements,
            NodeKind::Internal { .. } => &[],
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Node payload
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Depth in levels below the root
    pub fn depth(&self, bit_quantum: usize) -> usize {
        self.key.len() / bit_quantum
    }

    /// Multiply every sample value by its delta and count the element.
    ///
    /// The new sketch is computed in full before it replaces the old one, so
    /// a failure leaves the node untouched.
    pub fn apply_delta(&mut self, delta: &[Zp]) -> Result<()> {
        if delta.len() != self.svalues.len() {
            return Err(CoreError::TreeCorruption(format!(
                "node {} keeps {} sample values but delta has {}",
                self.key,
                self.svalues.len(),
                delta.len()
            )));
        }
        let updated = self
            .svalues
            .iter()
            .zip(delta)
            .map(|(sv, d)| sv.mul(d))
            .collect::<Result<Vec<_>>>()?;
        self.svalues = updated;
        self.num_elements += 1;
        Ok(())
    }

    /// Encoded byte length of the leaf payload once `z` is appended
    pub fn payload_len_with(&self, z: &Zp) -> usize {
        encoded_len(self.elements()) + encoded_value_len(z)
    }

    /// Append an element to a leaf
    pub fn push_element(&mut self, z: Zp) -> Result<()> {
        match &mut self.kind {
            NodeKind::Leaf(elements) => {
                elements.push(z);
                Ok(())
            }
            NodeKind::Internal { .. } => Err(CoreError::TreeCorruption(format!(
                "cannot store an element in internal node {}",
                self.key
            ))),
        }
    }

    /// Turn a leaf into an internal node, returning the elements it held
    pub fn make_internal(&mut self, fan_out: usize) -> Result<Vec<Zp>> {
        match std::mem::replace(&mut self.kind, NodeKind::Internal { fan_out }) {
            NodeKind::Leaf(elements) => Ok(elements),
            NodeKind::Internal { .. } => Err(CoreError::TreeCorruption(format!(
                "node {} is already internal",
                self.key
            ))),
        }
    }

    /// Keys of every child, in index order; empty for leaves
    pub fn child_keys(&self, bit_quantum: usize) -> Vec<BitKey> {
        match self.kind {
            NodeKind::Leaf(_) => Vec::new(),
            NodeKind::Internal { fan_out } => (0..fan_out)
                .map(|i| self.key.child(i, bit_quantum))
                .collect(),
        }
    }

    /// Convert to the persisted representation
    pub fn to_record(&self) -> NodeRecord {
        let key = self.key.to_bytes();
        let svalues = write_zz_array(&self.svalues);
        match &self.kind {
            NodeKind::Leaf(elements) => {
                NodeRecord::leaf(key, self.num_elements, svalues, write_zz_array(elements))
            }
            NodeKind::Internal { fan_out } => {
                NodeRecord::internal(key, self.num_elements, svalues, *fan_out as u32)
            }
        }
    }

    /// Decode a persisted record, validating it against the tree settings
    pub fn from_record(
        record: &NodeRecord,
        config: &TreeConfig,
        modulus: &Arc<BigUint>,
    ) -> Result<Self> {
        let key = BitKey::from_bytes(&record.key)?;
        if key.len() % config.bit_quantum != 0 || key.len() > config.key_capacity() {
            return Err(CoreError::MalformedRecord(format!(
                "key {key} is not a whole number of {}-bit levels within capacity",
                config.bit_quantum
            )));
        }

        let svalues = read_zz_array(&record.svalues, modulus)?;
        if svalues.len() != config.num_samples() {
            return Err(CoreError::MalformedRecord(format!(
                "node {key} has {} sample values, expected {}",
                svalues.len(),
                config.num_samples()
            )));
        }

        let kind = match &record.child_keys {
            None => NodeKind::Leaf(read_zz_array(&record.elements, modulus)?),
            Some(children) => {
                let fan_out = config.fan_out();
                let expected = (0..fan_out as u32).collect::<Vec<_>>();
                if *children != expected {
                    return Err(CoreError::MalformedRecord(format!(
                        "node {key} lists {} children, expected {fan_out}",
                        children.len()
                    )));
                }
                if !record.elements.is_empty() {
                    return Err(CoreError::MalformedRecord(format!(
                        "internal node {key} still carries leaf elements"
                    )));
                }
                NodeKind::Internal { fan_out }
            }
        };

        if let NodeKind::Leaf(elements) = &kind {
            if (elements.len() as u64) > record.num_elements {
                return Err(CoreError::MalformedRecord(format!(
                    "leaf {key} holds {} elements but counts {}",
                    elements.len(),
                    record.num_elements
                )));
            }
        }

        Ok(Self {
            key,
            num_elements: record.num_elements,
            svalues,
            kind,
        })
    }
}

impl fmt::Debug for PrefixNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixNode")
            .field("key", &self.key)
            .field("is_leaf", &self.is_leaf())
            .field("num_elements", &self.num_elements)
            .field("leaf_elements", &self.elements().len())
            .finish()
    }
}
