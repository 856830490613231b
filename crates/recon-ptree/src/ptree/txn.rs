//! Staged insert transactions
//!
//! An insert touches every node on the element's path and, on a split, a
//! whole set of new children. All of those writes are staged here and handed
//! to the store as one atomic commit, so readers never observe an internal
//! node with a partial child set.

use super::{BitKey, PrefixNode, PrefixTree};
use crate::field::Zp;
use crate::{CoreError, Result};
use recon_store::NodeStore;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, trace};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pending node writes for a single insert
pub(crate) struct InsertTxn<'t, S: NodeStore> {
    tree: &'t PrefixTree<S>,
    staged: HashMap<BitKey, PrefixNode>,
    order: Vec<BitKey>,
    splits: usize,
}

impl<'t, S: NodeStore> InsertTxn<'t, S> {
    pub(crate) fn new(tree: &'t PrefixTree<S>) -> Self {
        Self {
            tree,
            staged: HashMap::new(),
            order: Vec::new(),
            splits: 0,
        }
    }

    /// Read a node, preferring this transaction's own pending writes
    async fn load(&self, key: &BitKey, depth: usize) -> Result<PrefixNode> {
        if let Some(node) = self.staged.get(key) {
            return Ok(node.clone());
        }
        trace!(key = %key, "loading node from store");
        match self.tree.node(key).await {
            // Below the root every node on the path is claimed by its parent
            Err(CoreError::NotFound(_)) if depth > 0 => Err(CoreError::TreeCorruption(format!(
                "child {key} of an internal node is missing"
            ))),
            other => other,
        }
    }

    fn stage(&mut self, node: PrefixNode) {
        let key = node.key().clone();
        if self.staged.insert(key.clone(), node).is_none() {
            self.order.push(key);
        }
    }

    /// Insert `z` into the subtree at `key`, which sits at level `depth`
    pub(crate) fn insert_at<'a>(
        &'a mut self,
        key: BitKey,
        z: &'a Zp,
        delta: &'a [Zp],
        bits: &'a BitKey,
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let tree = self.tree;
            let config = tree.config();
            let mut node = self.load(&key, depth).await?;
            node.apply_delta(delta)?;

            if node.is_leaf() {
                let over = node.payload_len_with(z) > config.split_threshold();
                if !over || !tree.can_split(depth) {
                    node.push_element(z.clone())?;
                    self.stage(node);
                    return Ok(());
                }
                self.split(node, depth).await?;
            } else {
                self.stage(node);
            }

            let child = key.child(bits.index_at(depth, config.bit_quantum), config.bit_quantum);
            self.insert_at(child, z, delta, bits, depth + 1).await
        })
    }

    /// Replace a leaf by `2^bitQuantum` fresh children and re-insert its
    /// elements below it, rebuilding every child sketch from scratch
    async fn split(&mut self, mut node: PrefixNode, depth: usize) -> Result<()> {
        let tree = self.tree;
        let config = tree.config();
        let elements = node.make_internal(config.fan_out())?;
        debug!(
            key = %node.key(),
            depth,
            elements = elements.len(),
            "splitting leaf"
        );

        let children = node.child_keys(config.bit_quantum);
        for child_key in &children {
            self.stage(PrefixNode::new_leaf(
                child_key.clone(),
                config.num_samples(),
                tree.modulus(),
            ));
        }
        self.stage(node);
        self.splits += 1;

        for element in &elements {
            let element_key = tree.element_key(element);
            let element_delta = tree.delta_vector(element)?;
            let child = children[element_key.index_at(depth, config.bit_quantum)].clone();
            self.insert_at(child, element, &element_delta, &element_key, depth + 1)
                .await?;
        }
        Ok(())
    }

    /// Number of splits performed so far
    pub(crate) fn splits(&self) -> usize {
        self.splits
    }

    /// Write every staged node in one atomic store commit
    pub(crate) async fn commit(self) -> Result<usize> {
        let Self {
            tree,
            mut staged,
            order,
            ..
        } = self;
        let records: Vec<_> = order
            .iter()
            .filter_map(|key| staged.remove(key))
            .map(|node| node.to_record())
            .collect();
        tree.store().commit(&records).await?;
        debug!(records = records.len(), "committed insert");
        Ok(records.len())
    }
}
