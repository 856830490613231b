//! Prefix tree implementation

use super::txn::InsertTxn;
use super::{BitKey, PrefixNode};
use crate::config::TreeConfig;
use crate::field::{delta_vector, sample_points, Zp};
use crate::{CoreError, Result};
use num_bigint::BigUint;
use recon_store::NodeStore;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A prefix tree of field elements with per-node polynomial sketches
///
/// The tree holds no nodes itself; every read and write goes through the
/// node store. Concurrent writers must be serialized by the caller.
pub struct PrefixTree<S: NodeStore> {
    /// Node store for persistence
    store: Arc<S>,
    /// Configuration
    config: TreeConfig,
    /// Field modulus shared by every value in the tree
    modulus: Arc<BigUint>,
    /// Sample points, `num_samples` of them
    points: Vec<Zp>,
}

impl<S: NodeStore> PrefixTree<S> {
    /// Open a tree over `store`, creating the root node if the store has none
    #[instrument(skip(store))]
    pub async fn open(store: Arc<S>, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        store.ensure_key_index().await?;

        let modulus = config.field.modulus();
        let points = sample_points(&modulus, config.num_samples());
        let tree = Self {
            store,
            config,
            modulus,
            points,
        };

        let root_key = BitKey::root();
        if tree.store.contains_key(&root_key.to_bytes()).await? {
            // Fail early on a store written with different settings
            tree.root().await?;
        } else {
            let root = PrefixNode::new_leaf(root_key, tree.config.num_samples(), &tree.modulus);
            tree.store.upsert(&root.to_record()).await?;
            info!("created empty prefix tree root");
        }
        Ok(tree)
    }

    /// Tree configuration
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Sample points every sketch is evaluated at
    pub fn points(&self) -> &[Zp] {
        &self.points
    }

    /// Field modulus
    pub fn modulus(&self) -> &Arc<BigUint> {
        &self.modulus
    }

    /// The underlying node store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create an element of this tree's field
    pub fn element(&self, value: BigUint) -> Zp {
        Zp::new(Arc::clone(&self.modulus), value)
    }

    /// Full-capacity key of an element
    pub fn element_key(&self, z: &Zp) -> BitKey {
        BitKey::for_element(z, self.config.key_capacity())
    }

    /// Per-element sketch multipliers `[point_j - z]`
    pub fn delta_vector(&self, z: &Zp) -> Result<Vec<Zp>> {
        delta_vector(&self.points, z)
    }

    /// Whether a leaf at `depth` has key bits left to split on
    pub fn can_split(&self, depth: usize) -> bool {
        depth < self.config.splittable_levels()
    }

    /// Fetch the root node
    pub async fn root(&self) -> Result<PrefixNode> {
        self.node(&BitKey::root()).await
    }

    /// Fetch a node by exact key
    pub async fn node(&self, key: &BitKey) -> Result<PrefixNode> {
        let record = self.store.find_by_key(&key.to_bytes()).await?;
        let node = PrefixNode::from_record(&record, &self.config, &self.modulus)?;
        if node.key() != key {
            return Err(CoreError::MalformedRecord(format!(
                "record stored under {key} carries key {}",
                node.key()
            )));
        }
        Ok(node)
    }

    /// All children of a node, in index order; empty for leaves
    pub async fn children(&self, node: &PrefixNode) -> Result<Vec<PrefixNode>> {
        let mut children = Vec::new();
        for (i, key) in node.child_keys(self.config.bit_quantum).iter().enumerate() {
            let child = self.node(key).await.map_err(|e| match e {
                CoreError::NotFound(_) => CoreError::TreeCorruption(format!(
                    "child #{i} ({key}) of internal node {} is missing",
                    node.key()
                )),
                other => other,
            })?;
            children.push(child);
        }
        Ok(children)
    }

    /// The parent of a node, or `None` for the root
    pub async fn parent(&self, node: &PrefixNode) -> Result<Option<PrefixNode>> {
        let Some(parent_key) = node.key().parent(self.config.bit_quantum) else {
            return Ok(None);
        };
        let parent = self.node(&parent_key).await.map_err(|e| match e {
            CoreError::NotFound(_) => CoreError::TreeCorruption(format!(
                "parent {parent_key} of node {} is missing",
                node.key()
            )),
            other => other,
        })?;
        Ok(Some(parent))
    }

    /// The child of an internal node that `key` routes to at level `depth`
    pub async fn next_child(
        &self,
        node: &PrefixNode,
        key: &BitKey,
        depth: usize,
    ) -> Result<PrefixNode> {
        if node.is_leaf() {
            return Err(CoreError::NotInternal(node.key().to_string()));
        }
        let index = key.index_at(depth, self.config.bit_quantum);
        let child_key = node.key().child(index, self.config.bit_quantum);
        self.node(&child_key).await.map_err(|e| match e {
            CoreError::NotFound(_) => CoreError::TreeCorruption(format!(
                "child #{index} ({child_key}) of internal node {} is missing",
                node.key()
            )),
            other => other,
        })
    }

    /// Insert an element, updating the sketch of every node on its path
    #[instrument(skip(self, z), fields(element = %z))]
    pub async fn insert(&self, z: &Zp) -> Result<()> {
        let delta = self.delta_vector(z)?;
        let bits = self.element_key(z);

        let mut txn = InsertTxn::new(self);
        txn.insert_at(BitKey::root(), z, &delta, &bits, 0).await?;
        let splits = txn.splits();
        let written = txn.commit().await?;
        debug!(splits, written, "element inserted");
        Ok(())
    }

    /// Insert every element in order
    pub async fn insert_all<'a, I>(&self, elements: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Zp>,
    {
        let mut count = 0;
        for z in elements {
            self.insert(z).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Removal is not supported; always fails without touching the store
    #[instrument(skip(self, z), fields(element = %z))]
    pub async fn remove(&self, z: &Zp) -> Result<()> {
        warn!("refusing to remove element: removal is not supported");
        Err(CoreError::UnsupportedOperation(format!(
            "remove of element {z}"
        )))
    }

    /// Every element stored below `node`, leaves visited in key order
    pub async fn elements_under(&self, node: &PrefixNode) -> Result<Vec<Zp>> {
        let mut result = Vec::new();
        let mut stack = vec![node.clone()];
        while let Some(current) = stack.pop() {
            if current.is_leaf() {
                result.extend_from_slice(current.elements());
            } else {
                let mut children = self.children(&current).await?;
                children.reverse();
                stack.extend(children);
            }
        }
        Ok(result)
    }

    /// Walk the whole tree and gather shape statistics
    pub async fn stats(&self) -> Result<TreeStats> {
        let root = self.root().await?;
        let mut stats = TreeStats {
            num_elements: root.size(),
            ..TreeStats::default()
        };
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            stats.node_count += 1;
            stats.max_depth = stats.max_depth.max(node.depth(self.config.bit_quantum));
            if node.is_leaf() {
                stats.leaf_count += 1;
                stats.max_leaf_elements = stats.max_leaf_elements.max(node.elements().len());
            } else {
                queue.extend(self.children(&node).await?);
            }
        }
        Ok(stats)
    }
}

/// Tree statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: usize,
    pub max_leaf_elements: usize,
    pub num_elements: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoded_len;
    use crate::field::FieldSize;
    use async_trait::async_trait;
    use recon_store::{MemoryNodeStore, NodeRecord, StoreError};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store that can be told to fail commits or deep reads
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryNodeStore,
        fail_commit: AtomicBool,
        fail_deep_reads: AtomicBool,
    }

    impl FaultyStore {
        // Keys start with their bit length as a u32; depth 2 at bq=2 is 4 bits.
        fn is_deep(key: &[u8]) -> bool {
            key.len() >= 4 && u32::from_be_bytes([key[0], key[1], key[2], key[3]]) >= 4
        }
    }

    #[async_trait]
    impl NodeStore for FaultyStore {
        async fn ensure_key_index(&self) -> recon_store::Result<()> {
            self.inner.ensure_key_index().await
        }

        async fn find_by_key(&self, key: &[u8]) -> recon_store::Result<NodeRecord> {
            if self.fail_deep_reads.load(Ordering::Acquire) && Self::is_deep(key) {
                return Err(StoreError::IndexNotReady);
            }
            self.inner.find_by_key(key).await
        }

        async fn upsert(&self, record: &NodeRecord) -> recon_store::Result<()> {
            self.inner.upsert(record).await
        }

        async fn commit(&self, records: &[NodeRecord]) -> recon_store::Result<()> {
            if self.fail_commit.load(Ordering::Acquire) {
                return Err(StoreError::Serialization("backend rejected batch".into()));
            }
            self.inner.commit(records).await
        }

        async fn contains_key(&self, key: &[u8]) -> recon_store::Result<bool> {
            self.inner.contains_key(key).await
        }

        async fn len(&self) -> recon_store::Result<usize> {
            self.inner.len().await
        }
    }

    fn small_config() -> TreeConfig {
        TreeConfig {
            field: FieldSize::P128,
            bit_quantum: 2,
            m_bar: 2,
            thresh_mult: 12,
        }
    }

    async fn open(config: TreeConfig) -> (PrefixTree<MemoryNodeStore>, Arc<MemoryNodeStore>) {
        let store = Arc::new(MemoryNodeStore::new());
        let tree = PrefixTree::open(Arc::clone(&store), config).await.unwrap();
        (tree, store)
    }

    fn zp(tree: &PrefixTree<MemoryNodeStore>, v: u64) -> Zp {
        tree.element(BigUint::from(v))
    }

    #[tokio::test]
    async fn test_open_creates_root() {
        let (tree, store) = open(TreeConfig::default()).await;
        let root = tree.root().await.unwrap();

        assert!(root.is_leaf());
        assert_eq!(root.size(), 0);
        assert!(root.key().is_empty());
        assert_eq!(root.svalues().len(), 6);
        assert_eq!(store.record_count(), 1);
        assert_eq!(tree.points().len(), 6);
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let store = Arc::new(MemoryNodeStore::new());
        let tree = PrefixTree::open(Arc::clone(&store), small_config()).await.unwrap();
        tree.insert(&zp(&tree, 7)).await.unwrap();

        let reopened = PrefixTree::open(Arc::clone(&store), small_config()).await.unwrap();
        assert_eq!(reopened.root().await.unwrap().size(), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_mismatched_settings() {
        let store = Arc::new(MemoryNodeStore::new());
        PrefixTree::open(Arc::clone(&store), small_config()).await.unwrap();

        let other = TreeConfig { m_bar: 5, ..small_config() };
        let result = PrefixTree::open(store, other).await;
        assert!(matches!(result, Err(CoreError::MalformedRecord(_))));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let store = Arc::new(MemoryNodeStore::new());
        let config = TreeConfig { bit_quantum: 0, ..TreeConfig::default() };
        let result = PrefixTree::open(Arc::clone(&store), config).await;
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_insert_updates_root_sketch() {
        let (tree, _) = open(small_config()).await;
        let z = zp(&tree, 42);
        let before = tree.root().await.unwrap();

        tree.insert(&z).await.unwrap();

        let after = tree.root().await.unwrap();
        let delta = tree.delta_vector(&z).unwrap();
        for j in 0..delta.len() {
            assert_eq!(after.svalues()[j], before.svalues()[j].mul(&delta[j]).unwrap());
        }
        assert_eq!(after.size(), 1);
        assert_eq!(after.elements(), &[z]);
    }

    #[tokio::test]
    async fn test_four_elements_do_not_split() {
        let (tree, store) = open(small_config()).await;
        let elements: Vec<_> = [0x00, 0x40, 0x80, 0xc0].iter().map(|v| zp(&tree, *v)).collect();
        assert_eq!(encoded_len(&elements), tree.config().split_threshold());

        tree.insert_all(&elements).await.unwrap();

        let root = tree.root().await.unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.size(), 4);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_fifth_element_splits_once() {
        let (tree, store) = open(small_config()).await;
        let elements: Vec<_> = [0x00, 0x40, 0x80, 0xc0, 0x10]
            .iter()
            .map(|v| zp(&tree, *v))
            .collect();

        tree.insert_all(&elements).await.unwrap();

        let root = tree.root().await.unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.size(), 5);
        assert!(root.elements().is_empty());

        let children = tree.children(&root).await.unwrap();
        assert_eq!(children.len(), 4);
        assert!(children.iter().all(|c| c.is_leaf()));
        let total: u64 = children.iter().map(|c| c.size()).sum();
        assert_eq!(total, 5);
        let stored: usize = children.iter().map(|c| c.elements().len()).sum();
        assert_eq!(stored, 5);
        assert_eq!(store.record_count(), 5);
    }

    #[tokio::test]
    async fn test_children_and_parent_keys() {
        let (tree, _) = open(small_config()).await;
        for v in [0x00, 0x40, 0x80, 0xc0, 0x10] {
            tree.insert(&zp(&tree, v)).await.unwrap();
        }
        let root = tree.root().await.unwrap();
        assert!(tree.parent(&root).await.unwrap().is_none());

        for (i, child) in tree.children(&root).await.unwrap().iter().enumerate() {
            assert_eq!(child.key(), &root.key().child(i, 2));
            assert!(tree.children(child).await.unwrap().is_empty());
            let parent = tree.parent(child).await.unwrap().unwrap();
            assert_eq!(parent.key(), root.key());
        }
    }

    #[tokio::test]
    async fn test_next_child_routes_by_key() {
        let (tree, _) = open(small_config()).await;
        let elements: Vec<_> = [0x00, 0x40, 0x80, 0xc0, 0x10]
            .iter()
            .map(|v| zp(&tree, *v))
            .collect();
        tree.insert_all(&elements).await.unwrap();
        let root = tree.root().await.unwrap();

        for z in &elements {
            let child = tree.next_child(&root, &tree.element_key(z), 0).await.unwrap();
            assert!(child.elements().contains(z));
        }

        let leaf = tree.children(&root).await.unwrap().remove(0);
        let result = tree.next_child(&leaf, &tree.element_key(&elements[0]), 1).await;
        assert!(matches!(result, Err(CoreError::NotInternal(_))));
    }

    #[tokio::test]
    async fn test_node_not_found() {
        let (tree, _) = open(small_config()).await;
        let result = tree.node(&"0110".parse().unwrap()).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_child_is_corruption() {
        let (tree, store) = open(small_config()).await;
        let mut root = tree.root().await.unwrap();
        root.make_internal(4).unwrap();
        store.upsert(&root.to_record()).await.unwrap();

        let root = tree.root().await.unwrap();
        let result = tree.children(&root).await;
        assert!(matches!(result, Err(CoreError::TreeCorruption(_))));

        let z = zp(&tree, 1);
        let result = tree.insert(&z).await;
        assert!(matches!(result, Err(CoreError::TreeCorruption(_))));
    }

    #[tokio::test]
    async fn test_failed_commit_during_split_leaves_store_unchanged() {
        let store = Arc::new(FaultyStore::default());
        let tree = PrefixTree::open(Arc::clone(&store), small_config()).await.unwrap();
        for v in [0x00u32, 0x40, 0x80, 0xc0] {
            tree.insert(&tree.element(BigUint::from(v))).await.unwrap();
        }
        let before = store.inner.snapshot();

        store.fail_commit.store(true, Ordering::Release);
        let fifth = tree.element(BigUint::from(0x10u32));
        let result = tree.insert(&fifth).await;
        assert!(matches!(result, Err(CoreError::Store(_))));
        assert_eq!(store.inner.snapshot(), before);
        let root = tree.root().await.unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.size(), 4);

        store.fail_commit.store(false, Ordering::Release);
        tree.insert(&fifth).await.unwrap();
        let root = tree.root().await.unwrap();
        assert_eq!(tree.children(&root).await.unwrap().len(), 4);
        assert_eq!(root.size(), 5);
    }

    #[tokio::test]
    async fn test_failed_deep_read_leaves_store_unchanged() {
        let store = Arc::new(FaultyStore::default());
        let tree = PrefixTree::open(Arc::clone(&store), TreeConfig::default()).await.unwrap();
        let values: Vec<_> = (1..=400u64).map(|v| v * 0x9e37_79b9).collect();
        let (seed, rest) = values.split_at(300);
        for v in seed {
            tree.insert(&tree.element(BigUint::from(*v))).await.unwrap();
        }

        // Pick an element whose insert path goes below depth 1
        let mut deep = None;
        for v in rest {
            let z = tree.element(BigUint::from(*v));
            let key = tree.element_key(&z);
            let mut node = tree.root().await.unwrap();
            let mut depth = 0;
            while !node.is_leaf() {
                node = tree.next_child(&node, &key, depth).await.unwrap();
                depth += 1;
            }
            if depth >= 2 {
                deep = Some(z);
                break;
            }
        }
        let z = deep.expect("tree has leaves below depth 1");
        let before = store.inner.snapshot();

        store.fail_deep_reads.store(true, Ordering::Release);
        let result = tree.insert(&z).await;
        assert!(matches!(result, Err(CoreError::Store(StoreError::IndexNotReady))));
        assert_eq!(store.inner.snapshot(), before);
    }

    #[tokio::test]
    async fn test_insert_rejects_foreign_field() {
        let (tree, store) = open(small_config()).await;
        let before = store.snapshot();

        let foreign = FieldSize::P256.element(BigUint::from(3u32));
        let result = tree.insert(&foreign).await;
        assert!(matches!(result, Err(CoreError::FieldMismatch { .. })));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_remove_is_unsupported() {
        let (tree, store) = open(small_config()).await;
        let z = zp(&tree, 9);
        tree.insert(&z).await.unwrap();
        let before = store.snapshot();

        let result = tree.remove(&z).await;
        assert!(matches!(result, Err(CoreError::UnsupportedOperation(_))));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_duplicates_at_max_depth_stay_in_leaf() {
        // Eight bits per level over a 129-bit key: the same element repeated
        // eventually reaches a leaf at depth 16 with no whole level left to split on.
        let config = TreeConfig {
            field: FieldSize::P128,
            bit_quantum: 8,
            m_bar: 1,
            thresh_mult: 8,
        };
        let (tree, _) = open(config).await;
        let z = zp(&tree, 5);
        for _ in 0..3 {
            tree.insert(&z).await.unwrap();
        }

        let stats = tree.stats().await.unwrap();
        assert_eq!(stats.num_elements, 3);
        assert_eq!(stats.max_depth, 16);
        assert_eq!(stats.max_leaf_elements, 3);
        let all = tree.elements_under(&tree.root().await.unwrap()).await.unwrap();
        assert_eq!(all, vec![z.clone(), z.clone(), z]);
    }

    #[tokio::test]
    async fn test_can_split_stops_at_last_whole_level() {
        let (tree, _) = open(TreeConfig::default()).await;
        let levels = tree.config().splittable_levels();
        assert!(tree.can_split(0));
        assert!(tree.can_split(levels - 1));
        assert!(!tree.can_split(levels));
        assert!((levels + 1) * tree.config().bit_quantum > tree.config().key_capacity());
    }

    #[tokio::test]
    async fn test_stats() {
        let (tree, _) = open(small_config()).await;
        for v in [0x00, 0x40, 0x80, 0xc0, 0x10] {
            tree.insert(&zp(&tree, v)).await.unwrap();
        }
        let stats = tree.stats().await.unwrap();
        assert_eq!(
            stats,
            TreeStats {
                node_count: 5,
                leaf_count: 4,
                max_depth: 1,
                max_leaf_elements: 2,
                num_elements: 5,
            }
        );
    }
}
