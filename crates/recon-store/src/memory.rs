//! In-memory node store for testing and caching

use crate::{NodeRecord, NodeStore, Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// An in-memory node store
///
/// Records are kept DAG-CBOR encoded so every read goes through the same
/// decode path a remote backend would.
#[derive(Clone, Default)]
pub struct MemoryNodeStore {
    records: Arc<RwLock<HashMap<Vec<u8>, Bytes>>>,
    indexed: Arc<AtomicBool>,
}

impl MemoryNodeStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records stored
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// List all keys, sorted
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<_> = self.records.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of every encoded record, for byte-level comparisons
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Bytes)> {
        let mut all: Vec<_> = self
            .records
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn check_index(&self) -> Result<()> {
        if self.indexed.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::IndexNotReady)
        }
    }

    fn encode(record: &NodeRecord) -> Result<Bytes> {
        let bytes = serde_ipld_dagcbor::to_vec(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn ensure_key_index(&self) -> Result<()> {
        self.indexed.store(true, Ordering::Release);
        Ok(())
    }

    async fn find_by_key(&self, key: &[u8]) -> Result<NodeRecord> {
        self.check_index()?;
        let bytes = self
            .records
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_vec()))?;
        trace!(key = %hex::encode(key), "record read");
        Ok(serde_ipld_dagcbor::from_slice(&bytes)?)
    }

    async fn upsert(&self, record: &NodeRecord) -> Result<()> {
        self.check_index()?;
        let bytes = Self::encode(record)?;
        self.records.write().insert(record.key.clone(), bytes);
        Ok(())
    }

    async fn commit(&self, records: &[NodeRecord]) -> Result<()> {
        self.check_index()?;
        // Encode everything before taking the lock so a bad record aborts the
        // whole batch without touching the map.
        let encoded = records
            .iter()
            .map(|r| Ok((r.key.clone(), Self::encode(r)?)))
            .collect::<Result<Vec<_>>>()?;
        let mut map = self.records.write();
        for (key, bytes) in encoded {
            map.insert(key, bytes);
        }
        Ok(())
    }

    async fn contains_key(&self, key: &[u8]) -> Result<bool> {
        self.check_index()?;
        Ok(self.records.read().contains_key(key))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.record_count())
    }
}

/// LRU-cached wrapper around any node store
///
/// Every write bumps `generation` while holding the cache lock. A read miss
/// only fills the cache if no write happened between its lookup and its
/// fetch from the inner store.
pub struct CachedNodeStore<S: NodeStore> {
    inner: S,
    cache: Arc<Mutex<lru::LruCache<Vec<u8>, NodeRecord>>>,
    generation: AtomicU64,
}

impl<S: NodeStore> CachedNodeStore<S> {
    /// Create a new cached store with the given capacity
    pub fn new(inner: S, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            StoreError::Configuration("cache capacity must be non-zero".to_string())
        })?;
        Ok(Self {
            inner,
            cache: Arc::new(Mutex::new(lru::LruCache::new(capacity))),
            generation: AtomicU64::new(0),
        })
    }

    /// Access the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Get cache statistics
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn invalidate(&self, records: &[NodeRecord]) {
        let mut cache = self.cache.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        for record in records {
            cache.pop(&record.key);
        }
    }

    fn refresh(&self, records: &[NodeRecord]) {
        let mut cache = self.cache.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        for record in records {
            cache.put(record.key.clone(), record.clone());
        }
    }
}

#[async_trait]
impl<S: NodeStore> NodeStore for CachedNodeStore<S> {
    async fn ensure_key_index(&self) -> Result<()> {
        self.inner.ensure_key_index().await
    }

    async fn find_by_key(&self, key: &[u8]) -> Result<NodeRecord> {
        let seen = {
            let mut cache = self.cache.lock();
            if let Some(record) = cache.get(key) {
                return Ok(record.clone());
            }
            self.generation.load(Ordering::Acquire)
        };

        let record = self.inner.find_by_key(key).await?;
        let mut cache = self.cache.lock();
        if self.generation.load(Ordering::Acquire) == seen {
            cache.put(key.to_vec(), record.clone());
        } else {
            trace!(key = %hex::encode(key), "skipping cache fill after concurrent write");
        }
        Ok(record)
    }

    async fn upsert(&self, record: &NodeRecord) -> Result<()> {
        self.invalidate(std::slice::from_ref(record));
        self.inner.upsert(record).await?;
        self.refresh(std::slice::from_ref(record));
        Ok(())
    }

    async fn commit(&self, records: &[NodeRecord]) -> Result<()> {
        self.invalidate(records);
        self.inner.commit(records).await?;
        self.refresh(records);
        Ok(())
    }

    async fn contains_key(&self, key: &[u8]) -> Result<bool> {
        if self.cache.lock().contains(key) {
            return Ok(true);
        }
        self.inner.contains_key(key).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}
