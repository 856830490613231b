//! # Recon Store
//!
//! Key-addressed node persistence for the reconciliation prefix tree.
//!
//! This crate provides:
//! - **NodeStore trait**: find, upsert and atomic multi-record commit of node records
//! - **Node records**: the serialization contract shared by every backend
//! - **Memory store**: a reference backend encoding records as DAG-CBOR
//! - **Caching**: an LRU wrapper for hot node records
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Prefix Tree                │
//! ├─────────────────────────────────────────┤
//! │            NodeStore Trait              │
//! ├────────────────────┬────────────────────┤
//! │  CachedNodeStore   │  MemoryNodeStore   │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use recon_store::{MemoryNodeStore, NodeRecord, NodeStore};
//!
//! let store = MemoryNodeStore::new();
//! store.ensure_key_index().await?;
//! store.upsert(&record).await?;
//! let fetched = store.find_by_key(&record.key).await?;
//! ```

pub mod error;
pub mod memory;
pub mod record;

pub use error::{Result, StoreError};
pub use memory::{CachedNodeStore, MemoryNodeStore};
pub use record::NodeRecord;

use async_trait::async_trait;

/// Default capacity of the node record cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Trait for node persistence backends
///
/// Records are addressed by their raw key bytes. Implementations must make
/// every record written by `upsert` or `commit` visible to the next
/// `find_by_key` on the same store.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Establish the key index. Must be called before any other operation.
    async fn ensure_key_index(&self) -> Result<()>;

    /// Fetch a record by its exact key
    async fn find_by_key(&self, key: &[u8]) -> Result<NodeRecord>;

    /// Insert or replace a single record
    async fn upsert(&self, record: &NodeRecord) -> Result<()>;

    /// Insert or replace a batch of records as one atomic unit.
    ///
    /// Readers observe either none or all of the batch. A failed commit
    /// leaves the store unchanged.
    async fn commit(&self, records: &[NodeRecord]) -> Result<()>;

    /// Check whether a record exists
    async fn contains_key(&self, key: &[u8]) -> Result<bool>;

    /// Number of stored records
    async fn len(&self) -> Result<usize>;

    /// Check if the store holds no records
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
