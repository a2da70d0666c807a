//! Store Collaborator Interfaces
//!
//! The reconciliation engine never talks to a concrete database. It is wired
//! against three narrow capabilities: the vector index, the TTL summary
//! cache, and the append-only deletion log. Implementations own persistence
//! entirely; the engine only enumerates, probes, and deletes.
//!
//! In-memory implementations live in [`memory`]; a file-backed audit log
//! lives in [`audit_file`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::types::{
    CacheMetadata, CacheStoreStats, DeletionLogEntry, DocumentId, VectorStoreStats,
};

pub mod audit_file;
pub mod memory;

pub use audit_file::FileAuditLog;
pub use memory::{MemoryAuditLog, MemoryCacheConfig, MemoryCacheStore, MemoryVectorStore};

/// Errors raised by store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-addressed store of embedding records, one per processed document.
///
/// Records are created by the summarization pipeline; this interface only
/// enumerates and deletes them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// All keys currently in the index
    async fn list_keys(&self) -> StoreResult<Vec<DocumentId>>;

    /// Keys of records created on the given UTC date
    async fn list_keys_by_date(&self, date: NaiveDate) -> StoreResult<Vec<DocumentId>>;

    async fn contains(&self, id: &DocumentId) -> StoreResult<bool>;

    /// Creation timestamp of a record; `None` when the record is gone
    async fn created_at(&self, id: &DocumentId) -> StoreResult<Option<DateTime<Utc>>>;

    /// Delete one record. Returns whether the record existed; deleting an
    /// absent key is success.
    async fn delete(&self, id: &DocumentId) -> StoreResult<bool>;

    /// Delete every record, returning how many were removed
    async fn delete_all(&self) -> StoreResult<usize>;

    async fn stats(&self) -> StoreResult<VectorStoreStats>;
}

/// TTL-governed store of summary records in the same `DocumentId` space as
/// the vector index. A live (unexpired) record is the signal that the
/// document is still in active use.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Keys of live (unexpired) records, optionally only those created on
    /// the given UTC date
    async fn live_keys(&self, date: Option<NaiveDate>) -> StoreResult<Vec<DocumentId>>;

    async fn contains(&self, id: &DocumentId) -> StoreResult<bool>;

    /// Metadata for a live record; `None` when absent or expired
    async fn metadata(&self, id: &DocumentId) -> StoreResult<Option<CacheMetadata>>;

    /// Delete one record. Returns whether the record existed.
    async fn delete(&self, id: &DocumentId) -> StoreResult<bool>;

    /// Delete every record, returning how many were removed
    async fn delete_all(&self) -> StoreResult<usize>;

    /// Remove every record past its TTL and return the evicted keys
    async fn evict_expired(&self) -> StoreResult<Vec<DocumentId>>;

    async fn stats(&self) -> StoreResult<CacheStoreStats>;
}

/// Append-only deletion log, partitioned by UTC date.
///
/// Entries are written by the engine at the moment of a successful delete and
/// never mutated afterwards. Whole partitions can be purged by an explicit
/// admin action.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: DeletionLogEntry) -> StoreResult<()>;

    /// All entries whose deletion happened on the given UTC date
    async fn query_by_date(&self, date: NaiveDate) -> StoreResult<Vec<DeletionLogEntry>>;

    /// Drop the partition for the given date, returning how many entries it held
    async fn delete_by_date(&self, date: NaiveDate) -> StoreResult<usize>;
}
