//! Administrative control plane for a document summarization backend.
//!
//! Two stores back the product: a persistent vector index of document
//! embeddings and an ephemeral TTL cache of generated summaries. Nothing
//! links their lifecycles, so vectors outlive their summaries and the index
//! accumulates garbage. This crate reconciles the two stores: it finds
//! orphaned vectors and deletes them with bounded parallelism and an audit
//! trail, evicts expired cache entries, serves operator deletions and full
//! resets, and drives the daily cleanup schedule.

// Module declarations
pub mod engine;
pub mod errors;
pub mod scheduler;
pub mod stores;
pub mod types;

// Re-exports for commonly used types
pub use engine::{EngineConfig, EngineStats, MaintenanceGuard, MaintenanceLock, ReconciliationEngine};
pub use errors::{AdminError, AdminResult};
pub use scheduler::{CleanupScheduler, SchedulerConfig, SchedulerStats};
pub use stores::{AuditLog, CacheStore, StoreError, StoreResult, VectorStore};
pub use types::{
    AuditScope, CacheMetadata, CacheStoreStats, CleanupFailure, CleanupResult, DeleteReason,
    DeletionLogEntry, DocumentId, ResetOutcome, StoreKind, SystemStats, VectorStoreStats,
};
