use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by both stores. Derived upstream from a source URL or
/// content hash; opaque to the reconciliation core.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier from raw source bytes (URL or document content)
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The two stores a record can be deleted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Vector,
    Cache,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Vector => f.write_str("vector"),
            StoreKind::Cache => f.write_str("cache"),
        }
    }
}

/// Store tag on an audit entry. `System` marks the single summary entry a
/// full reset writes, which spans both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditScope {
    Vector,
    Cache,
    System,
}

impl From<StoreKind> for AuditScope {
    fn from(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Vector => AuditScope::Vector,
            StoreKind::Cache => AuditScope::Cache,
        }
    }
}

impl fmt::Display for AuditScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditScope::Vector => f.write_str("vector"),
            AuditScope::Cache => f.write_str("cache"),
            AuditScope::System => f.write_str("system"),
        }
    }
}

/// Why a record was deleted. Closed set so audit queries can match
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteReason {
    /// Operator-triggered single deletion
    Manual,
    /// Orphan or expiry cleanup, scheduled or on demand
    Cleanup,
    /// Full reset of both stores
    Reset,
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteReason::Manual => f.write_str("manual"),
            DeleteReason::Cleanup => f.write_str("cleanup"),
            DeleteReason::Reset => f.write_str("reset"),
        }
    }
}

/// One audit record per successful deletion. Append-only; partitioned by the
/// UTC date of `deleted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionLogEntry {
    /// Identifier of the deleted record (synthetic for reset summaries)
    pub document_id: DocumentId,
    /// When the deletion happened (UTC)
    pub deleted_at: DateTime<Utc>,
    /// Which store the record was removed from
    pub store: AuditScope,
    /// Why it was removed
    pub reason: DeleteReason,
    /// Free-form context, set only on reset summary entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeletionLogEntry {
    /// Entry for a record removed by a cleanup run
    pub fn cleanup(document_id: DocumentId, store: StoreKind) -> Self {
        Self {
            document_id,
            deleted_at: Utc::now(),
            store: store.into(),
            reason: DeleteReason::Cleanup,
            detail: None,
        }
    }

    /// Entry for an operator-triggered single deletion
    pub fn manual(document_id: DocumentId, store: StoreKind) -> Self {
        Self {
            document_id,
            deleted_at: Utc::now(),
            store: store.into(),
            reason: DeleteReason::Manual,
            detail: None,
        }
    }

    /// Single summary entry for a full reset. Carries aggregate counts
    /// instead of one entry per wiped key.
    pub fn reset_summary(vectors_deleted: usize, cache_deleted: usize, error_count: usize) -> Self {
        Self {
            document_id: DocumentId::new(format!("reset-{}", Uuid::new_v4())),
            deleted_at: Utc::now(),
            store: AuditScope::System,
            reason: DeleteReason::Reset,
            detail: Some(format!(
                "vectors={} cache={} errors={}",
                vectors_deleted, cache_deleted, error_count
            )),
        }
    }

    /// UTC date this entry partitions under
    pub fn partition_date(&self) -> NaiveDate {
        self.deleted_at.date_naive()
    }
}

/// One failed delete inside an otherwise-successful batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupFailure {
    /// Key the failure belongs to
    pub document_id: DocumentId,
    /// What went wrong
    pub message: String,
}

impl CleanupFailure {
    pub fn new(document_id: DocumentId, message: impl Into<String>) -> Self {
        Self {
            document_id,
            message: message.into(),
        }
    }
}

/// Outcome of one cleanup invocation. Built fresh per call, never shared
/// across invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Number of records actually removed
    pub deleted_count: usize,
    /// Keys of the removed records, sorted for stable output
    pub deleted_ids: Vec<DocumentId>,
    /// Number of per-key failures
    pub error_count: usize,
    /// The failures themselves; a non-empty list is partial success, not an error
    pub errors: Vec<CleanupFailure>,
    /// True when nothing was deleted and the result only reports candidates
    pub dry_run: bool,
}

impl CleanupResult {
    pub fn empty(dry_run: bool) -> Self {
        Self {
            deleted_count: 0,
            deleted_ids: Vec::new(),
            error_count: 0,
            errors: Vec::new(),
            dry_run,
        }
    }

    /// Assemble a result from collected parts, keeping the counts consistent
    /// with the lists and the id order stable.
    pub fn from_parts(
        mut deleted_ids: Vec<DocumentId>,
        mut errors: Vec<CleanupFailure>,
        dry_run: bool,
    ) -> Self {
        deleted_ids.sort();
        errors.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Self {
            deleted_count: deleted_ids.len(),
            error_count: errors.len(),
            deleted_ids,
            errors,
            dry_run,
        }
    }

    /// True when every attempted delete succeeded
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of a full reset. Both store clears are always attempted; each
/// failure lands here instead of aborting the other clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetOutcome {
    /// Records removed from the vector store
    pub vectors_deleted: usize,
    /// Records removed from the cache store
    pub cache_deleted: usize,
    /// Failures from either clear or from the audit append
    pub errors: Vec<String>,
}

impl ResetOutcome {
    /// True when both clears and the audit append went through
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Size report from the vector store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStoreStats {
    /// Number of stored vector records
    pub count: usize,
    /// Estimated bytes on disk
    pub disk_bytes: u64,
}

/// Size report from the cache store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStoreStats {
    /// Number of live cache records
    pub count: usize,
    /// Estimated bytes in memory
    pub memory_bytes: u64,
}

/// Combined report across both stores
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub vectors: VectorStoreStats,
    pub cache: CacheStoreStats,
}

/// Metadata attached to a cache record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Query that produced the summary, if recorded
    pub query: Option<String>,
    /// Language of the summary, if recorded
    pub lang: Option<String>,
    /// When the record was written (UTC)
    pub created_at: DateTime<Utc>,
    /// When the record stops being live (UTC)
    pub expires_at: DateTime<Utc>,
}

impl CacheMetadata {
    /// Whether the record is past its TTL at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
