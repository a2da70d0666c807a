//! Dual-Store Reconciliation Engine
//!
//! The engine keeps a persistent vector index and an ephemeral summary cache
//! from drifting apart. Cache entries expire or get deleted while their
//! vectors live on; the engine finds those orphaned vectors and removes them
//! with an audit trail, on demand or from the daily scheduler.
//!
//! ## Operations
//!
//! - **Orphan cleanup**: diff vector keys against live cache keys, delete the
//!   stale remainder with bounded parallelism
//! - **Expired cache cleanup**: evict entries past TTL and log each eviction
//! - **Single deletion**: operator-triggered removal of one record
//! - **Full reset**: irreversible wipe of both stores with aggregate reporting
//!
//! ## Architecture
//!
//! - `ReconciliationEngine`: facade owning the stores, the lock, and counters
//! - `MaintenanceLock`: fail-fast mutual exclusion over {cleanup, reset}
//! - `DeletePipeline`: fixed worker pool executing the delete batch
//!
//! Cleanup and reset never run concurrently; a second caller gets `Busy`
//! immediately instead of queueing. Single deletions bypass the lock: the
//! worst case is a double delete, which is harmless because deletes are
//! idempotent.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::errors::{AdminError, AdminResult};
use crate::stores::{AuditLog, CacheStore, StoreResult, VectorStore};
use crate::types::{
    CacheMetadata, CleanupFailure, CleanupResult, DeletionLogEntry, DocumentId, ResetOutcome,
    StoreKind, SystemStats,
};

pub mod lock;
pub(crate) mod pipeline;

pub use lock::{MaintenanceGuard, MaintenanceLock};

use pipeline::{CancellationToken, DeletePipeline};

/// Configuration for the reconciliation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum vector age before it can be considered orphaned (seconds).
    /// Covers the race where a fresh vector lands before its cache entry.
    pub grace_window_seconds: u64,
    /// Number of parallel delete workers in a cleanup batch
    pub delete_workers: usize,
    /// Timeout for any single store call (seconds)
    pub store_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_window_seconds: 7 * 86_400,         // 7 days, the default cache TTL
            delete_workers: num_cpus::get().clamp(2, 8),
            store_timeout_seconds: 30,                // 30 second timeout
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> AdminResult<()> {
        if self.delete_workers == 0 {
            return Err(AdminError::Configuration {
                message: "delete_workers must be at least 1".to_string(),
            });
        }
        if self.store_timeout_seconds == 0 {
            return Err(AdminError::Configuration {
                message: "store_timeout_seconds must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    fn grace_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_window_seconds as i64)
    }
}

/// Running counters for engine operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Completed cleanup runs (orphan and expiry, excluding dry runs)
    pub cleanup_runs: u64,
    /// Vectors removed by orphan cleanup
    pub vectors_deleted: u64,
    /// Cache entries removed by expiry cleanup
    pub cache_entries_evicted: u64,
    /// Operator-triggered single deletions that removed a record
    pub manual_deletes: u64,
    /// Full resets executed
    pub resets: u64,
    /// Per-key failures accumulated across cleanup runs
    pub delete_errors: u64,
    /// When the last cleanup finished
    pub last_cleanup_at: Option<DateTime<Utc>>,
    /// When the last reset finished
    pub last_reset_at: Option<DateTime<Utc>>,
}

/// Facade over the two stores and the deletion log.
///
/// Cheap to clone; clones share the stores, the maintenance lock, and the
/// counters.
#[derive(Clone)]
pub struct ReconciliationEngine {
    vector_store: Arc<dyn VectorStore>,
    cache_store: Arc<dyn CacheStore>,
    audit_log: Arc<dyn AuditLog>,
    config: EngineConfig,
    lock: MaintenanceLock,
    stats: Arc<RwLock<EngineStats>>,
    shutdown: CancellationToken,
}

impl ReconciliationEngine {
    /// Create an engine with its own maintenance lock
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        cache_store: Arc<dyn CacheStore>,
        audit_log: Arc<dyn AuditLog>,
        config: EngineConfig,
    ) -> AdminResult<Self> {
        Self::with_lock(
            vector_store,
            cache_store,
            audit_log,
            config,
            MaintenanceLock::new(),
        )
    }

    /// Create an engine sharing an externally owned maintenance lock
    pub fn with_lock(
        vector_store: Arc<dyn VectorStore>,
        cache_store: Arc<dyn CacheStore>,
        audit_log: Arc<dyn AuditLog>,
        config: EngineConfig,
        lock: MaintenanceLock,
    ) -> AdminResult<Self> {
        config.validate()?;
        Ok(Self {
            vector_store,
            cache_store,
            audit_log,
            config,
            lock,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ask in-flight maintenance work to stop claiming new keys. Progress
    /// already made, including written audit entries, stays in place.
    pub fn request_shutdown(&self) {
        log::info!("⏹️ Engine shutdown requested, draining maintenance work");
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Find vectors whose documents are no longer live in the cache and
    /// delete them. With `dry_run` the result lists the candidates without
    /// deleting or logging anything.
    pub async fn cleanup_orphaned_vectors(&self, dry_run: bool) -> AdminResult<CleanupResult> {
        let _guard = self.lock.try_acquire("cleanup_orphaned_vectors")?;
        let started = Instant::now();
        log::info!("🧹 Starting orphaned vector cleanup (dry_run: {})", dry_run);

        let vector_keys = self
            .store_call(StoreKind::Vector, self.vector_store.list_keys())
            .await?;
        let live_keys: HashSet<DocumentId> = self
            .store_call(StoreKind::Cache, self.cache_store.live_keys(None))
            .await?
            .into_iter()
            .collect();

        let now = Utc::now();
        let grace = self.config.grace_window();
        let mut candidates = Vec::new();
        let mut failures: Vec<CleanupFailure> = Vec::new();
        let mut spared_recent = 0usize;

        for id in vector_keys {
            if live_keys.contains(&id) {
                continue;
            }
            // Age probe per candidate; an uncertain answer never deletes
            match timeout(self.config.store_timeout(), self.vector_store.created_at(&id)).await {
                Ok(Ok(Some(created_at))) => {
                    if now - created_at < grace {
                        spared_recent += 1;
                    } else {
                        candidates.push(id);
                    }
                }
                Ok(Ok(None)) => {
                    // Vanished between enumeration and probe; already gone
                }
                Ok(Err(e)) => {
                    failures.push(CleanupFailure::new(id, format!("age check failed: {}", e)));
                }
                Err(_) => {
                    failures.push(CleanupFailure::new(
                        id,
                        format!(
                            "age check timed out after {}s",
                            self.config.store_timeout_seconds
                        ),
                    ));
                }
            }
        }

        if spared_recent > 0 {
            log::debug!(
                "🕐 Grace window spared {} recent vector(s) from cleanup",
                spared_recent
            );
        }

        if dry_run {
            let result = CleanupResult::from_parts(candidates, failures, true);
            log::info!(
                "🔍 Dry run found {} orphan candidate(s), {} probe error(s) ({}ms)",
                result.deleted_count,
                result.error_count,
                started.elapsed().as_millis()
            );
            return Ok(result);
        }

        let pipeline = DeletePipeline::new(self.config.delete_workers, self.config.store_timeout());
        let outcome = pipeline
            .delete_vectors(
                self.vector_store.clone(),
                self.audit_log.clone(),
                candidates,
                self.shutdown.clone(),
            )
            .await;

        if outcome.already_absent > 0 {
            log::debug!(
                "👻 {} orphan(s) were already gone when their delete ran",
                outcome.already_absent
            );
        }

        failures.extend(outcome.failures);
        let result = CleanupResult::from_parts(outcome.deleted, failures, false);

        {
            let mut stats = self.stats.write().await;
            stats.cleanup_runs += 1;
            stats.vectors_deleted += result.deleted_count as u64;
            stats.delete_errors += result.error_count as u64;
            stats.last_cleanup_at = Some(Utc::now());
        }

        log::info!(
            "✅ Orphan cleanup completed: {} deleted, {} error(s) ({}ms)",
            result.deleted_count,
            result.error_count,
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Evict every cache entry past its TTL and log each eviction
    pub async fn cleanup_expired_cache(&self) -> AdminResult<CleanupResult> {
        let _guard = self.lock.try_acquire("cleanup_expired_cache")?;
        let started = Instant::now();
        log::info!("🧹 Starting expired cache cleanup");

        let evicted = self
            .store_call(StoreKind::Cache, self.cache_store.evict_expired())
            .await?;

        let mut failures = Vec::new();
        for id in &evicted {
            let entry = DeletionLogEntry::cleanup(id.clone(), StoreKind::Cache);
            if let Err(e) = self.audit_log.append(entry).await {
                failures.push(CleanupFailure::new(
                    id.clone(),
                    format!("evicted, but audit append failed: {}", e),
                ));
            }
        }

        let result = CleanupResult::from_parts(evicted, failures, false);

        {
            let mut stats = self.stats.write().await;
            stats.cleanup_runs += 1;
            stats.cache_entries_evicted += result.deleted_count as u64;
            stats.delete_errors += result.error_count as u64;
            stats.last_cleanup_at = Some(Utc::now());
        }

        log::info!(
            "✅ Expired cache cleanup completed: {} evicted, {} error(s) ({}ms)",
            result.deleted_count,
            result.error_count,
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Delete one record from the named store.
    ///
    /// Returns whether the record existed. Deleting an absent key is not an
    /// error and writes no audit entry. Runs without the maintenance lock.
    pub async fn delete_one(&self, store: StoreKind, id: &DocumentId) -> AdminResult<bool> {
        let existed = match store {
            StoreKind::Vector => {
                self.store_call(store, self.vector_store.delete(id)).await?
            }
            StoreKind::Cache => {
                self.store_call(store, self.cache_store.delete(id)).await?
            }
        };

        if existed {
            let entry = DeletionLogEntry::manual(id.clone(), store);
            if let Err(e) = self.audit_log.append(entry).await {
                // The deletion stands; the operator still has to hear about
                // the missing log line
                log::error!(
                    "❌ Deleted {} record '{}' but audit append failed: {}",
                    store,
                    id,
                    e
                );
            }
            let mut stats = self.stats.write().await;
            stats.manual_deletes += 1;
            log::info!("🗑️ Deleted {} record '{}'", store, id);
        } else {
            log::debug!("{} record '{}' was already absent", store, id);
        }

        Ok(existed)
    }

    /// Irreversibly clear both stores.
    ///
    /// Both clears are attempted even when the first fails; the outcome
    /// reports counts and errors from each. One summary entry lands in the
    /// audit log instead of an entry per wiped key.
    pub async fn reset_all(&self) -> AdminResult<ResetOutcome> {
        let _guard = self.lock.try_acquire("reset_all")?;
        log::warn!("⚠️ Full reset requested, clearing both stores");

        let mut errors = Vec::new();

        let vectors_deleted =
            match timeout(self.config.store_timeout(), self.vector_store.delete_all()).await {
                Ok(Ok(count)) => count,
                Ok(Err(e)) => {
                    errors.push(format!("vector store clear failed: {}", e));
                    0
                }
                Err(_) => {
                    errors.push(format!(
                        "vector store clear timed out after {}s",
                        self.config.store_timeout_seconds
                    ));
                    0
                }
            };

        let cache_deleted =
            match timeout(self.config.store_timeout(), self.cache_store.delete_all()).await {
                Ok(Ok(count)) => count,
                Ok(Err(e)) => {
                    errors.push(format!("cache store clear failed: {}", e));
                    0
                }
                Err(_) => {
                    errors.push(format!(
                        "cache store clear timed out after {}s",
                        self.config.store_timeout_seconds
                    ));
                    0
                }
            };

        let summary = DeletionLogEntry::reset_summary(vectors_deleted, cache_deleted, errors.len());
        if let Err(e) = self.audit_log.append(summary).await {
            errors.push(format!("audit append failed: {}", e));
        }

        {
            let mut stats = self.stats.write().await;
            stats.resets += 1;
            stats.last_reset_at = Some(Utc::now());
        }

        log::warn!(
            "✅ Reset completed: {} vector(s), {} cache entrie(s), {} error(s)",
            vectors_deleted,
            cache_deleted,
            errors.len()
        );

        Ok(ResetOutcome {
            vectors_deleted,
            cache_deleted,
            errors,
        })
    }

    /// Combined size report across both stores
    pub async fn stats(&self) -> AdminResult<SystemStats> {
        let vectors = self
            .store_call(StoreKind::Vector, self.vector_store.stats())
            .await?;
        let cache = self
            .store_call(StoreKind::Cache, self.cache_store.stats())
            .await?;
        Ok(SystemStats { vectors, cache })
    }

    /// Snapshot of the engine's own counters
    pub async fn engine_stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    /// Whether a record exists (and, for the cache, is still live)
    pub async fn contains(&self, store: StoreKind, id: &DocumentId) -> AdminResult<bool> {
        match store {
            StoreKind::Vector => {
                self.store_call(store, self.vector_store.contains(id)).await
            }
            StoreKind::Cache => {
                self.store_call(store, self.cache_store.contains(id)).await
            }
        }
    }

    /// Keys created on the given UTC date (live keys only for the cache)
    pub async fn keys_by_date(
        &self,
        store: StoreKind,
        date: NaiveDate,
    ) -> AdminResult<Vec<DocumentId>> {
        match store {
            StoreKind::Vector => {
                self.store_call(store, self.vector_store.list_keys_by_date(date))
                    .await
            }
            StoreKind::Cache => {
                self.store_call(store, self.cache_store.live_keys(Some(date)))
                    .await
            }
        }
    }

    /// Metadata of a live cache record, if present
    pub async fn cache_metadata(&self, id: &DocumentId) -> AdminResult<Option<CacheMetadata>> {
        self.store_call(StoreKind::Cache, self.cache_store.metadata(id))
            .await
    }

    /// Audit entries for deletions that happened on the given UTC date
    pub async fn deletion_log(&self, date: NaiveDate) -> AdminResult<Vec<DeletionLogEntry>> {
        self.audit_call(self.audit_log.query_by_date(date)).await
    }

    /// Drop one day's audit partition, returning how many entries it held.
    /// Touches only the log, so it runs without the maintenance lock.
    pub async fn purge_deletion_log(&self, date: NaiveDate) -> AdminResult<usize> {
        let purged = self.audit_call(self.audit_log.delete_by_date(date)).await?;
        log::info!("🗑️ Purged {} audit entrie(s) for {}", purged, date);
        Ok(purged)
    }

    async fn store_call<T, F>(&self, store: StoreKind, call: F) -> AdminResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match timeout(self.config.store_timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AdminError::store_unavailable(store, e)),
            Err(_) => Err(AdminError::store_unavailable(
                store,
                format!("timed out after {}s", self.config.store_timeout_seconds),
            )),
        }
    }

    async fn audit_call<T, F>(&self, call: F) -> AdminResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match timeout(self.config.store_timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AdminError::audit_unavailable(e)),
            Err(_) => Err(AdminError::audit_unavailable(format!(
                "timed out after {}s",
                self.config.store_timeout_seconds
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{MemoryAuditLog, MemoryCacheStore, MemoryVectorStore};
    use crate::types::DeleteReason;
    use chrono::Duration as ChronoDuration;

    struct TestHarness {
        engine: ReconciliationEngine,
        vectors: Arc<MemoryVectorStore>,
        cache: Arc<MemoryCacheStore>,
        audit: Arc<MemoryAuditLog>,
    }

    fn harness() -> TestHarness {
        harness_with_config(EngineConfig {
            grace_window_seconds: 3600,
            delete_workers: 2,
            store_timeout_seconds: 5,
        })
    }

    fn harness_with_config(config: EngineConfig) -> TestHarness {
        let vectors = Arc::new(MemoryVectorStore::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = ReconciliationEngine::new(
            vectors.clone(),
            cache.clone(),
            audit.clone(),
            config,
        )
        .unwrap();
        TestHarness {
            engine,
            vectors,
            cache,
            audit,
        }
    }

    /// Insert a vector old enough to be outside every test grace window
    async fn insert_old_vector(store: &MemoryVectorStore, id: &str) {
        store
            .insert_with_created_at(
                DocumentId::from(id),
                vec![0; 8],
                Utc::now() - ChronoDuration::days(30),
            )
            .await;
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.grace_window_seconds, 7 * 86_400);
        assert!(config.delete_workers >= 2);
        assert!(config.delete_workers <= 8);
        assert_eq!(config.store_timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_validation() {
        let config = EngineConfig {
            delete_workers: 0,
            ..EngineConfig::default()
        };
        match config.validate().unwrap_err() {
            AdminError::Configuration { message } => {
                assert!(message.contains("delete_workers"));
            }
            _ => panic!("Wrong error type"),
        }

        let config = EngineConfig {
            store_timeout_seconds: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_cleanup_deletes_only_orphans() {
        let h = harness();
        insert_old_vector(&h.vectors, "a").await;
        insert_old_vector(&h.vectors, "b").await;
        insert_old_vector(&h.vectors, "c").await;
        h.cache.insert(DocumentId::from("b"), "summary").await;

        let result = h.engine.cleanup_orphaned_vectors(false).await.unwrap();

        assert_eq!(result.deleted_count, 2);
        assert_eq!(
            result.deleted_ids,
            vec![DocumentId::from("a"), DocumentId::from("c")]
        );
        assert!(result.is_clean());
        assert!(h.vectors.contains(&DocumentId::from("b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_spares_vectors_inside_grace_window() {
        let h = harness();
        // Fresh vector with no cache entry yet
        h.vectors.insert(DocumentId::from("fresh"), vec![0]).await;
        insert_old_vector(&h.vectors, "stale").await;

        let result = h.engine.cleanup_orphaned_vectors(false).await.unwrap();

        assert_eq!(result.deleted_ids, vec![DocumentId::from("stale")]);
        assert!(h.vectors.contains(&DocumentId::from("fresh")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_dry_run_deletes_nothing() {
        let h = harness();
        insert_old_vector(&h.vectors, "orphan").await;

        let result = h.engine.cleanup_orphaned_vectors(true).await.unwrap();

        assert!(result.dry_run);
        assert_eq!(result.deleted_ids, vec![DocumentId::from("orphan")]);
        assert!(h.vectors.contains(&DocumentId::from("orphan")).await.unwrap());
        assert!(h
            .audit
            .query_by_date(Utc::now().date_naive())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let h = harness();
        insert_old_vector(&h.vectors, "a").await;
        insert_old_vector(&h.vectors, "b").await;

        let first = h.engine.cleanup_orphaned_vectors(false).await.unwrap();
        let second = h.engine.cleanup_orphaned_vectors(false).await.unwrap();

        assert_eq!(first.deleted_count, 2);
        assert_eq!(second.deleted_count, 0);
        assert!(second.is_clean());
    }

    #[tokio::test]
    async fn test_cleanup_rejected_while_lock_is_held() {
        let lock = MaintenanceLock::new();
        let vectors = Arc::new(MemoryVectorStore::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = ReconciliationEngine::with_lock(
            vectors,
            cache,
            audit,
            EngineConfig::default(),
            lock.clone(),
        )
        .unwrap();

        let _guard = lock.try_acquire("reset_all").unwrap();
        let err = engine.cleanup_orphaned_vectors(false).await.unwrap_err();
        assert!(err.is_busy());
    }

    #[tokio::test]
    async fn test_expired_cache_cleanup_logs_evictions() {
        let h = harness();
        h.cache
            .insert_with_ttl(DocumentId::from("x"), "old", 0)
            .await;
        h.cache
            .insert_with_ttl(DocumentId::from("y"), "old", 0)
            .await;
        h.cache.insert(DocumentId::from("keep"), "fresh").await;

        let result = h.engine.cleanup_expired_cache().await.unwrap();

        assert_eq!(result.deleted_count, 2);
        let entries = h
            .audit
            .query_by_date(Utc::now().date_naive())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|entry| entry.reason == DeleteReason::Cleanup));

        // Nothing expired on the second pass
        let again = h.engine.cleanup_expired_cache().await.unwrap();
        assert_eq!(again.deleted_count, 0);
    }

    #[tokio::test]
    async fn test_delete_one_existing_record() {
        let h = harness();
        h.vectors.insert(DocumentId::from("doc"), vec![0]).await;

        let existed = h
            .engine
            .delete_one(StoreKind::Vector, &DocumentId::from("doc"))
            .await
            .unwrap();

        assert!(existed);
        let entries = h
            .audit
            .query_by_date(Utc::now().date_naive())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, DeleteReason::Manual);

        let stats = h.engine.engine_stats().await;
        assert_eq!(stats.manual_deletes, 1);
    }

    #[tokio::test]
    async fn test_delete_one_missing_record_is_not_an_error() {
        let h = harness();

        let existed = h
            .engine
            .delete_one(StoreKind::Vector, &DocumentId::from("ghost"))
            .await
            .unwrap();

        assert!(!existed);
        assert!(h
            .audit
            .query_by_date(Utc::now().date_naive())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_reset_all_clears_both_stores() {
        let h = harness();
        insert_old_vector(&h.vectors, "a").await;
        insert_old_vector(&h.vectors, "b").await;
        h.cache.insert(DocumentId::from("c"), "summary").await;

        let outcome = h.engine.reset_all().await.unwrap();

        assert_eq!(outcome.vectors_deleted, 2);
        assert_eq!(outcome.cache_deleted, 1);
        assert!(outcome.is_complete());

        // One summary entry, not one per key
        let entries = h
            .audit
            .query_by_date(Utc::now().date_naive())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, DeleteReason::Reset);
        assert_eq!(entries[0].detail.as_deref(), Some("vectors=2 cache=1 errors=0"));
    }

    #[tokio::test]
    async fn test_stats_combines_both_stores() {
        let h = harness();
        h.vectors.insert(DocumentId::from("v"), vec![0; 64]).await;
        h.cache.insert(DocumentId::from("c"), "summary").await;

        let stats = h.engine.stats().await.unwrap();
        assert_eq!(stats.vectors.count, 1);
        assert_eq!(stats.vectors.disk_bytes, 64);
        assert_eq!(stats.cache.count, 1);
        assert!(stats.cache.memory_bytes > 0);
    }

    #[tokio::test]
    async fn test_keys_by_date_and_contains_passthroughs() {
        let h = harness();
        h.vectors.insert(DocumentId::from("v"), vec![0]).await;
        h.cache.insert(DocumentId::from("c"), "summary").await;
        let today = Utc::now().date_naive();

        assert_eq!(
            h.engine.keys_by_date(StoreKind::Vector, today).await.unwrap(),
            vec![DocumentId::from("v")]
        );
        assert_eq!(
            h.engine.keys_by_date(StoreKind::Cache, today).await.unwrap(),
            vec![DocumentId::from("c")]
        );
        assert!(h
            .engine
            .contains(StoreKind::Vector, &DocumentId::from("v"))
            .await
            .unwrap());
        assert!(!h
            .engine
            .contains(StoreKind::Cache, &DocumentId::from("v"))
            .await
            .unwrap());

        let meta = h
            .engine
            .cache_metadata(&DocumentId::from("c"))
            .await
            .unwrap();
        assert!(meta.is_some());
    }

    #[tokio::test]
    async fn test_deletion_log_query_and_purge() {
        let h = harness();
        insert_old_vector(&h.vectors, "a").await;
        h.engine.cleanup_orphaned_vectors(false).await.unwrap();
        let today = Utc::now().date_naive();

        let entries = h.engine.deletion_log(today).await.unwrap();
        assert_eq!(entries.len(), 1);

        assert_eq!(h.engine.purge_deletion_log(today).await.unwrap(), 1);
        assert!(h.engine.deletion_log(today).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_new_delete_work() {
        let h = harness();
        insert_old_vector(&h.vectors, "a").await;

        h.engine.request_shutdown();
        assert!(h.engine.is_shutting_down());

        let result = h.engine.cleanup_orphaned_vectors(false).await.unwrap();
        assert_eq!(result.deleted_count, 0);
        assert!(h.vectors.contains(&DocumentId::from("a")).await.unwrap());
    }
}
