//! In-Memory Store Implementations
//!
//! Reference implementations of the store interfaces, used by the test suite
//! and by deployments that run the admin plane against small corpora without
//! external services. The cache store mirrors a production summary cache:
//! LRU-capped, per-entry TTL, lazy expiry on reads plus an explicit sweep.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::stores::{AuditLog, CacheStore, StoreResult, VectorStore};
use crate::types::{
    CacheMetadata, CacheStoreStats, DeletionLogEntry, DocumentId, VectorStoreStats,
};

/// One embedding record held in memory
#[derive(Debug, Clone)]
struct VectorRecord {
    /// Opaque embedding payload; the admin plane never inspects it
    payload: Vec<u8>,
    /// When the record was written (UTC)
    created_at: DateTime<Utc>,
}

/// HashMap-backed vector index
#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    records: Arc<RwLock<HashMap<DocumentId, VectorRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record stamped with the current time
    pub async fn insert(&self, id: DocumentId, payload: Vec<u8>) {
        self.insert_with_created_at(id, payload, Utc::now()).await;
    }

    /// Store a record with an explicit creation time (backfill imports,
    /// age-sensitive tests)
    pub async fn insert_with_created_at(
        &self,
        id: DocumentId,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
    ) {
        let mut records = self.records.write().await;
        records.insert(
            id,
            VectorRecord {
                payload,
                created_at,
            },
        );
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn list_keys(&self) -> StoreResult<Vec<DocumentId>> {
        let records = self.records.read().await;
        let mut keys: Vec<DocumentId> = records.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_keys_by_date(&self, date: NaiveDate) -> StoreResult<Vec<DocumentId>> {
        let records = self.records.read().await;
        let mut keys: Vec<DocumentId> = records
            .iter()
            .filter(|(_, record)| record.created_at.date_naive() == date)
            .map(|(id, _)| id.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn contains(&self, id: &DocumentId) -> StoreResult<bool> {
        let records = self.records.read().await;
        Ok(records.contains_key(id))
    }

    async fn created_at(&self, id: &DocumentId) -> StoreResult<Option<DateTime<Utc>>> {
        let records = self.records.read().await;
        Ok(records.get(id).map(|record| record.created_at))
    }

    async fn delete(&self, id: &DocumentId) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(id).is_some())
    }

    async fn delete_all(&self) -> StoreResult<usize> {
        let mut records = self.records.write().await;
        let count = records.len();
        records.clear();
        Ok(count)
    }

    async fn stats(&self) -> StoreResult<VectorStoreStats> {
        let records = self.records.read().await;
        let disk_bytes: u64 = records
            .values()
            .map(|record| record.payload.len() as u64)
            .sum();
        Ok(VectorStoreStats {
            count: records.len(),
            disk_bytes,
        })
    }
}

/// Configuration for the in-memory summary cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries before LRU eviction kicks in
    pub max_entries: usize,
    /// Default time-to-live for new entries in seconds
    pub default_ttl_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,              // Plenty for a single-tenant corpus
            default_ttl_seconds: 7 * 86_400, // 7 days, matching the summary retention window
        }
    }
}

/// One summary record held in memory
#[derive(Debug, Clone)]
struct CacheRecord {
    summary: String,
    query: Option<String>,
    lang: Option<String>,
    created_at: DateTime<Utc>,
    ttl_seconds: u64,
}

impl CacheRecord {
    fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.ttl_seconds as i64)
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    fn metadata(&self) -> CacheMetadata {
        CacheMetadata {
            query: self.query.clone(),
            lang: self.lang.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at(),
        }
    }

    // Rough per-entry footprint: payload plus bookkeeping
    fn memory_bytes(&self) -> u64 {
        let overhead = 128u64;
        self.summary.len() as u64
            + self.query.as_ref().map_or(0, |q| q.len() as u64)
            + self.lang.as_ref().map_or(0, |l| l.len() as u64)
            + overhead
    }
}

/// LRU-capped TTL cache of summary records
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<LruCache<DocumentId, CacheRecord>>>,
    config: MemoryCacheConfig,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_config(MemoryCacheConfig::default())
    }

    pub fn with_config(config: MemoryCacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::new(4096).unwrap());
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
            config,
        }
    }

    /// Store a summary with the default TTL and no query context
    pub async fn insert(&self, id: DocumentId, summary: impl Into<String>) {
        self.put_record(id, summary.into(), None, None, self.config.default_ttl_seconds, Utc::now())
            .await;
    }

    /// Store a summary with the query context that produced it
    pub async fn insert_summary(
        &self,
        id: DocumentId,
        summary: impl Into<String>,
        query: impl Into<String>,
        lang: impl Into<String>,
    ) {
        self.put_record(
            id,
            summary.into(),
            Some(query.into()),
            Some(lang.into()),
            self.config.default_ttl_seconds,
            Utc::now(),
        )
        .await;
    }

    /// Store a summary with an explicit TTL in seconds
    pub async fn insert_with_ttl(
        &self,
        id: DocumentId,
        summary: impl Into<String>,
        ttl_seconds: u64,
    ) {
        self.put_record(id, summary.into(), None, None, ttl_seconds, Utc::now())
            .await;
    }

    /// Store a summary with an explicit creation time (backfill imports,
    /// date-scoped tests)
    pub async fn insert_with_created_at(
        &self,
        id: DocumentId,
        summary: impl Into<String>,
        created_at: DateTime<Utc>,
    ) {
        self.put_record(
            id,
            summary.into(),
            None,
            None,
            self.config.default_ttl_seconds,
            created_at,
        )
        .await;
    }

    async fn put_record(
        &self,
        id: DocumentId,
        summary: String,
        query: Option<String>,
        lang: Option<String>,
        ttl_seconds: u64,
        created_at: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        entries.put(
            id,
            CacheRecord {
                summary,
                query,
                lang,
                created_at,
                ttl_seconds,
            },
        );
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn live_keys(&self, date: Option<NaiveDate>) -> StoreResult<Vec<DocumentId>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<DocumentId> = entries
            .iter()
            .filter(|(_, record)| !record.is_expired())
            .filter(|(_, record)| {
                date.map_or(true, |d| record.created_at.date_naive() == d)
            })
            .map(|(id, _)| id.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn contains(&self, id: &DocumentId) -> StoreResult<bool> {
        let entries = self.entries.read().await;
        Ok(entries.peek(id).map_or(false, |record| !record.is_expired()))
    }

    async fn metadata(&self, id: &DocumentId) -> StoreResult<Option<CacheMetadata>> {
        let entries = self.entries.read().await;
        Ok(entries
            .peek(id)
            .filter(|record| !record.is_expired())
            .map(|record| record.metadata()))
    }

    async fn delete(&self, id: &DocumentId) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.pop(id).is_some())
    }

    async fn delete_all(&self) -> StoreResult<usize> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn evict_expired(&self) -> StoreResult<Vec<DocumentId>> {
        let mut entries = self.entries.write().await;
        let mut expired: Vec<DocumentId> = entries
            .iter()
            .filter(|(_, record)| record.is_expired())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.pop(id);
        }
        expired.sort();
        Ok(expired)
    }

    async fn stats(&self) -> StoreResult<CacheStoreStats> {
        let entries = self.entries.read().await;
        let live: Vec<&CacheRecord> = entries
            .iter()
            .map(|(_, record)| record)
            .filter(|record| !record.is_expired())
            .collect();
        let memory_bytes = live.iter().map(|record| record.memory_bytes()).sum();
        Ok(CacheStoreStats {
            count: live.len(),
            memory_bytes,
        })
    }
}

/// Deletion log held in memory, partitioned by UTC date
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    partitions: Arc<RwLock<BTreeMap<NaiveDate, Vec<DeletionLogEntry>>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: DeletionLogEntry) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(entry.partition_date())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn query_by_date(&self, date: NaiveDate) -> StoreResult<Vec<DeletionLogEntry>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(&date).cloned().unwrap_or_default())
    }

    async fn delete_by_date(&self, date: NaiveDate) -> StoreResult<usize> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions.remove(&date).map_or(0, |entries| entries.len()))
    }
}
