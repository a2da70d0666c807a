//! File-Backed Deletion Log
//!
//! Persists audit entries as JSON lines, one file per UTC date
//! (`deletions-YYYY-MM-DD.jsonl`). Partition files are append-only; the only
//! mutation ever applied is dropping a whole partition through
//! [`AuditLog::delete_by_date`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use glob::glob;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::stores::{AuditLog, StoreError, StoreResult};
use crate::types::DeletionLogEntry;

const PARTITION_PREFIX: &str = "deletions-";
const PARTITION_SUFFIX: &str = ".jsonl";

/// Date-partitioned deletion log on the local filesystem
pub struct FileAuditLog {
    dir: PathBuf,
    // Serializes appends; interleaved writes would corrupt partition lines
    write_guard: Mutex<()>,
}

impl FileAuditLog {
    /// Open a log rooted at the given directory, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                StoreError::unavailable(format!(
                    "failed to create audit directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(Self {
            dir,
            write_guard: Mutex::new(()),
        })
    }

    /// Open a log under the default per-user location
    pub fn open_default() -> StoreResult<Self> {
        Self::new(Self::default_dir()?)
    }

    /// Default log location: `~/.docsweep/deletions`
    pub fn default_dir() -> StoreResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".docsweep").join("deletions"))
            .ok_or_else(|| StoreError::unavailable("home directory not available"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            PARTITION_PREFIX,
            date.format("%Y-%m-%d"),
            PARTITION_SUFFIX
        ))
    }

    /// Dates that currently have a partition file, oldest first
    pub fn partition_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let pattern = self
            .dir
            .join(format!("{}*{}", PARTITION_PREFIX, PARTITION_SUFFIX));
        let pattern_str = pattern.to_string_lossy();

        let mut dates = Vec::new();
        let entries = glob(&pattern_str)
            .map_err(|e| StoreError::unavailable(format!("bad partition pattern: {}", e)))?;
        for entry in entries {
            match entry {
                Ok(path) => {
                    if let Some(date) = partition_date_from_path(&path) {
                        dates.push(date);
                    }
                }
                Err(e) => {
                    log::warn!("⚠️ Skipping unreadable audit partition: {}", e);
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Total bytes the log occupies on disk
    pub fn disk_usage_bytes(&self) -> u64 {
        WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|metadata| metadata.len())
            .sum()
    }
}

fn partition_date_from_path(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date_part = name
        .strip_prefix(PARTITION_PREFIX)?
        .strip_suffix(PARTITION_SUFFIX)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, entry: DeletionLogEntry) -> StoreResult<()> {
        let line = serde_json::to_string(&entry)?;
        let path = self.partition_path(entry.partition_date());

        let _guard = self.write_guard.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                StoreError::unavailable(format!(
                    "failed to open audit partition {}: {}",
                    path.display(),
                    e
                ))
            })?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    async fn query_by_date(&self, date: NaiveDate) -> StoreResult<Vec<DeletionLogEntry>> {
        let path = self.partition_path(date);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let mut entries = Vec::new();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<DeletionLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    log::warn!(
                        "⚠️ Skipping malformed audit line in {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
        Ok(entries)
    }

    async fn delete_by_date(&self, date: NaiveDate) -> StoreResult<usize> {
        let path = self.partition_path(date);
        if !path.exists() {
            return Ok(0);
        }

        let _guard = self.write_guard.lock().await;
        let content = fs::read_to_string(&path)?;
        let count = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();
        fs::remove_file(&path)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentId, StoreKind};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn test_log() -> (FileAuditLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(temp_dir.path().join("deletions")).unwrap();
        (log, temp_dir)
    }

    #[tokio::test]
    async fn test_append_and_query_round_trip() {
        let (log, _temp_dir) = test_log();
        let today = Utc::now().date_naive();

        log.append(DeletionLogEntry::cleanup(
            DocumentId::from("a"),
            StoreKind::Vector,
        ))
        .await
        .unwrap();
        log.append(DeletionLogEntry::manual(
            DocumentId::from("b"),
            StoreKind::Cache,
        ))
        .await
        .unwrap();

        let entries = log.query_by_date(today).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].document_id.as_str(), "a"); // Append order preserved
        assert_eq!(entries[1].document_id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_query_missing_partition_is_empty() {
        let (log, _temp_dir) = test_log();
        let entries = log
            .query_by_date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_entries_route_to_their_dates_partition() {
        let (log, _temp_dir) = test_log();
        let mut old_entry =
            DeletionLogEntry::cleanup(DocumentId::from("old"), StoreKind::Vector);
        old_entry.deleted_at = Utc::now() - Duration::days(3);
        let old_date = old_entry.partition_date();

        log.append(old_entry).await.unwrap();
        log.append(DeletionLogEntry::cleanup(
            DocumentId::from("new"),
            StoreKind::Vector,
        ))
        .await
        .unwrap();

        let old_entries = log.query_by_date(old_date).await.unwrap();
        assert_eq!(old_entries.len(), 1);
        assert_eq!(old_entries[0].document_id.as_str(), "old");

        let new_entries = log.query_by_date(Utc::now().date_naive()).await.unwrap();
        assert_eq!(new_entries.len(), 1);

        let dates = log.partition_dates().unwrap();
        assert_eq!(dates.len(), 2);
        assert!(dates[0] < dates[1]); // Oldest first
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (log, _temp_dir) = test_log();
        let today = Utc::now().date_naive();

        log.append(DeletionLogEntry::cleanup(
            DocumentId::from("good"),
            StoreKind::Vector,
        ))
        .await
        .unwrap();

        // Corrupt the partition with a half-written line
        let path = log.partition_path(today);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"document_id\": \"trunc").unwrap();

        log.append(DeletionLogEntry::cleanup(
            DocumentId::from("also-good"),
            StoreKind::Vector,
        ))
        .await
        .unwrap();

        let entries = log.query_by_date(today).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].document_id.as_str(), "good");
        assert_eq!(entries[1].document_id.as_str(), "also-good");
    }

    #[tokio::test]
    async fn test_delete_by_date_removes_partition() {
        let (log, _temp_dir) = test_log();
        let today = Utc::now().date_naive();

        for i in 0..3 {
            log.append(DeletionLogEntry::cleanup(
                DocumentId::new(format!("doc-{}", i)),
                StoreKind::Vector,
            ))
            .await
            .unwrap();
        }

        assert_eq!(log.delete_by_date(today).await.unwrap(), 3);
        assert!(log.query_by_date(today).await.unwrap().is_empty());
        assert_eq!(log.delete_by_date(today).await.unwrap(), 0);
        assert!(log.partition_dates().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disk_usage_grows_with_entries() {
        let (log, _temp_dir) = test_log();
        assert_eq!(log.disk_usage_bytes(), 0);

        log.append(DeletionLogEntry::cleanup(
            DocumentId::from("doc"),
            StoreKind::Vector,
        ))
        .await
        .unwrap();

        assert!(log.disk_usage_bytes() > 0);
    }

    #[test]
    fn test_partition_date_parsing() {
        let path = Path::new("/tmp/deletions-2025-03-09.jsonl");
        assert_eq!(
            partition_date_from_path(path),
            NaiveDate::from_ymd_opt(2025, 3, 9)
        );

        assert_eq!(
            partition_date_from_path(Path::new("/tmp/other-file.jsonl")),
            None
        );
        assert_eq!(
            partition_date_from_path(Path::new("/tmp/deletions-not-a-date.jsonl")),
            None
        );
    }

    #[test]
    fn test_default_dir_is_under_home() {
        // Home may be unset in minimal environments; only check the shape
        if let Ok(dir) = FileAuditLog::default_dir() {
            assert!(dir.ends_with(".docsweep/deletions"));
        }
    }
}
