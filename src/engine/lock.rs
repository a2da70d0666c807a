use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::{AdminError, AdminResult};

/// Mutual-exclusion guard over maintenance operations.
///
/// Cleanup and reset runs share one critical section: only a single such run
/// may touch the stores at a time. Acquisition never waits; contenders get
/// [`AdminError::Busy`] naming the operation currently holding the lock.
///
/// The lock belongs to an engine instance and is injected at construction,
/// which lets tests stage contention deterministically.
#[derive(Clone)]
pub struct MaintenanceLock {
    permits: Arc<Semaphore>,
    holder: Arc<Mutex<Option<&'static str>>>,
}

impl Default for MaintenanceLock {
    fn default() -> Self {
        Self::new()
    }
}

impl MaintenanceLock {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            holder: Arc::new(Mutex::new(None)),
        }
    }

    /// Take the lock for the named operation, failing fast when it is held
    pub fn try_acquire(&self, operation: &'static str) -> AdminResult<MaintenanceGuard> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => {
                *self.holder.lock().unwrap() = Some(operation);
                log::debug!("🔒 Maintenance lock acquired by '{}'", operation);
                Ok(MaintenanceGuard {
                    operation,
                    holder: self.holder.clone(),
                    _permit: permit,
                })
            }
            Err(_) => {
                let holder = self.holder.lock().unwrap().unwrap_or("unknown");
                Err(AdminError::Busy {
                    operation: operation.to_string(),
                    holder: holder.to_string(),
                })
            }
        }
    }

    /// Whether some maintenance operation currently holds the lock
    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Name of the operation holding the lock, if any
    pub fn holder(&self) -> Option<&'static str> {
        *self.holder.lock().unwrap()
    }
}

/// Releases the maintenance lock when dropped
#[derive(Debug)]
pub struct MaintenanceGuard {
    operation: &'static str,
    holder: Arc<Mutex<Option<&'static str>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for MaintenanceGuard {
    fn drop(&mut self) {
        *self.holder.lock().unwrap() = None;
        log::debug!("🔓 Maintenance lock released by '{}'", self.operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Barrier;

    #[test]
    fn test_lock_acquire_and_release() {
        let lock = MaintenanceLock::new();
        assert!(!lock.is_held());

        let guard = lock.try_acquire("cleanup_orphaned_vectors");
        assert!(guard.is_ok());
        assert!(lock.is_held());
        assert_eq!(lock.holder(), Some("cleanup_orphaned_vectors"));

        drop(guard);
        assert!(!lock.is_held());
        assert_eq!(lock.holder(), None);

        // Reacquirable after release
        let guard2 = lock.try_acquire("reset_all");
        assert!(guard2.is_ok());
    }

    #[test]
    fn test_double_acquire_fails_with_holder_name() {
        let lock = MaintenanceLock::new();
        let _guard = lock.try_acquire("cleanup_orphaned_vectors").unwrap();

        let second = lock.try_acquire("reset_all");
        assert!(second.is_err());

        match second.unwrap_err() {
            AdminError::Busy { operation, holder } => {
                assert_eq!(operation, "reset_all");
                assert_eq!(holder, "cleanup_orphaned_vectors");
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_clones_share_the_lock() {
        let lock = MaintenanceLock::new();
        let clone = lock.clone();

        let _guard = lock.try_acquire("cleanup_expired_cache").unwrap();
        assert!(clone.is_held());
        assert!(clone.try_acquire("reset_all").is_err());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let lock = MaintenanceLock::new();
        let barrier = Arc::new(Barrier::new(10));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let lock = lock.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    // Winning guards stay alive until every task has tried
                    lock.try_acquire("cleanup_orphaned_vectors").ok()
                })
            })
            .collect();

        // Keep every returned guard alive until all tasks have been counted
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        let winners = results.iter().filter(|guard| guard.is_some()).count();
        assert_eq!(winners, 1);
    }
}
