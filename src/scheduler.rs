//! Daily Cleanup Scheduler
//!
//! Fires the orphaned-vector cleanup once a day at a configured UTC time,
//! defaulting to a low-traffic overnight slot. The scheduler never queues
//! behind other maintenance: when the tick finds the maintenance lock held it
//! skips the run, logs the skip, and counts it, because the next day's tick
//! will catch anything left behind.
//!
//! Startup waits for both stores to answer a stats probe before the first
//! tick is armed, so a slow store mount cannot turn into a spurious cleanup
//! failure.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::engine::ReconciliationEngine;
use crate::errors::{AdminError, AdminResult};

/// Configuration for the daily cleanup schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the daily run is armed at all
    pub enabled: bool,
    /// UTC hour of the daily run (0-23)
    pub hour: u32,
    /// UTC minute of the daily run (0-59)
    pub minute: u32,
    /// Seconds between store readiness probes at startup
    pub startup_probe_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 3,                           // 03:00 UTC, low-traffic window
            minute: 0,
            startup_probe_interval_seconds: 1,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> AdminResult<()> {
        if self.hour > 23 {
            return Err(AdminError::Configuration {
                message: format!("scheduler hour must be 0-23, got {}", self.hour),
            });
        }
        if self.minute > 59 {
            return Err(AdminError::Configuration {
                message: format!("scheduler minute must be 0-59, got {}", self.minute),
            });
        }
        if self.startup_probe_interval_seconds == 0 {
            return Err(AdminError::Configuration {
                message: "startup_probe_interval_seconds must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.startup_probe_interval_seconds)
    }
}

/// Running counters for the scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Ticks that reached their scheduled time
    pub ticks_fired: u64,
    /// Ticks whose cleanup ran to completion
    pub runs_completed: u64,
    /// Ticks skipped because maintenance was already running
    pub runs_skipped_busy: u64,
    /// Ticks whose cleanup returned an error other than busy
    pub runs_failed: u64,
    /// When the most recent tick fired
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Background task driving the daily cleanup
pub struct CleanupScheduler {
    engine: ReconciliationEngine,
    config: SchedulerConfig,
    stats: Arc<RwLock<SchedulerStats>>,
    shutdown: watch::Sender<bool>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CleanupScheduler {
    pub fn new(engine: ReconciliationEngine, config: SchedulerConfig) -> AdminResult<Self> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            engine,
            config,
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            shutdown,
            worker: std::sync::Mutex::new(None),
        })
    }

    /// Spawn the scheduling loop. A disabled scheduler logs and does nothing.
    pub fn start(&self) -> AdminResult<()> {
        if !self.config.enabled {
            log::warn!("⏸️ Cleanup scheduler disabled by configuration");
            return Ok(());
        }

        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            log::warn!("⚠️ Cleanup scheduler already running");
            return Ok(());
        }

        let engine = self.engine.clone();
        let config = self.config.clone();
        let stats = self.stats.clone();
        let shutdown_rx = self.shutdown.subscribe();
        *worker = Some(tokio::spawn(run_loop(engine, config, stats, shutdown_rx)));
        Ok(())
    }

    /// Stop the scheduling loop and wait for the task to finish
    pub async fn shutdown(&self) {
        log::info!("🛑 Stopping cleanup scheduler");
        let _ = self.shutdown.send(true);
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("⚠️ Scheduler task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Snapshot of the scheduler's counters
    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }
}

async fn run_loop(
    engine: ReconciliationEngine,
    config: SchedulerConfig,
    stats: Arc<RwLock<SchedulerStats>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    log::info!(
        "📅 Cleanup scheduler started, daily run at {:02}:{:02} UTC",
        config.hour,
        config.minute
    );

    if !wait_for_stores(&engine, &config, &mut shutdown_rx).await {
        log::info!("🛑 Cleanup scheduler stopping before first tick");
        return;
    }

    loop {
        let delay = delay_until_next_tick(Utc::now(), config.hour, config.minute);
        log::debug!("⏰ Next cleanup tick in {}s", delay.as_secs());

        tokio::select! {
            _ = sleep(delay) => {
                fire_tick(&engine, &stats).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    log::info!("🛑 Cleanup scheduler stopping");
                    break;
                }
                // Spurious wake, recompute the delay
            }
        }
    }
}

/// Probe both stores until they answer, so a slow mount at process start
/// cannot fail the first scheduled run
async fn wait_for_stores(
    engine: &ReconciliationEngine,
    config: &SchedulerConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        match engine.stats().await {
            Ok(stats) => {
                log::info!(
                    "🚀 Stores ready: {} vector(s), {} cache entrie(s)",
                    stats.vectors.count,
                    stats.cache.count
                );
                return true;
            }
            Err(e) => {
                log::debug!("⏳ Stores not ready yet: {}", e);
            }
        }

        tokio::select! {
            _ = sleep(config.probe_interval()) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return false;
                }
            }
        }
    }
}

async fn fire_tick(engine: &ReconciliationEngine, stats: &Arc<RwLock<SchedulerStats>>) {
    {
        let mut stats = stats.write().await;
        stats.ticks_fired += 1;
        stats.last_tick_at = Some(Utc::now());
    }

    match engine.cleanup_orphaned_vectors(false).await {
        Ok(result) => {
            stats.write().await.runs_completed += 1;
            log::info!(
                "✅ Scheduled cleanup removed {} orphaned vector(s), {} error(s)",
                result.deleted_count,
                result.error_count
            );
        }
        Err(e) if e.is_busy() => {
            stats.write().await.runs_skipped_busy += 1;
            log::warn!("⏭️ Scheduled cleanup skipped: {}", e);
        }
        Err(e) => {
            stats.write().await.runs_failed += 1;
            log::error!("❌ Scheduled cleanup failed: {}", e);
        }
    }
}

/// Time until the next occurrence of `hour:minute` UTC, strictly after `now`
fn delay_until_next_tick(now: DateTime<Utc>, hour: u32, minute: u32) -> Duration {
    let target = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(target).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    let millis = (next - now).num_milliseconds().max(0) as u64;
    Duration::from_millis(millis)
}
