//! Housekeeping scheduler — one background loop per routine.
//!
//! Each loop owns its reconciler and calls it strictly sequentially, so a
//! routine never overlaps with itself. Loops for different routines run
//! concurrently. A failed call is logged and the loop waits for its next
//! tick; nothing is retried in between.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use fleet_core::{PoolConfig, ScheduleConfig};
use fleet_housekeeping::{
    ExpiryReclaimer, HousekeepingResult, MemoryPersistCoalescer, PoolDecision,
    PoolSizeReconciler, Repository,
};
use fleet_state::StateStore;

use crate::Routine;
use crate::collaborators::{LoggingDeviceWriter, StandaloneProvisioner};

pub struct Housekeeping {
    spare_pool: PoolSizeReconciler,
    cleanup: ExpiryReclaimer,
    write_memory: MemoryPersistCoalescer,
    schedule: ScheduleConfig,
}

impl Housekeeping {
    pub fn new(state: StateStore, pool: &PoolConfig, schedule: ScheduleConfig) -> Self {
        let repo: Arc<dyn Repository> = Arc::new(state.clone());

        Self {
            spare_pool: PoolSizeReconciler::new(
                Arc::clone(&repo),
                Arc::new(StandaloneProvisioner::new(state)),
                pool.target_spare_size,
            ),
            cleanup: ExpiryReclaimer::new(
                Arc::clone(&repo),
                pool.appliance_retention_age,
                pool.load_balancer_retention_age,
            ),
            write_memory: MemoryPersistCoalescer::new(
                repo,
                Arc::new(LoggingDeviceWriter),
                pool.write_memory_interval,
            ),
            schedule,
        }
    }

    /// Run one routine immediately.
    pub async fn run_once(&mut self, routine: Routine) -> anyhow::Result<()> {
        match routine {
            Routine::SparePool => {
                log_pool_decision(self.spare_pool.reconcile_pool().await?);
            }
            Routine::Cleanup => reclaim_all(&self.cleanup)?,
            Routine::WriteMemory => {
                self.write_memory.persist_recent_changes().await?;
            }
        }
        Ok(())
    }

    /// Start all loops and stop them on Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(self.run(shutdown_rx));

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C, shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);

        handle.await??;
        info!("fleet housekeeping stopped");
        Ok(())
    }

    /// Drive every routine on its interval until `shutdown` flips.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let Housekeeping {
            spare_pool,
            cleanup,
            mut write_memory,
            schedule,
        } = self;

        let ScheduleConfig {
            spare_check_interval,
            cleanup_interval,
            write_memory_interval,
        } = schedule;

        for (name, period) in [
            ("spare_check_interval", spare_check_interval),
            ("cleanup_interval", cleanup_interval),
            ("write_memory_interval", write_memory_interval),
        ] {
            anyhow::ensure!(!period.is_zero(), "{name} must be greater than zero");
        }

        info!(
            spare_check_secs = spare_check_interval.as_secs(),
            cleanup_secs = cleanup_interval.as_secs(),
            write_memory_secs = write_memory_interval.as_secs(),
            "fleet housekeeping started"
        );

        // ── Spare pool ─────────────────────────────────────────────
        let mut spare_shutdown = shutdown.clone();
        let spare_handle = tokio::spawn(async move {
            let mut ticker = ticker(spare_check_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match spare_pool.reconcile_pool().await {
                            Ok(decision) => log_pool_decision(decision),
                            Err(e) => error!(error = %e, "spare pool check failed"),
                        }
                    }
                    _ = spare_shutdown.changed() => break,
                }
            }
            info!(routine = "spare_pool", "housekeeping loop shutting down");
        });

        // ── Cleanup ────────────────────────────────────────────────
        let mut cleanup_shutdown = shutdown.clone();
        let cleanup_handle = tokio::spawn(async move {
            let mut ticker = ticker(cleanup_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = reclaim_all(&cleanup);
                    }
                    _ = cleanup_shutdown.changed() => break,
                }
            }
            info!(routine = "cleanup", "housekeeping loop shutting down");
        });

        // ── Write memory ───────────────────────────────────────────
        let mut write_memory_shutdown = shutdown;
        let write_memory_handle = tokio::spawn(async move {
            let mut ticker = ticker(write_memory_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = write_memory.persist_recent_changes().await {
                            error!(error = %e, "write memory failed");
                        }
                    }
                    _ = write_memory_shutdown.changed() => break,
                }
            }
            info!(routine = "write_memory", "housekeeping loop shutting down");
        });

        for handle in [spare_handle, cleanup_handle, write_memory_handle] {
            if let Err(e) = handle.await {
                warn!(error = %e, "housekeeping loop ended abnormally");
            }
        }
        Ok(())
    }
}

/// Run both reclaims even if the first fails. Each failure is logged; the
/// first one is returned.
fn reclaim_all(cleanup: &ExpiryReclaimer) -> HousekeepingResult<()> {
    let appliances = cleanup.reclaim_appliances();
    if let Err(e) = &appliances {
        error!(error = %e, "expired appliance cleanup failed");
    }
    let load_balancers = cleanup.reclaim_load_balancers();
    if let Err(e) = &load_balancers {
        error!(error = %e, "expired load balancer cleanup failed");
    }

    let (appliances, load_balancers) = (appliances?, load_balancers?);
    info!(
        appliances = appliances.len(),
        load_balancers = load_balancers.len(),
        "cleanup finished"
    );
    Ok(())
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn log_pool_decision(decision: PoolDecision) {
    match decision {
        PoolDecision::Satisfied { current, target } => {
            info!(current, target, "spare pool satisfied");
        }
        PoolDecision::Dispatched { requested, capacity } => {
            info!(requested, capacity, "spare appliance requests dispatched");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use fleet_housekeeping::HousekeepingError;
    use fleet_state::{
        ApplianceRecord, DeviceRef, LoadBalancerRecord, RecordKind, RecordStatus, StateError,
        StateResult,
    };

    /// Store whose appliance expiry query always fails.
    struct BrokenApplianceQueries(StateStore);

    impl Repository for BrokenApplianceQueries {
        fn count_spare_appliances(&self) -> StateResult<u32> {
            self.0.count_spare_appliances()
        }

        fn list_expired(&self, kind: RecordKind, retention_age: Duration) -> StateResult<Vec<String>> {
            if kind == RecordKind::Appliance {
                return Err(StateError::Backend {
                    kind,
                    reason: "disk full".to_string(),
                });
            }
            Repository::list_expired(&self.0, kind, retention_age)
        }

        fn delete(&self, kind: RecordKind, id: &str) -> StateResult<()> {
            Repository::delete(&self.0, kind, id)
        }

        fn list_updated_since(&self, cutoff: chrono::DateTime<Utc>) -> StateResult<Vec<DeviceRef>> {
            self.0.list_appliances_updated_since(cutoff)
        }
    }

    fn pool(target_spare_size: u32) -> PoolConfig {
        PoolConfig {
            target_spare_size,
            ..PoolConfig::default()
        }
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let state = StateStore::open_in_memory().unwrap();
        let schedule = ScheduleConfig {
            cleanup_interval: Duration::ZERO,
            ..ScheduleConfig::default()
        };
        let (_tx, rx) = watch::channel(false);

        let err = Housekeeping::new(state, &pool(0), schedule)
            .run(rx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cleanup_interval"));
    }

    #[tokio::test]
    async fn loops_tick_immediately_and_stop_on_shutdown() {
        let state = StateStore::open_in_memory().unwrap();
        let (tx, rx) = watch::channel(false);
        let housekeeping = Housekeeping::new(state.clone(), &pool(2), ScheduleConfig::default());
        let handle = tokio::spawn(housekeeping.run(rx));

        tokio::time::timeout(Duration::from_secs(2), async {
            while state.count_spare_appliances().unwrap() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn run_once_cleanup_purges_expired_appliances() {
        let state = StateStore::open_in_memory().unwrap();
        let mut record = ApplianceRecord::new("old", "p1", "vt-1", "10.0.0.1", "shared", Utc::now());
        record.status = RecordStatus::Deleted;
        record.deleted_at = Some(Utc::now() - TimeDelta::days(30));
        state.put_appliance(&record).unwrap();

        let mut housekeeping = Housekeeping::new(state.clone(), &pool(0), ScheduleConfig::default());
        housekeeping.run_once(Routine::Cleanup).await.unwrap();

        assert!(state.get_appliance("old").unwrap().is_none());
    }

    #[test]
    fn cleanup_failure_on_appliances_still_purges_load_balancers() {
        let state = StateStore::open_in_memory().unwrap();
        let long_ago = Utc::now() - TimeDelta::days(30);
        state
            .put_load_balancer(&LoadBalancerRecord::new("lb-old", "p1", "web", long_ago))
            .unwrap();
        state.soft_delete_load_balancer("lb-old", long_ago).unwrap();

        let week = Duration::from_secs(7 * 24 * 3600);
        let cleanup =
            ExpiryReclaimer::new(Arc::new(BrokenApplianceQueries(state.clone())), week, week);

        let err = reclaim_all(&cleanup).unwrap_err();

        assert!(matches!(
            err,
            HousekeepingError::Storage(StateError::Backend {
                kind: RecordKind::Appliance,
                ..
            })
        ));
        assert!(state.get_load_balancer("lb-old").unwrap().is_none());
    }
}
