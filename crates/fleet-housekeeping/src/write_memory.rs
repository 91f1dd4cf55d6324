//! Coalesced write memory.
//!
//! Every call persists the running configuration of each device partition
//! whose appliance row changed since the last run, in a single batch.
//!
//! # Lookback window
//!
//! ```text
//! fresh_cutoff = now - interval
//! cutoff       = watermark   if watermark (whole seconds) < fresh_cutoff (whole seconds)
//!              = fresh_cutoff otherwise, including the first call
//! ```
//!
//! The window is therefore never narrower than `interval` and stretches
//! back to the previous run when a tick was late or skipped. The watermark
//! lives in memory only: after a restart the first window is exactly
//! `interval` wide.
//!
//! Several appliance rows can point at the same `(ip, partition)`; the
//! batch holds each pair once, in first-seen order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use fleet_state::DeviceRef;
use tracing::{debug, info, warn};

use crate::collaborators::{DeviceWriter, Repository};
use crate::error::{HousekeepingError, HousekeepingResult};

/// Result of one write memory pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// One persist call was issued with this deduplicated batch.
    Persisted { devices: Vec<DeviceRef> },
    /// Nothing changed inside the window; no persist call was made.
    NothingToPersist,
}

pub struct MemoryPersistCoalescer {
    repo: Arc<dyn Repository>,
    writer: Arc<dyn DeviceWriter>,
    interval: Duration,
    /// Start time of the previous call.
    prev_run_time: Option<DateTime<Utc>>,
}

impl MemoryPersistCoalescer {
    pub fn new(repo: Arc<dyn Repository>, writer: Arc<dyn DeviceWriter>, interval: Duration) -> Self {
        Self {
            repo,
            writer,
            interval,
            prev_run_time: None,
        }
    }

    /// Start time of the previous call, if any.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.prev_run_time
    }

    /// Lower bound of the update window for a call starting at `now`.
    pub fn cutoff_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let fresh_cutoff = TimeDelta::from_std(self.interval)
            .ok()
            .and_then(|interval| now.checked_sub_signed(interval))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        match self.prev_run_time {
            Some(prev) if prev.timestamp() < fresh_cutoff.timestamp() => {
                debug!(previous_run = %prev, "previous write memory ran before the window, widening");
                prev
            }
            _ => fresh_cutoff,
        }
    }

    /// Persist configuration on every device partition updated since the
    /// last run.
    pub async fn persist_recent_changes(&mut self) -> HousekeepingResult<PersistOutcome> {
        self.persist_recent_changes_at(Utc::now()).await
    }

    /// [`persist_recent_changes`](Self::persist_recent_changes) with an
    /// explicit start time.
    ///
    /// The watermark advances before the persist call, so a failed write
    /// does not widen the next window.
    pub async fn persist_recent_changes_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> HousekeepingResult<PersistOutcome> {
        let cutoff = self.cutoff_for(now);
        let devices = dedup_by_partition(self.repo.list_updated_since(cutoff)?);

        self.prev_run_time = Some(self.prev_run_time.map_or(now, |prev| prev.max(now)));

        if devices.is_empty() {
            warn!(%cutoff, "no recently updated devices found, not performing write memory");
            return Ok(PersistOutcome::NothingToPersist);
        }

        let targets: Vec<String> = devices.iter().map(ToString::to_string).collect();
        info!(?targets, %cutoff, "write memory for devices");
        self.writer
            .persist(&devices)
            .await
            .map_err(HousekeepingError::DeviceWrite)?;
        info!(count = devices.len(), "finished write memory");

        Ok(PersistOutcome::Persisted { devices })
    }
}

/// Keep the first device seen for each `(ip, partition)` pair, in order.
pub fn dedup_by_partition(devices: Vec<DeviceRef>) -> Vec<DeviceRef> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(devices.len());
    devices
        .into_iter()
        .filter(|d| seen.insert((d.ip_address.clone(), d.partition_name.clone())))
        .collect()
}
