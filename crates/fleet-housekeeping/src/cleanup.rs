//! Expired record cleanup.
//!
//! Soft-deleted appliances and load balancers are purged once their
//! `deleted_at` is older than the configured retention age. Deletion is
//! sequential; the first failure stops the batch and the leftover ids are
//! picked up again by the next call's query.

use std::sync::Arc;
use std::time::Duration;

use fleet_state::RecordKind;
use tracing::info;

use crate::collaborators::Repository;
use crate::error::HousekeepingResult;

pub struct ExpiryReclaimer {
    repo: Arc<dyn Repository>,
    appliance_retention_age: Duration,
    load_balancer_retention_age: Duration,
}

impl ExpiryReclaimer {
    pub fn new(
        repo: Arc<dyn Repository>,
        appliance_retention_age: Duration,
        load_balancer_retention_age: Duration,
    ) -> Self {
        Self {
            repo,
            appliance_retention_age,
            load_balancer_retention_age,
        }
    }

    /// Purge expired appliance records. Returns the purged ids.
    pub fn reclaim_appliances(&self) -> HousekeepingResult<Vec<String>> {
        self.reclaim(RecordKind::Appliance, self.appliance_retention_age)
    }

    /// Purge expired load-balancer records. Returns the purged ids.
    pub fn reclaim_load_balancers(&self) -> HousekeepingResult<Vec<String>> {
        self.reclaim(RecordKind::LoadBalancer, self.load_balancer_retention_age)
    }

    fn reclaim(&self, kind: RecordKind, retention_age: Duration) -> HousekeepingResult<Vec<String>> {
        let ids = self.repo.list_expired(kind, retention_age)?;
        info!(%kind, ?ids, "expired records");

        let mut purged = Vec::with_capacity(ids.len());
        for id in ids {
            info!(%kind, %id, "attempting to purge record");
            self.repo.delete(kind, &id)?;
            info!(%kind, %id, "purged record");
            purged.push(id);
        }
        Ok(purged)
    }
}
