//! Spare pool reconciler — keeps enough unassigned appliances warm.
//!
//! Each call reads the current spare count and, if it is below target,
//! dispatches one provisioning request per missing appliance. Requests run
//! on spawned tasks gated by a semaphore sized to the *target* pool size.
//!
//! Dispatch is fire-and-forget: the call returns as soon as every request
//! has been handed to the pool. Completion is never awaited and failures
//! are only logged. A lost request shows up as a deficit on the next tick,
//! which is the only retry this routine has.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::collaborators::{Provisioner, Repository};
use crate::error::HousekeepingResult;

/// What a spare pool check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolDecision {
    /// At or above target. Oversized pools are left alone.
    Satisfied { current: u32, target: u32 },
    /// `requested` provisioning requests were dispatched to a pool of
    /// `capacity` workers.
    Dispatched { requested: u32, capacity: u32 },
}

pub struct PoolSizeReconciler {
    repo: Arc<dyn Repository>,
    provisioner: Arc<dyn Provisioner>,
    target_spare_size: u32,
}

impl PoolSizeReconciler {
    pub fn new(
        repo: Arc<dyn Repository>,
        provisioner: Arc<dyn Provisioner>,
        target_spare_size: u32,
    ) -> Self {
        Self {
            repo,
            provisioner,
            target_spare_size,
        }
    }

    /// Compare the spare count against target and dispatch the deficit.
    ///
    /// Only a failure to read the spare count is returned as an error.
    pub async fn reconcile_pool(&self) -> HousekeepingResult<PoolDecision> {
        let target = self.target_spare_size;
        let current = self.repo.count_spare_appliances()?;
        debug!(target, current, "spare pool check");

        if current >= target {
            debug!("current spare count satisfies the requirement");
            return Ok(PoolDecision::Satisfied { current, target });
        }

        let deficit = target - current;
        info!(deficit, "initiating creation of spare appliances");

        let workers = Arc::new(Semaphore::new(target as usize));
        for request in 1..=deficit {
            let workers = Arc::clone(&workers);
            let provisioner = Arc::clone(&self.provisioner);
            debug!(request, "dispatching spare appliance request");

            // The handle is dropped on purpose: outcomes are never collected.
            tokio::spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };
                if let Err(e) = provisioner.request_new_appliance().await {
                    warn!(request, error = %e, "spare appliance request failed");
                }
            });
        }

        Ok(PoolDecision::Dispatched {
            requested: deficit,
            capacity: target,
        })
    }
}
