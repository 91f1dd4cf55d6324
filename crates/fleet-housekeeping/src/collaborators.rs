//! Seams to the systems housekeeping drives but does not own.
//!
//! The repository is synchronous (redb calls are short and local); the
//! provisioner and device writer are async because they reach out over
//! the network.

use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_state::{DeviceRef, RecordKind, StateError, StateResult, StateStore};

/// Boxed, `Send` future returned by the async collaborators.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Read/delete access to fleet records.
pub trait Repository: Send + Sync {
    /// Active appliances not assigned to a load balancer.
    fn count_spare_appliances(&self) -> StateResult<u32>;

    /// Ids of soft-deleted records of `kind` whose deletion is older than
    /// `now - retention_age`, in deletion order.
    fn list_expired(&self, kind: RecordKind, retention_age: Duration) -> StateResult<Vec<String>>;

    /// Physically remove one record. Unknown ids are an error.
    fn delete(&self, kind: RecordKind, id: &str) -> StateResult<()>;

    /// Device partitions whose appliance row changed at or after `cutoff`.
    fn list_updated_since(&self, cutoff: DateTime<Utc>) -> StateResult<Vec<DeviceRef>>;
}

/// Triggers the external workflow that builds and registers one appliance.
pub trait Provisioner: Send + Sync {
    fn request_new_appliance(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Persists running configuration on a batch of device partitions.
///
/// A single unreachable device fails the whole batch.
pub trait DeviceWriter: Send + Sync {
    fn persist<'a>(&'a self, devices: &'a [DeviceRef]) -> BoxFuture<'a, anyhow::Result<()>>;
}

impl Repository for StateStore {
    fn count_spare_appliances(&self) -> StateResult<u32> {
        StateStore::count_spare_appliances(self)
    }

    fn list_expired(&self, kind: RecordKind, retention_age: Duration) -> StateResult<Vec<String>> {
        let now = Utc::now();
        match kind {
            RecordKind::Appliance => self.list_expired_appliances(retention_age, now),
            RecordKind::LoadBalancer => self.list_expired_load_balancers(retention_age, now),
        }
    }

    fn delete(&self, kind: RecordKind, id: &str) -> StateResult<()> {
        let existed = match kind {
            RecordKind::Appliance => self.delete_appliance(id)?,
            RecordKind::LoadBalancer => self.delete_load_balancer(id)?,
        };
        if existed {
            Ok(())
        } else {
            Err(StateError::NotFound {
                kind,
                id: id.to_string(),
            })
        }
    }

    fn list_updated_since(&self, cutoff: DateTime<Utc>) -> StateResult<Vec<DeviceRef>> {
        self.list_appliances_updated_since(cutoff)
    }
}
