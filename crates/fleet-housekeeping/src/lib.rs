//! fleet-housekeeping — background reconcilers for the appliance fleet.
//!
//! Three independent routines, each invoked once per scheduler tick:
//!
//! - [`PoolSizeReconciler`] tops the spare pool up to its target by
//!   dispatching provisioning requests (fire-and-forget, bounded).
//! - [`ExpiryReclaimer`] hard-deletes soft-deleted appliances and load
//!   balancers once they are older than their retention age.
//! - [`MemoryPersistCoalescer`] issues one batched "write memory" for every
//!   device partition changed since the previous run.
//!
//! # Architecture
//!
//! ```text
//! scheduler tick
//!   ├── PoolSizeReconciler ── Repository ── Provisioner (×deficit, Semaphore(target))
//!   ├── ExpiryReclaimer ───── Repository (list_expired → delete, sequential)
//!   └── MemoryPersistCoalescer
//!         ├── watermark (prev_run_time, owned, &mut self)
//!         ├── Repository::list_updated_since(cutoff)
//!         ├── dedup by (ip, partition)
//!         └── DeviceWriter::persist(batch)   // once per call
//! ```
//!
//! Every decision is re-derived from the repository on each call, so a
//! failed or skipped tick is repaired by the next one. No routine retries
//! locally.

pub mod cleanup;
pub mod collaborators;
pub mod error;
pub mod spare_pool;
pub mod write_memory;

#[cfg(test)]
mod testing;

pub use cleanup::ExpiryReclaimer;
pub use collaborators::{BoxFuture, DeviceWriter, Provisioner, Repository};
pub use error::{HousekeepingError, HousekeepingResult};
pub use spare_pool::{PoolDecision, PoolSizeReconciler};
pub use write_memory::{MemoryPersistCoalescer, PersistOutcome, dedup_by_partition};
