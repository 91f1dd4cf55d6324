//! fleet-state — embedded record store for the appliance fleet.
//!
//! Backed by [redb](https://docs.rs/redb), holds appliance and load-balancer
//! records with their soft-delete lifecycle, and answers the queries the
//! housekeeping reconcilers run every tick: spare count, expired ids, and
//! recently updated device partitions.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns, keyed by
//! record id. The `StateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
