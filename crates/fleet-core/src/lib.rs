//! fleet-core — configuration and shared types for the fleet housekeeping
//! workspace.
//!
//! `fleet.toml` is parsed into a raw [`FleetConfig`] (every field optional)
//! and then resolved into the typed [`PoolConfig`] and [`ScheduleConfig`]
//! consumed by the reconcilers and the daemon.

pub mod config;
pub mod types;

pub use config::{ConfigError, FleetConfig, PoolConfig, ScheduleConfig, parse_duration};
pub use types::*;
