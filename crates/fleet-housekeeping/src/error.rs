//! Housekeeping error types.

use thiserror::Error;

/// Errors that abort a housekeeping call.
///
/// Provisioning failures have no variant: the spare pool reconciler drops
/// them and lets the next tick recompute the deficit.
#[derive(Debug, Error)]
pub enum HousekeepingError {
    #[error("state store error: {0}")]
    Storage(#[from] fleet_state::StateError),

    #[error("device write failed: {0}")]
    DeviceWrite(anyhow::Error),
}

pub type HousekeepingResult<T> = Result<T, HousekeepingError>;
