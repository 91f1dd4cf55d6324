//! Errors raised by the fleet record store.

use thiserror::Error;

use crate::types::RecordKind;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open fleet database: {0}")]
    Open(String),

    /// redb rejected a transaction, table or row operation.
    #[error("{kind} table: {reason}")]
    Backend { kind: RecordKind, reason: String },

    /// A stored row no longer decodes into its record type.
    #[error("corrupt {kind} record {id}: {reason}")]
    Corrupt {
        kind: RecordKind,
        id: String,
        reason: String,
    },

    #[error("cannot encode {kind} record {id}: {reason}")]
    Encode {
        kind: RecordKind,
        id: String,
        reason: String,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },
}
