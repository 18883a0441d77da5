use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors raised by event store backends.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream advanced past the version the caller based its decision on.
    /// Callers are expected to reload and retry.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `append` is structurally invalid.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    #[error("Event envelope is missing required field `{0}`")]
    IncompleteEnvelope(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true when retrying the whole load/decide/append cycle may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, EventStoreError>;
