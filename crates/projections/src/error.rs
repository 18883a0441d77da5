//! Projection error types.

use growth::{EventDecodeError, LookupError};
use thiserror::Error;

/// Errors that can occur during projection processing and read-model queries.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    #[error("Event decode error: {0}")]
    Decode(#[from] EventDecodeError),

    /// A collaborator failed to answer.
    #[error("{collaborator} lookup failed: {source}")]
    Lookup {
        collaborator: &'static str,
        #[source]
        source: LookupError,
    },

    /// Something an event refers to does not exist (yet).
    #[error("{kind} {id} not found")]
    MissingReference { kind: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value the read model cannot represent.
    #[error("Corrupt read-model row: {0}")]
    Corrupt(String),
}

impl ProjectionError {
    pub(crate) fn lookup(collaborator: &'static str) -> impl FnOnce(LookupError) -> Self {
        move |source| ProjectionError::Lookup {
            collaborator,
            source,
        }
    }

    pub(crate) fn missing(kind: &'static str, id: impl ToString) -> Self {
        ProjectionError::MissingReference {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
