//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::crop::CropError;

/// Errors returned by command handling.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The command was rejected by the crop aggregate.
    #[error("{0}")]
    Crop(#[from] CropError),

    /// A stored event could not be decoded while reconstructing an aggregate.
    #[error("Event decode error: {0}")]
    Decode(#[from] EventDecodeError),

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True for an append that lost the race against a concurrent command.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}

/// Failure to turn a stored `(name, data)` pair back into a typed event.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("Unknown event kind `{0}`")]
    UnknownEvent(String),

    #[error("Unsupported schema version {found} for `{event_type}`")]
    UnsupportedSchema { event_type: String, found: u64 },

    #[error("Malformed `{event_type}` payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EventDecodeError {
    pub(crate) fn payload(event_type: &str, source: serde_json::Error) -> Self {
        EventDecodeError::Payload {
            event_type: event_type.to_string(),
            source,
        }
    }
}
