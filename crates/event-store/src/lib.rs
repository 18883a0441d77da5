//! Append-only, per-aggregate versioned event log.
//!
//! Every backend implements [`EventStore`]; appends carry the version the
//! caller based its decision on and are rejected with
//! [`EventStoreError::ConcurrencyConflict`] when the stream has moved.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, SCHEMA_VERSION_KEY, Version, WireEvent};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
