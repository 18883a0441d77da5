use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Metadata key holding the payload schema version of an event.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-aggregate stream position.
///
/// The first event of an aggregate is version 1 and every following event
/// increments it by exactly one. Version 0 means "no events yet".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of an aggregate with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version carried by the first event of an aggregate.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Serialized body of an event as it is persisted: the discriminator and
/// the event-specific object side by side.
///
/// ```json
/// { "Name": "CropBatchMoved", "Data": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Data")]
    pub data: serde_json::Value,
}

/// A committed (or about to be committed) event with its stream metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Event-kind discriminator, e.g. `"CropBatchCreated"`.
    pub event_type: String,

    pub aggregate_id: AggregateId,

    /// Kind of aggregate that owns the stream, e.g. `"Crop"` or `"Task"`.
    pub aggregate_type: String,

    /// Version of the aggregate after this event.
    pub version: Version,

    pub created_at: DateTime<Utc>,

    /// Event-specific JSON object.
    pub data: serde_json::Value,

    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Returns the persisted `{"Name", "Data"}` body of this event.
    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            name: self.event_type.clone(),
            data: self.data.clone(),
        }
    }

    /// Schema version recorded in the metadata, if any.
    pub fn schema_version(&self) -> Option<u64> {
        self.metadata
            .get(SCHEMA_VERSION_KEY)
            .and_then(serde_json::Value::as_u64)
    }
}

/// Builder for [`EventEnvelope`].
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    created_at: Option<DateTime<Utc>>,
    data: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. A random one is generated otherwise.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the creation time. Defaults to now.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Takes the discriminator and payload from a persisted body.
    pub fn wire(mut self, wire: WireEvent) -> Self {
        self.event_type = Some(wire.name);
        self.data = Some(wire.data);
        self
    }

    pub fn schema_version(self, version: u64) -> Self {
        self.metadata(SCHEMA_VERSION_KEY, serde_json::Value::from(version))
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, failing with the name of the first missing field.
    pub fn build(self) -> Result<EventEnvelope, EventStoreError> {
        let missing = EventStoreError::IncompleteEnvelope;
        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.ok_or(missing("event_type"))?,
            aggregate_id: self.aggregate_id.ok_or(missing("aggregate_id"))?,
            aggregate_type: self.aggregate_type.ok_or(missing("aggregate_type"))?,
            version: self.version.ok_or(missing("version"))?,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            data: self.data.ok_or(missing("data"))?,
            metadata: self.metadata,
        })
    }
}
