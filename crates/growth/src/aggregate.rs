//! Core aggregate and domain event traits, and replay of stored history.

use common::AggregateId;
use event_store::{EventEnvelope, Version};

use crate::error::EventDecodeError;

/// A fact recorded by an aggregate.
///
/// Events carry their own codec: `encode` produces the `Data` object stored
/// next to the `event_type` discriminator, and `decode` dispatches on that
/// discriminator before parsing the payload.
pub trait DomainEvent: Clone + Send + Sync + Sized {
    /// Discriminator stored as the event's `Name`.
    fn event_type(&self) -> &'static str;

    /// Version of the payload layout written by `encode`.
    fn schema_version() -> u64 {
        1
    }

    fn encode(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn decode(event_type: &str, data: serde_json::Value) -> Result<Self, EventDecodeError>;

    /// Decodes a stored envelope, rejecting payloads written by a newer schema.
    fn from_envelope(envelope: &EventEnvelope) -> Result<Self, EventDecodeError> {
        if let Some(found) = envelope.schema_version()
            && found > Self::schema_version()
        {
            return Err(EventDecodeError::UnsupportedSchema {
                event_type: envelope.event_type.clone(),
                found,
            });
        }
        Self::decode(&envelope.event_type, envelope.data.clone())
    }
}

/// An event-sourced consistency boundary.
///
/// State is derived only from the aggregate's own events: command methods
/// inspect the current state and return new events, and `apply` folds an
/// event into the state.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    fn aggregate_type() -> &'static str;

    /// `None` until the creation event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Version of the last applied event, 0 for a fresh aggregate.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Folds one event into the state.
    ///
    /// Must be deterministic and must not fail: events are facts that were
    /// already validated when they were produced.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Rebuilds an aggregate from its stored history, oldest event first.
pub fn reconstruct<A: Aggregate>(history: &[EventEnvelope]) -> Result<A, EventDecodeError> {
    let mut aggregate = A::default();
    replay_onto(&mut aggregate, history)?;
    Ok(aggregate)
}

/// Applies further stored events to an already reconstructed aggregate.
pub fn replay_onto<A: Aggregate>(
    aggregate: &mut A,
    history: &[EventEnvelope],
) -> Result<(), EventDecodeError> {
    for envelope in history {
        let event = A::Event::from_envelope(envelope)?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum CounterEvent {
        Opened,
        Added(i32),
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened => "CounterOpened",
                CounterEvent::Added(_) => "CounterAdded",
            }
        }

        fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
            match self {
                CounterEvent::Opened => Ok(serde_json::json!({})),
                CounterEvent::Added(n) => Ok(serde_json::json!({ "amount": n })),
            }
        }

        fn decode(event_type: &str, data: serde_json::Value) -> Result<Self, EventDecodeError> {
            match event_type {
                "CounterOpened" => Ok(CounterEvent::Opened),
                "CounterAdded" => data["amount"]
                    .as_i64()
                    .map(|n| CounterEvent::Added(n as i32))
                    .ok_or_else(|| {
                        EventDecodeError::payload(
                            event_type,
                            serde::de::Error::missing_field("amount"),
                        )
                    }),
                other => Err(EventDecodeError::UnknownEvent(other.to_string())),
            }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        id: Option<AggregateId>,
        total: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened => self.id = Some(AggregateId::from_uuid(uuid::Uuid::nil())),
                CounterEvent::Added(n) => self.total += n,
            }
        }
    }

    fn envelope(event: &CounterEvent, version: i64, schema: u64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Counter")
            .event_type(event.event_type())
            .version(Version::new(version))
            .data(event.encode().unwrap())
            .schema_version(schema)
            .build()
            .unwrap()
    }

    #[test]
    fn reconstruct_folds_in_order_and_tracks_version() {
        let history = vec![
            envelope(&CounterEvent::Opened, 1, 1),
            envelope(&CounterEvent::Added(5), 2, 1),
            envelope(&CounterEvent::Added(-2), 3, 1),
        ];

        let counter: Counter = reconstruct(&history).unwrap();
        assert!(counter.id().is_some());
        assert_eq!(counter.total, 3);
        assert_eq!(counter.version(), Version::new(3));
    }

    #[test]
    fn prefix_then_rest_matches_full_replay() {
        let history = vec![
            envelope(&CounterEvent::Opened, 1, 1),
            envelope(&CounterEvent::Added(5), 2, 1),
            envelope(&CounterEvent::Added(7), 3, 1),
        ];

        let full: Counter = reconstruct(&history).unwrap();
        let mut partial: Counter = reconstruct(&history[..1]).unwrap();
        replay_onto(&mut partial, &history[1..]).unwrap();
        assert_eq!(full, partial);
    }

    #[test]
    fn unknown_event_kind_is_a_decode_error() {
        let mut bad = envelope(&CounterEvent::Opened, 1, 1);
        bad.event_type = "CounterExploded".to_string();

        let err = reconstruct::<Counter>(&[bad]).unwrap_err();
        assert!(matches!(err, EventDecodeError::UnknownEvent(name) if name == "CounterExploded"));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let history = vec![envelope(&CounterEvent::Opened, 1, 2)];
        let err = reconstruct::<Counter>(&history).unwrap_err();
        assert!(matches!(err, EventDecodeError::UnsupportedSchema { found: 2, .. }));
    }
}
