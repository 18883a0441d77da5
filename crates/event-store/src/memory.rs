use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    streams: HashMap<AggregateId, Vec<EventEnvelope>>,
    /// Commit order across all streams as `(aggregate, index into its stream)`.
    commit_order: Vec<(AggregateId, usize)>,
}

/// Event store that keeps every stream in process memory.
///
/// All streams live behind one reader/writer lock, so appends are serialized
/// while any number of loads run concurrently.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all aggregates.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.commit_order.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events, options)?;

        let aggregate_id = events[0].aggregate_id;
        let mut log = self.log.write().await;

        let current = log
            .streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version)
            .unwrap_or_else(Version::initial);

        if current != options.expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version,
                actual: current,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(options.expected_version);

        let Log {
            streams,
            commit_order,
        } = &mut *log;
        let stream = streams.entry(aggregate_id).or_default();
        for event in events {
            commit_order.push((aggregate_id, stream.len()));
            stream.push(event);
        }

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .streams
            .get(&aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let events: Vec<EventEnvelope> = log
            .commit_order
            .iter()
            .filter_map(|(id, index)| log.streams.get(id).and_then(|s| s.get(*index)))
            .cloned()
            .collect();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.log.read().await;
        Ok(log
            .streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version))
    }
}
