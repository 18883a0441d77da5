//! Projection processor for feeding events to projections.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::{EventEnvelope, EventStore, Version};
use futures_util::StreamExt;
use growth::EventPublisher;

use crate::Result;
use crate::projection::Projection;

/// Outcome of a catch-up pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    pub events_seen: u64,
    /// Deliveries that changed a projection, re-driven gap events included.
    pub applied: u64,
    pub failures: u64,
}

/// Processes events from an event store and delivers them to projections.
///
/// The processor supports:
/// - Live delivery: hands a committed event to every projection, first
///   re-driving any events of the same aggregate the projection missed
/// - Catch-up: replays the whole log, applying what each projection lacks
/// - Rebuild: resets all projections and replays from scratch
///
/// A failing projection never stops the others; the failure is logged and
/// the event is picked up again by the next catch-up.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.register(projection);
        self
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings one projection up to and including `event`.
    ///
    /// Returns the number of events applied, 0 when the projection was
    /// already past it.
    async fn deliver(&self, projection: &dyn Projection, event: &EventEnvelope) -> Result<u64> {
        let applied_up_to = projection
            .checkpoint(event.aggregate_id)
            .await?
            .unwrap_or_default();
        if event.version <= applied_up_to {
            return Ok(0);
        }

        let mut applied = 0;
        if event.version > applied_up_to.next() {
            let missing = self
                .store
                .get_events_for_aggregate_from_version(event.aggregate_id, applied_up_to.next())
                .await?;
            tracing::debug!(
                projection = projection.name(),
                aggregate_id = %event.aggregate_id,
                from = %applied_up_to.next(),
                to = %event.version,
                "re-driving missed events"
            );
            for missed in missing.iter().take_while(|m| m.version < event.version) {
                projection.handle(missed).await?;
                applied += 1;
            }
        }

        projection.handle(event).await?;
        metrics::counter!("projections_events_processed").increment(applied + 1);
        Ok(applied + 1)
    }

    /// Delivers an event to every projection and returns how many events
    /// were applied in total. Returns the first failure after all
    /// projections have been tried.
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, aggregate_id = %event.aggregate_id, version = %event.version)
    )]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<u64> {
        let mut applied = 0;
        let mut first_error = None;

        for projection in &self.projections {
            match self.deliver(projection.as_ref(), event).await {
                Ok(n) => applied += n,
                Err(error) => {
                    tracing::warn!(
                        projection = projection.name(),
                        error = %error,
                        "projection step abandoned"
                    );
                    metrics::counter!("projections_failures_total", "projection" => projection.name())
                        .increment(1);
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(applied),
        }
    }

    /// Streams the whole log and applies every event newer than each
    /// projection's checkpoint. Failed events are counted and skipped.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<CatchUpReport> {
        let mut stream = self.store.stream_all_events().await?;
        let mut report = CatchUpReport::default();

        while let Some(result) = stream.next().await {
            let event = result?;
            report.events_seen += 1;

            for projection in &self.projections {
                match self.deliver(projection.as_ref(), &event).await {
                    Ok(n) => report.applied += n,
                    Err(error) => {
                        report.failures += 1;
                        tracing::warn!(
                            projection = projection.name(),
                            aggregate_id = %event.aggregate_id,
                            version = %event.version,
                            error = %error,
                            "projection step abandoned during catch-up"
                        );
                        metrics::counter!("projections_failures_total", "projection" => projection.name())
                            .increment(1);
                    }
                }
            }
        }

        tracing::info!(
            events_seen = report.events_seen,
            applied = report.applied,
            failures = report.failures,
            "catch-up complete"
        );

        Ok(report)
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<CatchUpReport> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }

    /// Last version `projection` applied for an aggregate, by name.
    pub async fn checkpoint_of(
        &self,
        projection: &str,
        aggregate_id: event_store::AggregateId,
    ) -> Result<Option<Version>> {
        match self.projections.iter().find(|p| p.name() == projection) {
            Some(p) => p.checkpoint(aggregate_id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<S: EventStore> EventPublisher for ProjectionProcessor<S> {
    async fn publish(&self, events: &[EventEnvelope]) {
        for event in events {
            // Failures are already logged per projection; the repair pass
            // picks the event up again.
            let _ = self.process_event(event).await;
        }
    }
}
