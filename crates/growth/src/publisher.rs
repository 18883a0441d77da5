//! Announcement of committed events.

use async_trait::async_trait;
use event_store::EventEnvelope;

/// Receives events after they have been durably appended.
///
/// Publishing is best effort: implementations deal with their own failures
/// and never report them back to the command path.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: &[EventEnvelope]);
}

/// Drops every event. Used when nothing subscribes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _events: &[EventEnvelope]) {}
}
