//! Off-path delivery of committed events.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::EventEnvelope;
use growth::EventPublisher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hands committed events to a single worker task that forwards them to an
/// inner publisher, so the command path never waits on projections.
///
/// Batches are forwarded in the order they were published. The worker stops
/// once every clone of the publisher has been dropped.
#[derive(Clone)]
pub struct BackgroundPublisher {
    sender: mpsc::UnboundedSender<Vec<EventEnvelope>>,
}

impl BackgroundPublisher {
    pub fn spawn(inner: Arc<dyn EventPublisher>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<EventEnvelope>>();
        let worker = tokio::spawn(async move {
            while let Some(batch) = receiver.recv().await {
                inner.publish(&batch).await;
            }
            tracing::debug!("background publisher stopped");
        });
        (Self { sender }, worker)
    }
}

#[async_trait]
impl EventPublisher for BackgroundPublisher {
    async fn publish(&self, events: &[EventEnvelope]) {
        if self.sender.send(events.to_vec()).is_err() {
            tracing::warn!(
                events = events.len(),
                "background publisher worker is gone; events left for the repair pass"
            );
        }
    }
}
