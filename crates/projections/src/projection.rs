//! Core projection trait and per-aggregate checkpoints.

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, Version};

use crate::Result;

/// Last version of one aggregate's stream a projection has applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub aggregate_id: AggregateId,
    pub version: Version,
}

impl Checkpoint {
    pub fn new(aggregate_id: AggregateId, version: Version) -> Self {
        Self {
            aggregate_id,
            version,
        }
    }

    /// The checkpoint reached once `event` has been applied.
    pub fn of(event: &EventEnvelope) -> Self {
        Self::new(event.aggregate_id, event.version)
    }

    /// Whether this checkpoint directly follows `stored`, the last applied
    /// version. Only such writes are accepted, so a row is never rebuilt
    /// from a stale copy.
    pub fn follows(&self, stored: Option<Version>) -> bool {
        stored.unwrap_or_default().next() == self.version
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.aggregate_id, self.version)
    }
}

/// A projection that processes events and updates a read model.
///
/// Every event a projection handles must be recorded as a [`Checkpoint`]
/// atomically with the read-model change it causes, including events the
/// projection ignores. Writes whose checkpoint does not directly follow the
/// stored one are dropped, which makes replays and concurrent deliveries
/// idempotent.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Last applied version for `aggregate_id`, `None` if nothing was applied.
    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_must_follow_the_stored_version() {
        let id = AggregateId::new();
        let third = Checkpoint::new(id, Version::new(3));
        assert!(third.follows(Some(Version::new(2))));
        assert!(!third.follows(Some(Version::new(3))));
        assert!(!third.follows(Some(Version::new(1))));
        assert!(!third.follows(None));

        assert!(Checkpoint::new(id, Version::first()).follows(None));
    }
}
