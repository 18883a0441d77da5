//! Events published by the task context that crop read models react to.
//!
//! Only the completion fact crosses the boundary; the task's category, area
//! and target crop are resolved through [`TaskQuery`](crate::lookup::TaskQuery).

use chrono::{DateTime, Utc};
use common::{AggregateId, TaskId};
use event_store::{EventEnvelope, EventStoreError, Version};
use serde::{Deserialize, Serialize};

use crate::error::EventDecodeError;

pub const TASK_AGGREGATE_TYPE: &str = "Task";

pub const TASK_COMPLETED: &str = "TaskCompleted";

/// Domain tag of tasks raised against crop batches.
pub const CROP_DOMAIN: &str = "CROP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletedData {
    pub task_id: TaskId,
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

impl TaskCompletedData {
    pub fn new(task_id: TaskId, completed_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            status: "COMPLETED".to_string(),
            completed_at,
        }
    }

    /// Returns `Ok(None)` for task events other than a completion.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Option<Self>, EventDecodeError> {
        if envelope.aggregate_type != TASK_AGGREGATE_TYPE || envelope.event_type != TASK_COMPLETED {
            return Ok(None);
        }
        serde_json::from_value(envelope.data.clone())
            .map(Some)
            .map_err(|e| EventDecodeError::payload(TASK_COMPLETED, e))
    }

    /// Wraps the completion as an event of the task's own stream.
    pub fn to_envelope(&self, version: Version) -> Result<EventEnvelope, EventStoreError> {
        EventEnvelope::builder()
            .aggregate_id(AggregateId::from_task(self.task_id))
            .aggregate_type(TASK_AGGREGATE_TYPE)
            .event_type(TASK_COMPLETED)
            .version(version)
            .created_at(self.completed_at)
            .data(serde_json::to_value(self)?)
            .schema_version(1)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_recognized_by_type_and_name() {
        let data = TaskCompletedData::new(TaskId::new(), Utc::now());
        let envelope = data.to_envelope(Version::new(4)).unwrap();

        assert_eq!(envelope.aggregate_id, AggregateId::from_task(data.task_id));
        let decoded = TaskCompletedData::from_envelope(&envelope).unwrap();
        assert_eq!(decoded, Some(data));
    }

    #[test]
    fn other_task_events_are_ignored() {
        let mut envelope = TaskCompletedData::new(TaskId::new(), Utc::now())
            .to_envelope(Version::first())
            .unwrap();
        envelope.event_type = "TaskCreated".to_string();

        assert_eq!(TaskCompletedData::from_envelope(&envelope).unwrap(), None);
    }
}
