//! Read model views built from crop and task events.

pub mod crop_activity;
pub mod crop_read;

pub use crop_activity::{ActivityKind, ActivityType, CropActivity, CropActivityProjection};
pub use crop_read::{
    AreaStatus, AreaView, BatchCount, CropRead, CropReadProjection, CropsInformation,
    HarvestedStorageView, InventoryView, MovedAreaView, TaskStamp, TaskStampKind, TrashView,
};

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventEnvelope;
use growth::{CROP_DOMAIN, TaskCompletedData, TaskRecord};

use crate::Result;
use crate::lookups::ReadModelLookups;

pub(crate) const NUTRIENT: &str = "NUTRIENT";
pub(crate) const PESTCONTROL: &str = "PESTCONTROL";

/// A completed task that was raised against a crop batch.
pub(crate) struct CropTask {
    pub record: TaskRecord,
    pub crop_id: AggregateId,
    pub completed_at: DateTime<Utc>,
}

/// Resolves a task event into the crop task it completes, if any.
///
/// Events other than a completion, and tasks of other domains or without a
/// target crop, yield `None`.
pub(crate) async fn completed_crop_task(
    lookups: &ReadModelLookups,
    event: &EventEnvelope,
) -> Result<Option<CropTask>> {
    let Some(completed) = TaskCompletedData::from_envelope(event)? else {
        return Ok(None);
    };
    let record = lookups.task(completed.task_id).await?;
    if record.domain != CROP_DOMAIN {
        return Ok(None);
    }
    let Some(crop_id) = record.crop_id else {
        return Ok(None);
    };
    Ok(Some(CropTask {
        record,
        crop_id,
        completed_at: completed.completed_at,
    }))
}
