//! Storage contracts for the read models.
//!
//! Every write carries the [`Checkpoint`] of the event that caused it. A
//! backend stores row and checkpoint atomically, and applies the write only
//! when the checkpoint directly follows the stored one; otherwise it writes
//! nothing and returns `false`.
//!
//! A crop row has two writers. Crop events replace the row under the crop
//! stream's checkpoint but keep the stored task stamps; task events touch
//! nothing but the stamp columns, under the task stream's checkpoint.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common::{AggregateId, AreaId, FarmId, Page};
use event_store::Version;
use growth::crop::CropStatus;

use crate::Result;
use crate::projection::Checkpoint;
use crate::views::{
    ActivityType, BatchCount, CropActivity, CropRead, CropsInformation, TaskStamp,
};

pub use memory::{InMemoryCropActivityStore, InMemoryCropReadStore};
pub use postgres::{PostgresCropActivityStore, PostgresCropReadStore};

#[async_trait]
pub trait CropReadStore: Send + Sync {
    /// Writes the row, keeping the task stamps already stored on its buckets.
    async fn save(&self, crop: &CropRead, checkpoint: Checkpoint) -> Result<bool>;

    /// Sets one task column on one bucket of a stored row.
    ///
    /// A missing row is a `MissingReference` error and leaves the checkpoint
    /// where it was. A row without a bucket for the stamp's area only
    /// advances the checkpoint.
    async fn stamp_task(&self, stamp: &TaskStamp, checkpoint: Checkpoint) -> Result<bool>;

    /// Records an event that changed no row.
    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool>;

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    async fn find_by_id(&self, id: AggregateId) -> Result<Option<CropRead>>;

    async fn find_by_batch_id(&self, batch_id: &str) -> Result<Option<CropRead>>;

    /// Batches of a farm, most recently planted first.
    async fn find_all_by_farm(
        &self,
        farm_id: FarmId,
        status: Option<CropStatus>,
        page: Page,
    ) -> Result<Vec<CropRead>>;

    async fn count_all_by_farm(&self, farm_id: FarmId, status: Option<CropStatus>) -> Result<u64>;

    async fn find_archives(&self, farm_id: FarmId, page: Page) -> Result<Vec<CropRead>> {
        self.find_all_by_farm(farm_id, Some(CropStatus::Archived), page)
            .await
    }

    async fn count_archives(&self, farm_id: FarmId) -> Result<u64> {
        self.count_all_by_farm(farm_id, Some(CropStatus::Archived))
            .await
    }

    /// Batches planted in, or moved into, `area_id`.
    async fn find_by_area(&self, area_id: AreaId) -> Result<Vec<CropRead>>;

    async fn crops_information(&self, farm_id: FarmId) -> Result<CropsInformation>;

    /// Batch count per variety, ordered by variety name.
    async fn count_total_batch(&self, farm_id: FarmId) -> Result<Vec<BatchCount>>;

    /// Drops every row and checkpoint.
    async fn reset(&self) -> Result<()>;
}

#[async_trait]
pub trait CropActivityStore: Send + Sync {
    /// Inserts the entry, or replaces the entry with the same ID.
    async fn save(&self, activity: &CropActivity, checkpoint: Checkpoint) -> Result<bool>;

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool>;

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Timeline of a batch, newest first.
    async fn find_all_by_crop(&self, crop_id: AggregateId) -> Result<Vec<CropActivity>>;

    /// The most recent entry of a kind.
    async fn find_by_crop_and_type(
        &self,
        crop_id: AggregateId,
        activity_type: ActivityType,
    ) -> Result<Option<CropActivity>>;

    async fn reset(&self) -> Result<()>;
}
