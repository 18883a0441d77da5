//! In-memory read-model stores.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, AreaId, FarmId, Page};
use event_store::Version;
use growth::crop::CropStatus;
use growth::{BatchIdQuery, LookupResult};
use tokio::sync::RwLock;

use super::{CropActivityStore, CropReadStore};
use crate::projection::Checkpoint;
use crate::views::{
    ActivityType, BatchCount, CropActivity, CropRead, CropsInformation, TaskStamp,
};
use crate::{ProjectionError, Result};

#[derive(Debug, Default)]
struct ReadState {
    crops: HashMap<AggregateId, CropRead>,
    checkpoints: HashMap<AggregateId, Version>,
}

impl ReadState {
    fn farm(&self, farm_id: FarmId, status: Option<CropStatus>) -> Vec<&CropRead> {
        let mut crops: Vec<_> = self
            .crops
            .values()
            .filter(|c| c.farm_id == farm_id && status.is_none_or(|s| c.status == s))
            .collect();
        crops.sort_by(|a, b| {
            b.initial_area
                .bucket
                .created_at
                .cmp(&a.initial_area.bucket.created_at)
        });
        crops
    }
}

/// Advances the checkpoint of `checkpoint.aggregate_id` when it follows the
/// stored one.
fn advance(checkpoints: &mut HashMap<AggregateId, Version>, checkpoint: Checkpoint) -> bool {
    if !checkpoint.follows(checkpoints.get(&checkpoint.aggregate_id).copied()) {
        return false;
    }
    checkpoints.insert(checkpoint.aggregate_id, checkpoint.version);
    true
}

/// Crop read models held in memory. Rows and checkpoints share one lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCropReadStore {
    state: Arc<RwLock<ReadState>>,
}

impl InMemoryCropReadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.crops.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CropReadStore for InMemoryCropReadStore {
    async fn save(&self, crop: &CropRead, checkpoint: Checkpoint) -> Result<bool> {
        let mut state = self.state.write().await;
        if !advance(&mut state.checkpoints, checkpoint) {
            return Ok(false);
        }
        let mut crop = crop.clone();
        if let Some(stored) = state.crops.get(&crop.id) {
            crop.keep_task_stamps(stored);
        }
        state.crops.insert(crop.id, crop);
        Ok(true)
    }

    async fn stamp_task(&self, stamp: &TaskStamp, checkpoint: Checkpoint) -> Result<bool> {
        let mut state = self.state.write().await;
        if !checkpoint.follows(state.checkpoints.get(&checkpoint.aggregate_id).copied()) {
            return Ok(false);
        }
        let Some(crop) = state.crops.get_mut(&stamp.crop_id) else {
            return Err(ProjectionError::missing("crop read model", stamp.crop_id));
        };
        crop.stamp_task(stamp);
        Ok(advance(&mut state.checkpoints, checkpoint))
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(advance(&mut state.checkpoints, checkpoint))
    }

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.state.read().await.checkpoints.get(&aggregate_id).copied())
    }

    async fn find_by_id(&self, id: AggregateId) -> Result<Option<CropRead>> {
        Ok(self.state.read().await.crops.get(&id).cloned())
    }

    async fn find_by_batch_id(&self, batch_id: &str) -> Result<Option<CropRead>> {
        Ok(self
            .state
            .read()
            .await
            .crops
            .values()
            .find(|c| c.batch_id == batch_id)
            .cloned())
    }

    async fn find_all_by_farm(
        &self,
        farm_id: FarmId,
        status: Option<CropStatus>,
        page: Page,
    ) -> Result<Vec<CropRead>> {
        let state = self.state.read().await;
        Ok(state
            .farm(farm_id, status)
            .into_iter()
            .skip(page.offset())
            .take(page.size())
            .cloned()
            .collect())
    }

    async fn count_all_by_farm(&self, farm_id: FarmId, status: Option<CropStatus>) -> Result<u64> {
        Ok(self.state.read().await.farm(farm_id, status).len() as u64)
    }

    async fn find_by_area(&self, area_id: AreaId) -> Result<Vec<CropRead>> {
        let state = self.state.read().await;
        let mut crops: Vec<_> = state
            .crops
            .values()
            .filter(|c| c.touches_area(area_id))
            .cloned()
            .collect();
        crops.sort_by(|a, b| {
            b.initial_area
                .bucket
                .created_at
                .cmp(&a.initial_area.bucket.created_at)
        });
        Ok(crops)
    }

    async fn crops_information(&self, farm_id: FarmId) -> Result<CropsInformation> {
        let state = self.state.read().await;
        let crops = state.farm(farm_id, None);
        let varieties: BTreeSet<_> = crops.iter().map(|c| c.inventory.name.as_str()).collect();
        Ok(CropsInformation {
            total_harvest_produced: crops.iter().map(|c| c.produced_grams()).sum(),
            total_plant_variety: varieties.len() as u64,
        })
    }

    async fn count_total_batch(&self, farm_id: FarmId) -> Result<Vec<BatchCount>> {
        let state = self.state.read().await;
        let mut counts = BTreeMap::<&str, u64>::new();
        for crop in state.farm(farm_id, None) {
            *counts.entry(crop.inventory.name.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(variety_name, total_batch)| BatchCount {
                variety_name: variety_name.to_string(),
                total_batch,
            })
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.crops.clear();
        state.checkpoints.clear();
        Ok(())
    }
}

#[async_trait]
impl BatchIdQuery for InMemoryCropReadStore {
    async fn find_crop_by_batch_id(&self, batch_id: &str) -> LookupResult<AggregateId> {
        Ok(self
            .state
            .read()
            .await
            .crops
            .values()
            .find(|c| c.batch_id == batch_id)
            .map(|c| c.id))
    }
}

#[derive(Debug, Default)]
struct ActivityState {
    /// Insertion order.
    activities: Vec<CropActivity>,
    checkpoints: HashMap<AggregateId, Version>,
}

/// Activity timelines held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCropActivityStore {
    state: Arc<RwLock<ActivityState>>,
}

impl InMemoryCropActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CropActivityStore for InMemoryCropActivityStore {
    async fn save(&self, activity: &CropActivity, checkpoint: Checkpoint) -> Result<bool> {
        let mut state = self.state.write().await;
        if !advance(&mut state.checkpoints, checkpoint) {
            return Ok(false);
        }
        match state.activities.iter_mut().find(|a| a.id == activity.id) {
            Some(existing) => *existing = activity.clone(),
            None => state.activities.push(activity.clone()),
        }
        Ok(true)
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(advance(&mut state.checkpoints, checkpoint))
    }

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.state.read().await.checkpoints.get(&aggregate_id).copied())
    }

    async fn find_all_by_crop(&self, crop_id: AggregateId) -> Result<Vec<CropActivity>> {
        let state = self.state.read().await;
        let mut timeline: Vec<_> = state
            .activities
            .iter()
            .rev()
            .filter(|a| a.crop_id == crop_id)
            .cloned()
            .collect();
        // Stable, so entries sharing a timestamp stay newest-inserted first.
        timeline.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(timeline)
    }

    async fn find_by_crop_and_type(
        &self,
        crop_id: AggregateId,
        activity_type: ActivityType,
    ) -> Result<Option<CropActivity>> {
        Ok(self
            .find_all_by_crop(crop_id)
            .await?
            .into_iter()
            .find(|a| a.activity_type() == activity_type))
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.activities.clear();
        state.checkpoints.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{ActivityId, MaterialId};
    use growth::crop::{AreaBucket, Container, CropType};

    use crate::views::{ActivityKind, AreaStatus, AreaView, InventoryView, TaskStampKind};

    fn crop(farm_id: FarmId, variety: &str, day: u32) -> CropRead {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap();
        CropRead {
            id: AggregateId::new(),
            batch_id: format!("{variety}-{day}mar"),
            status: CropStatus::Active,
            crop_type: CropType::Seeding,
            container: Container::default(),
            inventory: InventoryView {
                id: MaterialId::new(),
                name: variety.to_string(),
                plant_type: "VEGETABLE".to_string(),
            },
            farm_id,
            initial_area: AreaView {
                name: "Nursery".to_string(),
                bucket: AreaBucket::new(AreaId::new(), 10, at),
            },
            moved_areas: Vec::new(),
            harvested_storage: Vec::new(),
            trash: Vec::new(),
            notes: Vec::new(),
            photos: Vec::new(),
            area_status: AreaStatus::default(),
        }
    }

    async fn insert(store: &InMemoryCropReadStore, crop: &CropRead) {
        let cp = Checkpoint::new(crop.id, Version::first());
        assert!(store.save(crop, cp).await.unwrap());
    }

    #[tokio::test]
    async fn save_requires_the_next_version() {
        let store = InMemoryCropReadStore::new();
        let mut row = crop(FarmId::new(), "basil", 1);
        insert(&store, &row).await;

        row.batch_id = "stale".to_string();
        let replay = Checkpoint::new(row.id, Version::first());
        assert!(!store.save(&row, replay).await.unwrap());
        let skip = Checkpoint::new(row.id, Version::new(3));
        assert!(!store.save(&row, skip).await.unwrap());

        let stored = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(stored.batch_id, "basil-1mar");
        assert_eq!(store.checkpoint(row.id).await.unwrap(), Some(Version::first()));
    }

    #[tokio::test]
    async fn task_stamps_outlive_row_saves_from_older_copies() {
        let store = InMemoryCropReadStore::new();
        let row = crop(FarmId::new(), "basil", 1);
        insert(&store, &row).await;
        let area_id = row.initial_area.bucket.area_id;
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 6, 0, 0).unwrap();
        let task_stream = AggregateId::new();

        let stamp = TaskStamp {
            crop_id: row.id,
            area_id,
            kind: TaskStampKind::Fertilized,
            at,
        };
        let first = Checkpoint::new(task_stream, Version::first());
        assert!(store.stamp_task(&stamp, first).await.unwrap());
        assert!(!store.stamp_task(&stamp, first).await.unwrap());

        let mut older = row.clone();
        older.batch_id = "basil-renamed".to_string();
        let next = Checkpoint::new(row.id, Version::new(2));
        assert!(store.save(&older, next).await.unwrap());

        let stored = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(stored.batch_id, "basil-renamed");
        assert_eq!(stored.initial_area.bucket.last_fertilized, Some(at));
        assert_eq!(store.checkpoint(task_stream).await.unwrap(), Some(Version::first()));
    }

    #[tokio::test]
    async fn farm_listing_is_newest_first_and_paged() {
        let store = InMemoryCropReadStore::new();
        let farm_id = FarmId::new();
        for day in [3, 1, 2] {
            insert(&store, &crop(farm_id, "basil", day)).await;
        }
        insert(&store, &crop(FarmId::new(), "basil", 4)).await;

        let first = store
            .find_all_by_farm(farm_id, None, Page::new(1, 2))
            .await
            .unwrap();
        let days: Vec<_> = first.iter().map(|c| c.batch_id.as_str()).collect();
        assert_eq!(days, ["basil-3mar", "basil-2mar"]);

        let second = store
            .find_all_by_farm(farm_id, None, Page::new(2, 2))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(store.count_all_by_farm(farm_id, None).await.unwrap(), 3);
        assert_eq!(store.count_archives(farm_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn varieties_are_counted_by_inventory_name() {
        let store = InMemoryCropReadStore::new();
        let farm_id = FarmId::new();
        for (variety, day) in [("basil", 1), ("tomato", 2), ("basil", 3)] {
            insert(&store, &crop(farm_id, variety, day)).await;
        }

        let info = store.crops_information(farm_id).await.unwrap();
        assert_eq!(info.total_plant_variety, 2);
        assert_eq!(info.total_harvest_produced, 0.0);

        let counts = store.count_total_batch(farm_id).await.unwrap();
        assert_eq!(
            counts,
            vec![
                BatchCount {
                    variety_name: "basil".to_string(),
                    total_batch: 2
                },
                BatchCount {
                    variety_name: "tomato".to_string(),
                    total_batch: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn batch_id_lookup_answers_with_the_holder() {
        let store = InMemoryCropReadStore::new();
        let row = crop(FarmId::new(), "basil", 1);
        insert(&store, &row).await;

        assert_eq!(
            store.find_crop_by_batch_id("basil-1mar").await.unwrap(),
            Some(row.id)
        );
        assert_eq!(store.find_crop_by_batch_id("mint-1mar").await.unwrap(), None);
    }

    #[tokio::test]
    async fn activity_save_replaces_by_id() {
        let store = InMemoryCropActivityStore::new();
        let crop_id = AggregateId::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut seed = CropActivity {
            id: ActivityId::new(),
            crop_id,
            batch_id: "basil-1mar".to_string(),
            container_type: "POT".to_string(),
            created_at: at,
            description: String::new(),
            kind: ActivityKind::Seed {
                area_id: AreaId::new(),
                area_name: "Nursery".to_string(),
                quantity: 10,
                seeding_date: at,
            },
        };
        assert!(
            store
                .save(&seed, Checkpoint::new(crop_id, Version::first()))
                .await
                .unwrap()
        );

        seed.description = "UPDATED".to_string();
        assert!(
            store
                .save(&seed, Checkpoint::new(crop_id, Version::new(2)))
                .await
                .unwrap()
        );

        let timeline = store.find_all_by_crop(crop_id).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].description, "UPDATED");
    }
}
