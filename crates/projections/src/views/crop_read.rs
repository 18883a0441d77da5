//! Crop read model: the current state of each batch with names resolved.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, AreaId, FarmId, MaterialId, NoteId};
use event_store::{EventEnvelope, Version};
use growth::crop::{
    AreaBucket, BatchCreatedData, Container, CropNote, CropPhoto, CropStatus, CropType,
    DumpedData, HarvestedData, HarvestedStorage, MovedArea, MovedData, Trash, UpdatedArea,
};
use growth::{
    Aggregate, AreaRecord, AreaType, Crop, CropEvent, DomainEvent, MaterialRecord,
    TASK_AGGREGATE_TYPE,
};
use serde::{Deserialize, Serialize};

use super::{NUTRIENT, PESTCONTROL, completed_crop_task};
use crate::lookups::ReadModelLookups;
use crate::projection::{Checkpoint, Projection};
use crate::store::CropReadStore;
use crate::{ProjectionError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryView {
    pub id: MaterialId,
    pub name: String,
    pub plant_type: String,
}

impl From<&MaterialRecord> for InventoryView {
    fn from(material: &MaterialRecord) -> Self {
        Self {
            id: material.id,
            name: material.name.clone(),
            plant_type: material.plant_type.clone(),
        }
    }
}

/// A bucket together with the name of its area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaView {
    pub name: String,
    #[serde(flatten)]
    pub bucket: AreaBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovedAreaView {
    pub source_area_id: AreaId,
    #[serde(flatten)]
    pub area: AreaView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedStorageView {
    pub source_area_name: String,
    #[serde(flatten)]
    pub storage: HarvestedStorage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashView {
    pub source_area_name: String,
    #[serde(flatten)]
    pub trash: Trash,
}

/// Running totals of plants per area type, plus everything dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AreaStatus {
    pub seeding: u32,
    pub growing: u32,
    pub dumped: u32,
}

impl AreaStatus {
    fn slot(&mut self, area_type: AreaType) -> &mut u32 {
        match area_type {
            AreaType::Seeding => &mut self.seeding,
            AreaType::Growing => &mut self.growing,
        }
    }

    pub fn add(&mut self, area_type: AreaType, quantity: u32) {
        let slot = self.slot(area_type);
        *slot = slot.saturating_add(quantity);
    }

    pub fn remove(&mut self, area_type: AreaType, quantity: u32) {
        let slot = self.slot(area_type);
        *slot = slot.saturating_sub(quantity);
    }

    pub fn set(&mut self, area_type: AreaType, quantity: u32) {
        *self.slot(area_type) = quantity;
    }
}

/// Denormalized view of one crop batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRead {
    pub id: AggregateId,
    pub batch_id: String,
    pub status: CropStatus,
    pub crop_type: CropType,
    pub container: Container,
    pub inventory: InventoryView,
    pub farm_id: FarmId,
    pub initial_area: AreaView,
    pub moved_areas: Vec<MovedAreaView>,
    pub harvested_storage: Vec<HarvestedStorageView>,
    pub trash: Vec<TrashView>,
    /// Newest first.
    pub notes: Vec<CropNote>,
    pub photos: Vec<CropPhoto>,
    pub area_status: AreaStatus,
}

impl CropRead {
    pub fn created(data: &BatchCreatedData, area: &AreaRecord, material: &MaterialRecord) -> Self {
        let mut area_status = AreaStatus::default();
        area_status.add(area.area_type, data.quantity);

        Self {
            id: data.crop_id,
            batch_id: data.batch_id.clone(),
            status: CropStatus::Active,
            crop_type: data.crop_type,
            container: data.container,
            inventory: InventoryView::from(material),
            farm_id: data.farm_id,
            initial_area: AreaView {
                name: area.name.clone(),
                bucket: AreaBucket::new(data.initial_area_id, data.quantity, data.created_at),
            },
            moved_areas: Vec::new(),
            harvested_storage: Vec::new(),
            trash: Vec::new(),
            notes: Vec::new(),
            photos: Vec::new(),
            area_status,
        }
    }

    /// Every bucket, the initial area first.
    pub fn buckets(&self) -> impl Iterator<Item = &AreaBucket> {
        std::iter::once(&self.initial_area.bucket)
            .chain(self.moved_areas.iter().map(|m| &m.area.bucket))
    }

    pub fn bucket(&self, area_id: AreaId) -> Option<&AreaBucket> {
        self.buckets().find(|b| b.area_id == area_id)
    }

    fn bucket_mut(&mut self, area_id: AreaId) -> Option<&mut AreaBucket> {
        if self.initial_area.bucket.area_id == area_id {
            return Some(&mut self.initial_area.bucket);
        }
        self.moved_areas
            .iter_mut()
            .map(|m| &mut m.area.bucket)
            .find(|b| b.area_id == area_id)
    }

    /// Whether the batch currently occupies or ever occupied `area_id`.
    pub fn touches_area(&self, area_id: AreaId) -> bool {
        self.bucket(area_id).is_some()
    }

    pub fn produced_grams(&self) -> f64 {
        self.harvested_storage
            .iter()
            .map(|h| h.storage.produced_gram_quantity)
            .sum()
    }

    /// Swaps in a bucket snapshot. A moved area seen for the first time is
    /// added under `new_area_name`.
    fn replace_bucket(&mut self, area: &UpdatedArea, new_area_name: Option<&str>) -> Result<()> {
        match area {
            UpdatedArea::Initial(bucket) => {
                self.initial_area.bucket = bucket.clone();
            }
            UpdatedArea::Moved(MovedArea {
                source_area_id,
                bucket,
            }) => {
                if let Some(existing) = self
                    .moved_areas
                    .iter_mut()
                    .find(|m| m.area.bucket.area_id == bucket.area_id)
                {
                    existing.area.bucket = bucket.clone();
                } else {
                    let name = new_area_name
                        .ok_or_else(|| ProjectionError::missing("moved area", bucket.area_id))?;
                    self.moved_areas.push(MovedAreaView {
                        source_area_id: *source_area_id,
                        area: AreaView {
                            name: name.to_string(),
                            bucket: bucket.clone(),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    fn refresh_status(&mut self) {
        let status = CropStatus::from_current_quantities(self.buckets().map(|b| b.current_quantity));
        self.status = status;
    }

    pub fn apply_moved(&mut self, data: &MovedData, dst_area_name: &str) -> Result<()> {
        self.replace_bucket(&data.updated_src_area, None)?;
        self.replace_bucket(&data.updated_dst_area, Some(dst_area_name))?;
        self.area_status.add(data.dst_area_type, data.quantity);
        self.area_status.remove(data.src_area_type, data.quantity);
        self.refresh_status();
        Ok(())
    }

    pub fn apply_harvested(&mut self, data: &HarvestedData, source_area_name: &str) -> Result<()> {
        self.replace_bucket(&data.harvested_area, None)?;
        let storage = &data.harvested_storage;
        match self
            .harvested_storage
            .iter_mut()
            .find(|h| h.storage.source_area_id == storage.source_area_id)
        {
            Some(existing) => {
                existing.storage = storage.clone();
                existing.source_area_name = source_area_name.to_string();
            }
            None => self.harvested_storage.push(HarvestedStorageView {
                source_area_name: source_area_name.to_string(),
                storage: storage.clone(),
            }),
        }
        self.area_status
            .remove(AreaType::Growing, data.harvested_quantity);
        self.refresh_status();
        Ok(())
    }

    pub fn apply_dumped(&mut self, data: &DumpedData, source_area: &AreaRecord) -> Result<()> {
        self.replace_bucket(&data.dumped_area, None)?;
        let trash = &data.trash;
        match self
            .trash
            .iter_mut()
            .find(|t| t.trash.source_area_id == trash.source_area_id)
        {
            Some(existing) => {
                existing.trash = trash.clone();
                existing.source_area_name = source_area.name.clone();
            }
            None => self.trash.push(TrashView {
                source_area_name: source_area.name.clone(),
                trash: trash.clone(),
            }),
        }
        self.area_status.remove(source_area.area_type, data.quantity);
        self.area_status.dumped = self.area_status.dumped.saturating_add(data.quantity);
        self.refresh_status();
        Ok(())
    }

    pub fn apply_watered(&mut self, area_id: AreaId, watered_at: DateTime<Utc>) {
        if let Some(bucket) = self.bucket_mut(area_id) {
            bucket.last_watered = Some(watered_at);
        }
    }

    pub fn apply_container_changed(&mut self, container: Container, initial_area_type: AreaType) {
        self.container = container;
        self.initial_area.bucket.initial_quantity = container.quantity;
        self.initial_area.bucket.current_quantity = container.quantity;
        self.area_status.set(initial_area_type, container.quantity);
        self.refresh_status();
    }

    pub fn apply_inventory_changed(&mut self, batch_id: &str, material: &MaterialRecord) {
        self.batch_id = batch_id.to_string();
        self.inventory = InventoryView::from(material);
    }

    pub fn add_note(&mut self, note: CropNote) {
        self.notes.retain(|n| n.id != note.id);
        self.notes.push(note);
        self.notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    pub fn remove_note(&mut self, note_id: NoteId) {
        self.notes.retain(|n| n.id != note_id);
    }

    pub fn add_photo(&mut self, photo: CropPhoto) {
        if !self.photos.iter().any(|p| p.id == photo.id) {
            self.photos.push(photo);
        }
    }

    /// Records a completed task on the bucket of its area. Returns whether
    /// the batch has a bucket there.
    pub fn stamp_task(&mut self, stamp: &TaskStamp) -> bool {
        let Some(bucket) = self.bucket_mut(stamp.area_id) else {
            return false;
        };
        match stamp.kind {
            TaskStampKind::Fertilized => bucket.last_fertilized = Some(stamp.at),
            TaskStampKind::Pesticided => bucket.last_pesticided = Some(stamp.at),
        }
        true
    }

    /// Carries the task stamps of `stored` over to the matching buckets.
    ///
    /// Stamps are written only by [`CropReadStore::stamp_task`]; a crop event
    /// folded from an older copy of the row must not roll them back.
    pub fn keep_task_stamps(&mut self, stored: &CropRead) {
        for bucket in self.buckets_mut() {
            if let Some(kept) = stored.bucket(bucket.area_id) {
                bucket.last_fertilized = kept.last_fertilized;
                bucket.last_pesticided = kept.last_pesticided;
            }
        }
    }

    fn buckets_mut(&mut self) -> impl Iterator<Item = &mut AreaBucket> {
        std::iter::once(&mut self.initial_area.bucket)
            .chain(self.moved_areas.iter_mut().map(|m| &mut m.area.bucket))
    }
}

/// Bucket column stamped by a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStampKind {
    Fertilized,
    Pesticided,
}

impl TaskStampKind {
    /// Nutrient and pest-control tasks stamp a bucket; other categories don't.
    pub fn from_category(category: &str) -> Option<Self> {
        match category {
            NUTRIENT => Some(TaskStampKind::Fertilized),
            PESTCONTROL => Some(TaskStampKind::Pesticided),
            _ => None,
        }
    }
}

/// A completed task to record on one area of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskStamp {
    pub crop_id: AggregateId,
    pub area_id: AreaId,
    pub kind: TaskStampKind,
    pub at: DateTime<Utc>,
}

/// Totals over every batch of a farm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropsInformation {
    pub total_harvest_produced: f64,
    /// Distinct inventory names planted.
    pub total_plant_variety: u64,
}

/// Number of batches planted from one variety.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCount {
    pub variety_name: String,
    pub total_batch: u64,
}

/// Folds crop and task events into [`CropRead`] rows.
#[derive(Clone)]
pub struct CropReadProjection {
    store: Arc<dyn CropReadStore>,
    lookups: ReadModelLookups,
}

impl CropReadProjection {
    pub const NAME: &'static str = "crop_read";

    pub fn new(store: Arc<dyn CropReadStore>, lookups: ReadModelLookups) -> Self {
        Self { store, lookups }
    }

    pub fn store(&self) -> &Arc<dyn CropReadStore> {
        &self.store
    }

    async fn load(&self, crop_id: AggregateId) -> Result<CropRead> {
        self.store
            .find_by_id(crop_id)
            .await?
            .ok_or_else(|| ProjectionError::missing("crop read model", crop_id))
    }

    async fn fold_crop_event(&self, event: CropEvent) -> Result<CropRead> {
        if let CropEvent::BatchCreated(data) = &event {
            let area = self.lookups.area(data.initial_area_id).await?;
            let material = self.lookups.material(data.inventory_id).await?;
            return Ok(CropRead::created(data, &area, &material));
        }

        let mut crop = self.load(event.crop_id()).await?;
        match event {
            CropEvent::BatchCreated(_) => {}
            CropEvent::Moved(data) => {
                let dst = self.lookups.area(data.dst_area_id).await?;
                crop.apply_moved(&data, &dst.name)?;
            }
            CropEvent::Harvested(data) => {
                let source = self
                    .lookups
                    .area(data.harvested_storage.source_area_id)
                    .await?;
                crop.apply_harvested(&data, &source.name)?;
            }
            CropEvent::Dumped(data) => {
                let source = self.lookups.area(data.trash.source_area_id).await?;
                crop.apply_dumped(&data, &source)?;
            }
            CropEvent::Watered(data) => crop.apply_watered(data.area_id, data.watered_at),
            CropEvent::ContainerChanged(data) => {
                let initial = self.lookups.area(crop.initial_area.bucket.area_id).await?;
                crop.apply_container_changed(data.container, initial.area_type);
            }
            CropEvent::InventoryChanged(data) => {
                let material = self.lookups.material(data.inventory_id).await?;
                crop.apply_inventory_changed(&data.batch_id, &material);
            }
            CropEvent::NoteCreated(data) => crop.add_note(CropNote {
                id: data.note_id,
                content: data.content,
                created_at: data.created_at,
            }),
            CropEvent::NoteRemoved(data) => crop.remove_note(data.note_id),
            CropEvent::PhotoCreated(data) => crop.add_photo(CropPhoto {
                id: data.photo_id,
                filename: data.filename,
                mime_type: data.mime_type,
                size: data.size,
                width: data.width,
                height: data.height,
                description: data.description,
            }),
        }
        Ok(crop)
    }

    async fn task_stamp(&self, event: &EventEnvelope) -> Result<Option<TaskStamp>> {
        let Some(task) = completed_crop_task(&self.lookups, event).await? else {
            return Ok(None);
        };
        let (Some(area_id), Some(kind)) = (
            task.record.area_id,
            TaskStampKind::from_category(&task.record.category),
        ) else {
            return Ok(None);
        };
        Ok(Some(TaskStamp {
            crop_id: task.crop_id,
            area_id,
            kind,
            at: task.completed_at,
        }))
    }
}

#[async_trait]
impl Projection for CropReadProjection {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        self.store.checkpoint(aggregate_id).await
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let checkpoint = Checkpoint::of(event);
        let applied = if event.aggregate_type == Crop::aggregate_type() {
            let crop_event = CropEvent::from_envelope(event)?;
            let crop = self.fold_crop_event(crop_event).await?;
            self.store.save(&crop, checkpoint).await?
        } else if event.aggregate_type == TASK_AGGREGATE_TYPE {
            // Only the stamped column is written; the row itself belongs to
            // the crop stream's checkpoint.
            match self.task_stamp(event).await? {
                Some(stamp) => self.store.stamp_task(&stamp, checkpoint).await?,
                None => self.store.save_checkpoint(checkpoint).await?,
            }
        } else {
            self.store.save_checkpoint(checkpoint).await?
        };
        if !applied {
            tracing::debug!(projection = Self::NAME, %checkpoint, "stale write dropped");
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.store.reset().await
    }
}
