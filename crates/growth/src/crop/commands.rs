//! Crop batch commands.
//!
//! Every command carries the instant it happened at. Constructors stamp the
//! current time; `at` overrides it for imports and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, AreaId, NoteId, PhotoId};

use crate::command::Command;
use crate::lookup::CropLookups;

use super::value_objects::{ContainerKind, CropPhoto, CropType, HarvestType, InventoryRef, ProducedUnit};
use super::{Crop, CropError, CropEvent};

/// Command to seed a new crop batch.
#[derive(Debug, Clone)]
pub struct CreateCrop {
    /// The crop ID to create. Generated by `new`.
    pub crop_id: AggregateId,
    pub area_id: AreaId,
    pub crop_type: CropType,
    pub inventory: InventoryRef,
    pub quantity: u32,
    pub container_kind: ContainerKind,
    pub at: DateTime<Utc>,
}

impl CreateCrop {
    pub fn new(
        area_id: AreaId,
        crop_type: CropType,
        inventory: impl Into<InventoryRef>,
        quantity: u32,
        container_kind: ContainerKind,
    ) -> Self {
        Self {
            crop_id: AggregateId::new(),
            area_id,
            crop_type,
            inventory: inventory.into(),
            quantity,
            container_kind,
            at: Utc::now(),
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

#[async_trait]
impl Command for CreateCrop {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "create_crop"
    }

    async fn handle(&self, crop: &Crop, lookups: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.create(
            lookups,
            self.crop_id,
            self.area_id,
            self.crop_type,
            &self.inventory,
            self.quantity,
            self.container_kind,
            self.at,
        )
        .await
    }
}

/// Command to move plants between areas.
#[derive(Debug, Clone)]
pub struct MoveCrop {
    pub crop_id: AggregateId,
    pub src_area_id: AreaId,
    pub dst_area_id: AreaId,
    pub quantity: u32,
    pub at: DateTime<Utc>,
}

impl MoveCrop {
    pub fn new(crop_id: AggregateId, src_area_id: AreaId, dst_area_id: AreaId, quantity: u32) -> Self {
        Self {
            crop_id,
            src_area_id,
            dst_area_id,
            quantity,
            at: Utc::now(),
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

#[async_trait]
impl Command for MoveCrop {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "move_crop"
    }

    async fn handle(&self, crop: &Crop, lookups: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.move_to_area(lookups, self.src_area_id, self.dst_area_id, self.quantity, self.at)
            .await
    }
}

/// Command to harvest produce from a growing area.
#[derive(Debug, Clone)]
pub struct HarvestCrop {
    pub crop_id: AggregateId,
    pub src_area_id: AreaId,
    pub harvest_type: HarvestType,
    pub produced_quantity: f64,
    pub produced_unit: ProducedUnit,
    pub notes: String,
    pub at: DateTime<Utc>,
}

impl HarvestCrop {
    pub fn new(
        crop_id: AggregateId,
        src_area_id: AreaId,
        harvest_type: HarvestType,
        produced_quantity: f64,
        produced_unit: ProducedUnit,
    ) -> Self {
        Self {
            crop_id,
            src_area_id,
            harvest_type,
            produced_quantity,
            produced_unit,
            notes: String::new(),
            at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

#[async_trait]
impl Command for HarvestCrop {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "harvest_crop"
    }

    async fn handle(&self, crop: &Crop, lookups: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.harvest(
            lookups,
            self.src_area_id,
            self.harvest_type,
            self.produced_quantity,
            self.produced_unit,
            self.notes.clone(),
            self.at,
        )
        .await
    }
}

/// Command to throw plants away.
#[derive(Debug, Clone)]
pub struct DumpCrop {
    pub crop_id: AggregateId,
    pub src_area_id: AreaId,
    pub quantity: u32,
    pub notes: String,
    pub at: DateTime<Utc>,
}

impl DumpCrop {
    pub fn new(crop_id: AggregateId, src_area_id: AreaId, quantity: u32) -> Self {
        Self {
            crop_id,
            src_area_id,
            quantity,
            notes: String::new(),
            at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

#[async_trait]
impl Command for DumpCrop {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "dump_crop"
    }

    async fn handle(&self, crop: &Crop, lookups: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.dump(lookups, self.src_area_id, self.quantity, self.notes.clone(), self.at)
            .await
    }
}

/// Command to record a watering. `at` is the watering date.
#[derive(Debug, Clone)]
pub struct WaterCrop {
    pub crop_id: AggregateId,
    pub area_id: AreaId,
    pub at: DateTime<Utc>,
}

impl WaterCrop {
    pub fn new(crop_id: AggregateId, area_id: AreaId) -> Self {
        Self {
            crop_id,
            area_id,
            at: Utc::now(),
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

#[async_trait]
impl Command for WaterCrop {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "water_crop"
    }

    async fn handle(&self, crop: &Crop, lookups: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.water(lookups, self.area_id, self.at).await
    }
}

#[derive(Debug, Clone)]
pub struct ChangeContainer {
    pub crop_id: AggregateId,
    pub quantity: u32,
    pub kind: ContainerKind,
}

impl ChangeContainer {
    pub fn new(crop_id: AggregateId, quantity: u32, kind: ContainerKind) -> Self {
        Self {
            crop_id,
            quantity,
            kind,
        }
    }
}

#[async_trait]
impl Command for ChangeContainer {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "change_container"
    }

    async fn handle(&self, crop: &Crop, _: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.change_container(self.quantity, self.kind)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeInventory {
    pub crop_id: AggregateId,
    pub inventory: InventoryRef,
}

impl ChangeInventory {
    pub fn new(crop_id: AggregateId, inventory: impl Into<InventoryRef>) -> Self {
        Self {
            crop_id,
            inventory: inventory.into(),
        }
    }
}

#[async_trait]
impl Command for ChangeInventory {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "change_inventory"
    }

    async fn handle(&self, crop: &Crop, lookups: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.change_inventory(lookups, &self.inventory).await
    }
}

#[derive(Debug, Clone)]
pub struct AddNote {
    pub crop_id: AggregateId,
    /// Generated by `new` so a retried command keeps the same note.
    pub note_id: NoteId,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl AddNote {
    pub fn new(crop_id: AggregateId, content: impl Into<String>) -> Self {
        Self {
            crop_id,
            note_id: NoteId::new(),
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

#[async_trait]
impl Command for AddNote {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "add_note"
    }

    async fn handle(&self, crop: &Crop, _: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.add_note(self.note_id, &self.content, self.at)
    }
}

#[derive(Debug, Clone)]
pub struct RemoveNote {
    pub crop_id: AggregateId,
    pub note_id: NoteId,
}

impl RemoveNote {
    pub fn new(crop_id: AggregateId, note_id: NoteId) -> Self {
        Self { crop_id, note_id }
    }
}

#[async_trait]
impl Command for RemoveNote {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "remove_note"
    }

    async fn handle(&self, crop: &Crop, _: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.remove_note(self.note_id)
    }
}

/// Command to attach photo metadata to a batch.
#[derive(Debug, Clone)]
pub struct AddPhoto {
    pub crop_id: AggregateId,
    pub photo: CropPhoto,
}

impl AddPhoto {
    /// Builds the command with a freshly generated photo ID.
    pub fn new(
        crop_id: AggregateId,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        width: u32,
        height: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            crop_id,
            photo: CropPhoto {
                id: PhotoId::new(),
                filename: filename.into(),
                mime_type: mime_type.into(),
                size,
                width,
                height,
                description: description.into(),
            },
        }
    }

    pub fn photo_id(&self) -> PhotoId {
        self.photo.id
    }
}

#[async_trait]
impl Command for AddPhoto {
    type Aggregate = Crop;
    type Context = CropLookups;

    fn aggregate_id(&self) -> AggregateId {
        self.crop_id
    }

    fn name(&self) -> &'static str {
        "add_photo"
    }

    async fn handle(&self, crop: &Crop, _: &CropLookups) -> Result<Vec<CropEvent>, CropError> {
        crop.add_photo(self.photo.id, self.photo.clone())
    }
}
