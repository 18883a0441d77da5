//! Crop aggregate implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, AreaId, FarmId, MaterialId, NoteId, PhotoId};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::lookup::{AreaRecord, AreaType, CropLookups, MaterialRecord};

use super::batch_id::generate_batch_id;
use super::events::{
    BatchCreatedData, ContainerChangedData, CropEvent, DumpedData, HarvestedData,
    InventoryChangedData, MovedData, NoteCreatedData, NoteRemovedData, PhotoCreatedData,
    WateredData,
};
use super::value_objects::{
    AreaBucket, Container, ContainerKind, CropNote, CropPhoto, CropStatus, CropType, HarvestType,
    HarvestedStorage, InventoryRef, MovedArea, ProducedUnit, Trash, UpdatedArea,
};
use super::CropError;

/// Crop batch aggregate root.
///
/// Plants live in buckets: the initial area the batch was seeded in, plus
/// one moved area per destination plants were moved to. Harvests and dumps
/// take plants out of a bucket and record them per source area.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crop {
    id: Option<AggregateId>,
    version: Version,
    batch_id: String,
    status: CropStatus,
    crop_type: CropType,
    container: Container,
    inventory_id: Option<MaterialId>,
    farm_id: Option<FarmId>,
    initial_area: Option<AreaBucket>,
    moved_areas: Vec<MovedArea>,
    harvested_storage: Vec<HarvestedStorage>,
    trash: Vec<Trash>,
    notes: BTreeMap<NoteId, CropNote>,
    photos: Vec<CropPhoto>,
}

impl Aggregate for Crop {
    type Event = CropEvent;
    type Error = CropError;

    fn aggregate_type() -> &'static str {
        "Crop"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CropEvent::BatchCreated(data) => self.apply_created(data),
            CropEvent::Moved(data) => {
                self.replace_bucket(data.updated_src_area);
                self.replace_bucket(data.updated_dst_area);
                self.refresh_status();
            }
            CropEvent::Harvested(data) => {
                let storage = data.harvested_storage;
                match self
                    .harvested_storage
                    .iter_mut()
                    .find(|s| s.source_area_id == storage.source_area_id)
                {
                    Some(existing) => *existing = storage,
                    None => self.harvested_storage.push(storage),
                }
                self.replace_bucket(data.harvested_area);
                self.refresh_status();
            }
            CropEvent::Dumped(data) => {
                let trash = data.trash;
                match self
                    .trash
                    .iter_mut()
                    .find(|t| t.source_area_id == trash.source_area_id)
                {
                    Some(existing) => *existing = trash,
                    None => self.trash.push(trash),
                }
                self.replace_bucket(data.dumped_area);
                self.refresh_status();
            }
            CropEvent::Watered(data) => {
                if let Some(bucket) = self.bucket_mut(data.area_id) {
                    bucket.last_watered = Some(data.watered_at);
                }
            }
            CropEvent::ContainerChanged(data) => {
                self.container = data.container;
                if let Some(initial) = self.initial_area.as_mut() {
                    initial.initial_quantity = data.container.quantity;
                    initial.current_quantity = data.container.quantity;
                }
                self.refresh_status();
            }
            CropEvent::InventoryChanged(data) => {
                self.inventory_id = Some(data.inventory_id);
                self.batch_id = data.batch_id;
            }
            CropEvent::NoteCreated(data) => {
                self.notes.insert(
                    data.note_id,
                    CropNote {
                        id: data.note_id,
                        content: data.content,
                        created_at: data.created_at,
                    },
                );
            }
            CropEvent::NoteRemoved(data) => {
                self.notes.remove(&data.note_id);
            }
            CropEvent::PhotoCreated(data) => self.photos.push(CropPhoto {
                id: data.photo_id,
                filename: data.filename,
                mime_type: data.mime_type,
                size: data.size,
                width: data.width,
                height: data.height,
                description: data.description,
            }),
        }
    }
}

// Query methods
impl Crop {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn status(&self) -> CropStatus {
        self.status
    }

    pub fn crop_type(&self) -> CropType {
        self.crop_type
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn inventory_id(&self) -> Option<MaterialId> {
        self.inventory_id
    }

    pub fn farm_id(&self) -> Option<FarmId> {
        self.farm_id
    }

    pub fn initial_area(&self) -> Option<&AreaBucket> {
        self.initial_area.as_ref()
    }

    pub fn moved_areas(&self) -> &[MovedArea] {
        &self.moved_areas
    }

    pub fn harvested_storage(&self) -> &[HarvestedStorage] {
        &self.harvested_storage
    }

    pub fn trash(&self) -> &[Trash] {
        &self.trash
    }

    pub fn notes(&self) -> impl Iterator<Item = &CropNote> {
        self.notes.values()
    }

    pub fn note(&self, id: NoteId) -> Option<&CropNote> {
        self.notes.get(&id)
    }

    pub fn photos(&self) -> &[CropPhoto] {
        &self.photos
    }

    /// Every area-bearing bucket, initial area first.
    pub fn buckets(&self) -> impl Iterator<Item = &AreaBucket> {
        self.initial_area
            .iter()
            .chain(self.moved_areas.iter().map(|m| &m.bucket))
    }

    /// The bucket tracking plants in `area_id`, if the batch ever occupied it.
    pub fn bucket(&self, area_id: AreaId) -> Option<&AreaBucket> {
        self.buckets().find(|b| b.area_id == area_id)
    }

    /// Plants still growing across all areas.
    pub fn current_quantity(&self) -> u32 {
        self.buckets().map(|b| b.current_quantity).sum()
    }

    /// Plants harvested out of their area in total.
    pub fn harvested_quantity(&self) -> u32 {
        self.harvested_storage.iter().map(|h| h.quantity).sum()
    }

    /// Plants dumped in total.
    pub fn dumped_quantity(&self) -> u32 {
        self.trash.iter().map(|t| t.quantity).sum()
    }

    /// Total produce harvested so far, in grams.
    pub fn produced_grams(&self) -> f64 {
        self.harvested_storage
            .iter()
            .map(|h| h.produced_gram_quantity)
            .sum()
    }
}

// Command methods
impl Crop {
    /// Seeds a new batch into an area.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        lookups: &CropLookups,
        crop_id: AggregateId,
        area_id: AreaId,
        crop_type: CropType,
        inventory: &InventoryRef,
        quantity: u32,
        container_kind: ContainerKind,
        at: DateTime<Utc>,
    ) -> Result<Vec<CropEvent>, CropError> {
        if self.id.is_some() {
            return Err(CropError::AlreadyCreated);
        }

        let area = find_area(lookups, area_id)
            .await?
            .ok_or(CropError::AreaNotFound)?;
        let material = find_material(lookups, inventory).await?;
        let container = Container::new(quantity, container_kind)?;

        let batch_id = generate_batch_id(&material.name, at);
        self.ensure_batch_id_available(lookups, &batch_id).await?;

        Ok(vec![CropEvent::BatchCreated(BatchCreatedData {
            crop_id,
            batch_id,
            status: CropStatus::Active,
            crop_type,
            container,
            inventory_id: material.id,
            farm_id: area.farm_id,
            initial_area_id: area.id,
            quantity,
            created_at: at,
        })])
    }

    /// Moves plants from one tracked area into another.
    pub async fn move_to_area(
        &self,
        lookups: &CropLookups,
        src_area_id: AreaId,
        dst_area_id: AreaId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;

        let src_area = find_area(lookups, src_area_id)
            .await?
            .ok_or(CropError::SourceAreaNotFound)?;
        let dst_area = find_area(lookups, dst_area_id)
            .await?
            .ok_or(CropError::DestinationAreaNotFound)?;

        if src_area.area_type == AreaType::Growing && dst_area.area_type == AreaType::Seeding {
            return Err(CropError::InvalidAreaRule);
        }
        if src_area.id == dst_area.id {
            return Err(CropError::SameArea);
        }
        if quantity == 0 {
            return Err(CropError::InvalidMoveQuantity);
        }

        let source = self
            .updated_area(src_area.id)
            .ok_or(CropError::AreaNotTracked)?;
        if quantity > source.bucket().current_quantity {
            return Err(CropError::InvalidMoveQuantity);
        }

        let updated_src_area = source.adjust(|b| {
            b.current_quantity -= quantity;
            b.updated_at = at;
        });

        let updated_dst_area = match self.updated_area(dst_area.id) {
            Some(dst @ UpdatedArea::Initial(_)) => dst.adjust(|b| {
                b.current_quantity += quantity;
                b.updated_at = at;
            }),
            // A repeat visit grows the bucket, so current never exceeds initial.
            Some(dst @ UpdatedArea::Moved(_)) => dst.adjust(|b| {
                b.initial_quantity += quantity;
                b.current_quantity += quantity;
                b.updated_at = at;
            }),
            None => UpdatedArea::Moved(MovedArea {
                source_area_id: src_area.id,
                bucket: AreaBucket::new(dst_area.id, quantity, at),
            }),
        };

        Ok(vec![CropEvent::Moved(MovedData {
            crop_id,
            batch_id: self.batch_id.clone(),
            container_type: self.container.kind.code().to_string(),
            quantity,
            src_area_id: src_area.id,
            src_area_type: src_area.area_type,
            dst_area_id: dst_area.id,
            dst_area_type: dst_area.area_type,
            moved_at: at,
            updated_src_area,
            updated_dst_area,
        })])
    }

    /// Harvests produce from a growing area.
    ///
    /// A full harvest takes every plant out of the area; a partial one only
    /// records the produce.
    #[allow(clippy::too_many_arguments)]
    pub async fn harvest(
        &self,
        lookups: &CropLookups,
        src_area_id: AreaId,
        harvest_type: HarvestType,
        produced_quantity: f64,
        produced_unit: ProducedUnit,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;

        let area = find_area(lookups, src_area_id)
            .await?
            .ok_or(CropError::SourceAreaNotFound)?;
        let source = self.updated_area(area.id).ok_or(CropError::AreaNotTracked)?;
        if area.area_type != AreaType::Growing {
            return Err(CropError::HarvestAreaNotGrowing);
        }
        if !produced_quantity.is_finite() || produced_quantity < 0.0 {
            return Err(CropError::InvalidProducedQuantity);
        }

        let harvested_quantity = match harvest_type {
            HarvestType::All => {
                let current = source.bucket().current_quantity;
                if current == 0 {
                    return Err(CropError::NothingToHarvest);
                }
                current
            }
            HarvestType::Partial => 0,
        };
        let harvested_area = source.adjust(|b| {
            b.current_quantity -= harvested_quantity;
            b.updated_at = at;
        });

        let produced_gram_quantity = produced_unit.to_grams(produced_quantity);
        let harvested_storage = match self
            .harvested_storage
            .iter()
            .find(|s| s.source_area_id == area.id)
        {
            Some(existing) => HarvestedStorage {
                quantity: existing.quantity + harvested_quantity,
                produced_gram_quantity: existing.produced_gram_quantity + produced_gram_quantity,
                updated_at: at,
                ..existing.clone()
            },
            None => HarvestedStorage {
                source_area_id: area.id,
                quantity: harvested_quantity,
                produced_gram_quantity,
                created_at: at,
                updated_at: at,
            },
        };

        Ok(vec![CropEvent::Harvested(HarvestedData {
            crop_id,
            status: self.status_with(&harvested_area),
            harvest_type,
            harvested_quantity,
            produced_gram_quantity,
            harvested_storage,
            harvested_area,
            harvested_at: at,
            notes,
        })])
    }

    /// Throws away plants from a tracked area.
    pub async fn dump(
        &self,
        lookups: &CropLookups,
        src_area_id: AreaId,
        quantity: u32,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;

        let area = find_area(lookups, src_area_id)
            .await?
            .ok_or(CropError::SourceAreaNotFound)?;
        let source = self.updated_area(area.id).ok_or(CropError::AreaNotTracked)?;
        if quantity == 0 {
            return Err(CropError::InvalidDumpQuantity);
        }
        if quantity > source.bucket().current_quantity {
            return Err(CropError::NotEnoughToDump);
        }

        let dumped_area = source.adjust(|b| {
            b.current_quantity -= quantity;
            b.updated_at = at;
        });
        let trash = match self.trash.iter().find(|t| t.source_area_id == area.id) {
            Some(existing) => Trash {
                quantity: existing.quantity + quantity,
                updated_at: at,
                ..existing.clone()
            },
            None => Trash {
                source_area_id: area.id,
                quantity,
                created_at: at,
                updated_at: at,
            },
        };

        Ok(vec![CropEvent::Dumped(DumpedData {
            crop_id,
            status: self.status_with(&dumped_area),
            quantity,
            trash,
            dumped_area,
            dumped_at: at,
            notes,
        })])
    }

    pub async fn water(
        &self,
        lookups: &CropLookups,
        area_id: AreaId,
        watered_at: DateTime<Utc>,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;

        let area = find_area(lookups, area_id)
            .await?
            .ok_or(CropError::AreaNotFound)?;
        if watered_at <= DateTime::UNIX_EPOCH {
            return Err(CropError::InvalidWateringDate);
        }

        Ok(vec![CropEvent::Watered(WateredData {
            crop_id,
            batch_id: self.batch_id.clone(),
            container_type: self.container.kind.code().to_string(),
            area_id: area.id,
            area_name: area.name,
            watered_at,
        })])
    }

    /// Replaces the container and resets the seeded quantity.
    ///
    /// Only allowed before any plant has left the initial area.
    pub fn change_container(
        &self,
        quantity: u32,
        kind: ContainerKind,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;
        let container = Container::new(quantity, kind)?;

        let untouched = self
            .initial_area
            .as_ref()
            .is_some_and(|b| b.current_quantity == b.initial_quantity);
        if !untouched {
            return Err(CropError::ContainerLocked);
        }

        Ok(vec![CropEvent::ContainerChanged(ContainerChangedData {
            crop_id,
            container,
        })])
    }

    /// Switches the planted material, regenerating the batch ID.
    pub async fn change_inventory(
        &self,
        lookups: &CropLookups,
        inventory: &InventoryRef,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;
        let material = find_material(lookups, inventory).await?;

        let seeded_at = self
            .initial_area
            .as_ref()
            .map(|b| b.created_at)
            .ok_or(CropError::CropNotFound)?;
        let batch_id = generate_batch_id(&material.name, seeded_at);
        if batch_id != self.batch_id {
            self.ensure_batch_id_available(lookups, &batch_id).await?;
        }

        Ok(vec![CropEvent::InventoryChanged(InventoryChangedData {
            crop_id,
            inventory_id: material.id,
            batch_id,
        })])
    }

    pub fn add_note(
        &self,
        note_id: NoteId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(CropError::NoteContentRequired);
        }

        Ok(vec![CropEvent::NoteCreated(NoteCreatedData {
            note_id,
            crop_id,
            content: content.to_string(),
            created_at: at,
        })])
    }

    pub fn remove_note(&self, note_id: NoteId) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;
        let note = self.notes.get(&note_id).ok_or(CropError::NoteNotFound)?;

        Ok(vec![CropEvent::NoteRemoved(NoteRemovedData {
            note_id,
            crop_id,
            content: note.content.clone(),
            created_at: note.created_at,
        })])
    }

    /// Attaches photo metadata; the file itself is stored elsewhere.
    pub fn add_photo(&self, photo_id: PhotoId, photo: CropPhoto) -> Result<Vec<CropEvent>, CropError> {
        let crop_id = self.ensure_created()?;

        for (field, value) in [
            ("filename", &photo.filename),
            ("mime type", &photo.mime_type),
            ("description", &photo.description),
        ] {
            if value.trim().is_empty() {
                return Err(CropError::PhotoFieldMissing(field));
            }
        }
        if photo.size == 0 {
            return Err(CropError::InvalidPhotoDimension("size"));
        }
        if photo.width == 0 {
            return Err(CropError::InvalidPhotoDimension("width"));
        }
        if photo.height == 0 {
            return Err(CropError::InvalidPhotoDimension("height"));
        }

        Ok(vec![CropEvent::PhotoCreated(PhotoCreatedData {
            photo_id,
            crop_id,
            filename: photo.filename,
            mime_type: photo.mime_type,
            size: photo.size,
            width: photo.width,
            height: photo.height,
            description: photo.description,
        })])
    }
}

// Event application and helpers
impl Crop {
    fn apply_created(&mut self, data: BatchCreatedData) {
        self.id = Some(data.crop_id);
        self.batch_id = data.batch_id;
        self.crop_type = data.crop_type;
        self.container = data.container;
        self.inventory_id = Some(data.inventory_id);
        self.farm_id = Some(data.farm_id);
        self.initial_area = Some(AreaBucket::new(
            data.initial_area_id,
            data.quantity,
            data.created_at,
        ));
        self.refresh_status();
    }

    fn ensure_created(&self) -> Result<AggregateId, CropError> {
        self.id.ok_or(CropError::CropNotFound)
    }

    async fn ensure_batch_id_available(
        &self,
        lookups: &CropLookups,
        batch_id: &str,
    ) -> Result<(), CropError> {
        let holder = lookups
            .batch_ids
            .find_crop_by_batch_id(batch_id)
            .await
            .map_err(CropError::lookup("batch id"))?;
        match holder {
            Some(holder) if Some(holder) != self.id => Err(CropError::BatchIdAlreadyExists),
            _ => Ok(()),
        }
    }

    /// Current snapshot of the bucket for `area_id`, tagged with its kind.
    fn updated_area(&self, area_id: AreaId) -> Option<UpdatedArea> {
        if let Some(initial) = self.initial_area.as_ref().filter(|b| b.area_id == area_id) {
            return Some(UpdatedArea::Initial(initial.clone()));
        }
        self.moved_areas
            .iter()
            .find(|m| m.bucket.area_id == area_id)
            .cloned()
            .map(UpdatedArea::Moved)
    }

    fn bucket_mut(&mut self, area_id: AreaId) -> Option<&mut AreaBucket> {
        if let Some(initial) = self.initial_area.as_mut()
            && initial.area_id == area_id
        {
            return Some(initial);
        }
        self.moved_areas
            .iter_mut()
            .map(|m| &mut m.bucket)
            .find(|b| b.area_id == area_id)
    }

    fn replace_bucket(&mut self, area: UpdatedArea) {
        match area {
            UpdatedArea::Initial(bucket) => self.initial_area = Some(bucket),
            UpdatedArea::Moved(moved) => match self
                .moved_areas
                .iter_mut()
                .find(|m| m.bucket.area_id == moved.bucket.area_id)
            {
                Some(existing) => *existing = moved,
                None => self.moved_areas.push(moved),
            },
        }
    }

    fn refresh_status(&mut self) {
        self.status = CropStatus::from_current_quantities(self.buckets().map(|b| b.current_quantity));
    }

    /// Status the batch would have once `updated` replaces its bucket.
    fn status_with(&self, updated: &UpdatedArea) -> CropStatus {
        let updated = updated.bucket();
        CropStatus::from_current_quantities(self.buckets().map(|b| {
            if b.area_id == updated.area_id {
                updated.current_quantity
            } else {
                b.current_quantity
            }
        }))
    }
}

impl UpdatedArea {
    fn adjust(mut self, f: impl FnOnce(&mut AreaBucket)) -> Self {
        match &mut self {
            UpdatedArea::Initial(bucket) => f(bucket),
            UpdatedArea::Moved(moved) => f(&mut moved.bucket),
        }
        self
    }
}

async fn find_area(lookups: &CropLookups, area_id: AreaId) -> Result<Option<AreaRecord>, CropError> {
    lookups
        .areas
        .find_area(area_id)
        .await
        .map_err(CropError::lookup("area"))
}

async fn find_material(
    lookups: &CropLookups,
    inventory: &InventoryRef,
) -> Result<MaterialRecord, CropError> {
    let found = match inventory {
        InventoryRef::Id(id) => lookups.materials.find_material(*id).await,
        InventoryRef::PlantTypeAndName { plant_type, name } => {
            lookups
                .materials
                .find_material_by_plant_type_and_name(plant_type, name)
                .await
        }
    };
    found
        .map_err(CropError::lookup("material"))?
        .ok_or(CropError::MaterialNotFound)
}
