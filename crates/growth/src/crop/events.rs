//! Crop batch domain events and their persisted form.
//!
//! Each event is stored as `{"Name": <kind>, "Data": <object>}`. Decoding
//! looks at the kind first and only then parses the matching payload. Events
//! that carry a bucket snapshot store it next to a `*_code` field naming the
//! bucket shape (`INITIAL_AREA` or `MOVED_AREA`); the code is read before the
//! snapshot is parsed.

use chrono::{DateTime, Utc};
use common::{AggregateId, AreaId, FarmId, MaterialId, NoteId, PhotoId};
use serde::{Deserialize, Serialize};
use serde::de::Error as _;

use crate::aggregate::DomainEvent;
use crate::error::EventDecodeError;
use crate::lookup::AreaType;

use super::value_objects::{
    AreaBucket, Container, CropStatus, CropType, HarvestType, HarvestedStorage, INITIAL_AREA_CODE,
    MOVED_AREA_CODE, MovedArea, Trash, UpdatedArea,
};

#[derive(Debug, Clone, PartialEq)]
pub enum CropEvent {
    BatchCreated(BatchCreatedData),
    Moved(MovedData),
    Harvested(HarvestedData),
    Dumped(DumpedData),
    Watered(WateredData),
    ContainerChanged(ContainerChangedData),
    InventoryChanged(InventoryChangedData),
    NoteCreated(NoteCreatedData),
    NoteRemoved(NoteRemovedData),
    PhotoCreated(PhotoCreatedData),
}

impl CropEvent {
    pub const BATCH_CREATED: &'static str = "CropBatchCreated";
    pub const MOVED: &'static str = "CropBatchMoved";
    pub const HARVESTED: &'static str = "CropBatchHarvested";
    pub const DUMPED: &'static str = "CropBatchDumped";
    pub const WATERED: &'static str = "CropBatchWatered";
    pub const CONTAINER_CHANGED: &'static str = "CropBatchContainerChanged";
    pub const INVENTORY_CHANGED: &'static str = "CropBatchInventoryChanged";
    pub const NOTE_CREATED: &'static str = "CropBatchNoteCreated";
    pub const NOTE_REMOVED: &'static str = "CropBatchNoteRemoved";
    pub const PHOTO_CREATED: &'static str = "CropBatchPhotoCreated";

    pub fn crop_id(&self) -> AggregateId {
        match self {
            CropEvent::BatchCreated(d) => d.crop_id,
            CropEvent::Moved(d) => d.crop_id,
            CropEvent::Harvested(d) => d.crop_id,
            CropEvent::Dumped(d) => d.crop_id,
            CropEvent::Watered(d) => d.crop_id,
            CropEvent::ContainerChanged(d) => d.crop_id,
            CropEvent::InventoryChanged(d) => d.crop_id,
            CropEvent::NoteCreated(d) => d.crop_id,
            CropEvent::NoteRemoved(d) => d.crop_id,
            CropEvent::PhotoCreated(d) => d.crop_id,
        }
    }
}

impl DomainEvent for CropEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CropEvent::BatchCreated(_) => Self::BATCH_CREATED,
            CropEvent::Moved(_) => Self::MOVED,
            CropEvent::Harvested(_) => Self::HARVESTED,
            CropEvent::Dumped(_) => Self::DUMPED,
            CropEvent::Watered(_) => Self::WATERED,
            CropEvent::ContainerChanged(_) => Self::CONTAINER_CHANGED,
            CropEvent::InventoryChanged(_) => Self::INVENTORY_CHANGED,
            CropEvent::NoteCreated(_) => Self::NOTE_CREATED,
            CropEvent::NoteRemoved(_) => Self::NOTE_REMOVED,
            CropEvent::PhotoCreated(_) => Self::PHOTO_CREATED,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            CropEvent::BatchCreated(d) => serde_json::to_value(d),
            CropEvent::Moved(d) => serde_json::to_value(d.to_wire()?),
            CropEvent::Harvested(d) => serde_json::to_value(d.to_wire()?),
            CropEvent::Dumped(d) => serde_json::to_value(d.to_wire()?),
            CropEvent::Watered(d) => serde_json::to_value(d),
            CropEvent::ContainerChanged(d) => serde_json::to_value(d),
            CropEvent::InventoryChanged(d) => serde_json::to_value(d),
            CropEvent::NoteCreated(d) => serde_json::to_value(d),
            CropEvent::NoteRemoved(d) => serde_json::to_value(d),
            CropEvent::PhotoCreated(d) => serde_json::to_value(d),
        }
    }

    fn decode(event_type: &str, data: serde_json::Value) -> Result<Self, EventDecodeError> {
        let payload = |e: serde_json::Error| EventDecodeError::payload(event_type, e);

        let event = match event_type {
            Self::BATCH_CREATED => CropEvent::BatchCreated(serde_json::from_value(data).map_err(payload)?),
            Self::MOVED => CropEvent::Moved(
                serde_json::from_value::<MovedWire>(data)
                    .and_then(MovedData::from_wire)
                    .map_err(payload)?,
            ),
            Self::HARVESTED => CropEvent::Harvested(
                serde_json::from_value::<HarvestedWire>(data)
                    .and_then(HarvestedData::from_wire)
                    .map_err(payload)?,
            ),
            Self::DUMPED => CropEvent::Dumped(
                serde_json::from_value::<DumpedWire>(data)
                    .and_then(DumpedData::from_wire)
                    .map_err(payload)?,
            ),
            Self::WATERED => CropEvent::Watered(serde_json::from_value(data).map_err(payload)?),
            Self::CONTAINER_CHANGED => {
                CropEvent::ContainerChanged(serde_json::from_value(data).map_err(payload)?)
            }
            Self::INVENTORY_CHANGED => {
                CropEvent::InventoryChanged(serde_json::from_value(data).map_err(payload)?)
            }
            Self::NOTE_CREATED => CropEvent::NoteCreated(serde_json::from_value(data).map_err(payload)?),
            Self::NOTE_REMOVED => CropEvent::NoteRemoved(serde_json::from_value(data).map_err(payload)?),
            Self::PHOTO_CREATED => {
                CropEvent::PhotoCreated(serde_json::from_value(data).map_err(payload)?)
            }
            other => return Err(EventDecodeError::UnknownEvent(other.to_string())),
        };

        Ok(event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCreatedData {
    pub crop_id: AggregateId,
    pub batch_id: String,
    pub status: CropStatus,
    pub crop_type: CropType,
    pub container: Container,
    pub inventory_id: MaterialId,
    pub farm_id: FarmId,
    pub initial_area_id: AreaId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovedData {
    pub crop_id: AggregateId,
    pub batch_id: String,
    pub container_type: String,
    pub quantity: u32,
    pub src_area_id: AreaId,
    pub src_area_type: AreaType,
    pub dst_area_id: AreaId,
    pub dst_area_type: AreaType,
    pub moved_at: DateTime<Utc>,
    pub updated_src_area: UpdatedArea,
    pub updated_dst_area: UpdatedArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestedData {
    pub crop_id: AggregateId,
    pub status: CropStatus,
    pub harvest_type: HarvestType,
    /// Plants taken out of the area; zero for a partial harvest.
    pub harvested_quantity: u32,
    /// Produce of this harvest alone, in grams.
    pub produced_gram_quantity: f64,
    pub harvested_storage: HarvestedStorage,
    pub harvested_area: UpdatedArea,
    pub harvested_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DumpedData {
    pub crop_id: AggregateId,
    pub status: CropStatus,
    pub quantity: u32,
    pub trash: Trash,
    pub dumped_area: UpdatedArea,
    pub dumped_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateredData {
    pub crop_id: AggregateId,
    pub batch_id: String,
    pub container_type: String,
    pub area_id: AreaId,
    pub area_name: String,
    pub watered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerChangedData {
    pub crop_id: AggregateId,
    pub container: Container,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryChangedData {
    pub crop_id: AggregateId,
    pub inventory_id: MaterialId,
    pub batch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteCreatedData {
    pub note_id: NoteId,
    pub crop_id: AggregateId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRemovedData {
    pub note_id: NoteId,
    pub crop_id: AggregateId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoCreatedData {
    pub photo_id: PhotoId,
    pub crop_id: AggregateId,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub description: String,
}

fn encode_area(area: &UpdatedArea) -> Result<(String, serde_json::Value), serde_json::Error> {
    let value = match area {
        UpdatedArea::Initial(bucket) => serde_json::to_value(bucket)?,
        UpdatedArea::Moved(moved) => serde_json::to_value(moved)?,
    };
    Ok((area.code().to_string(), value))
}

fn decode_area(code: &str, value: serde_json::Value) -> Result<UpdatedArea, serde_json::Error> {
    match code {
        INITIAL_AREA_CODE => serde_json::from_value::<AreaBucket>(value).map(UpdatedArea::Initial),
        MOVED_AREA_CODE => serde_json::from_value::<MovedArea>(value).map(UpdatedArea::Moved),
        other => Err(serde_json::Error::custom(format!(
            "unknown updated area code `{other}`"
        ))),
    }
}

#[derive(Serialize, Deserialize)]
struct MovedWire {
    crop_id: AggregateId,
    batch_id: String,
    container_type: String,
    quantity: u32,
    src_area_id: AreaId,
    src_area_type: AreaType,
    dst_area_id: AreaId,
    dst_area_type: AreaType,
    moved_at: DateTime<Utc>,
    updated_src_area_code: String,
    updated_src_area: serde_json::Value,
    updated_dst_area_code: String,
    updated_dst_area: serde_json::Value,
}

impl MovedData {
    fn to_wire(&self) -> Result<MovedWire, serde_json::Error> {
        let (updated_src_area_code, updated_src_area) = encode_area(&self.updated_src_area)?;
        let (updated_dst_area_code, updated_dst_area) = encode_area(&self.updated_dst_area)?;
        Ok(MovedWire {
            crop_id: self.crop_id,
            batch_id: self.batch_id.clone(),
            container_type: self.container_type.clone(),
            quantity: self.quantity,
            src_area_id: self.src_area_id,
            src_area_type: self.src_area_type,
            dst_area_id: self.dst_area_id,
            dst_area_type: self.dst_area_type,
            moved_at: self.moved_at,
            updated_src_area_code,
            updated_src_area,
            updated_dst_area_code,
            updated_dst_area,
        })
    }

    fn from_wire(wire: MovedWire) -> Result<Self, serde_json::Error> {
        Ok(Self {
            updated_src_area: decode_area(&wire.updated_src_area_code, wire.updated_src_area)?,
            updated_dst_area: decode_area(&wire.updated_dst_area_code, wire.updated_dst_area)?,
            crop_id: wire.crop_id,
            batch_id: wire.batch_id,
            container_type: wire.container_type,
            quantity: wire.quantity,
            src_area_id: wire.src_area_id,
            src_area_type: wire.src_area_type,
            dst_area_id: wire.dst_area_id,
            dst_area_type: wire.dst_area_type,
            moved_at: wire.moved_at,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct HarvestedWire {
    crop_id: AggregateId,
    status: CropStatus,
    harvest_type: HarvestType,
    harvested_quantity: u32,
    produced_gram_quantity: f64,
    harvested_storage: HarvestedStorage,
    harvested_area_code: String,
    harvested_area: serde_json::Value,
    harvested_at: DateTime<Utc>,
    #[serde(default)]
    notes: String,
}

impl HarvestedData {
    fn to_wire(&self) -> Result<HarvestedWire, serde_json::Error> {
        let (harvested_area_code, harvested_area) = encode_area(&self.harvested_area)?;
        Ok(HarvestedWire {
            crop_id: self.crop_id,
            status: self.status,
            harvest_type: self.harvest_type,
            harvested_quantity: self.harvested_quantity,
            produced_gram_quantity: self.produced_gram_quantity,
            harvested_storage: self.harvested_storage.clone(),
            harvested_area_code,
            harvested_area,
            harvested_at: self.harvested_at,
            notes: self.notes.clone(),
        })
    }

    fn from_wire(wire: HarvestedWire) -> Result<Self, serde_json::Error> {
        Ok(Self {
            harvested_area: decode_area(&wire.harvested_area_code, wire.harvested_area)?,
            crop_id: wire.crop_id,
            status: wire.status,
            harvest_type: wire.harvest_type,
            harvested_quantity: wire.harvested_quantity,
            produced_gram_quantity: wire.produced_gram_quantity,
            harvested_storage: wire.harvested_storage,
            harvested_at: wire.harvested_at,
            notes: wire.notes,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct DumpedWire {
    crop_id: AggregateId,
    status: CropStatus,
    quantity: u32,
    trash: Trash,
    dumped_area_code: String,
    dumped_area: serde_json::Value,
    dumped_at: DateTime<Utc>,
    #[serde(default)]
    notes: String,
}

impl DumpedData {
    fn to_wire(&self) -> Result<DumpedWire, serde_json::Error> {
        let (dumped_area_code, dumped_area) = encode_area(&self.dumped_area)?;
        Ok(DumpedWire {
            crop_id: self.crop_id,
            status: self.status,
            quantity: self.quantity,
            trash: self.trash.clone(),
            dumped_area_code,
            dumped_area,
            dumped_at: self.dumped_at,
            notes: self.notes.clone(),
        })
    }

    fn from_wire(wire: DumpedWire) -> Result<Self, serde_json::Error> {
        Ok(Self {
            dumped_area: decode_area(&wire.dumped_area_code, wire.dumped_area)?,
            crop_id: wire.crop_id,
            status: wire.status,
            quantity: wire.quantity,
            trash: wire.trash,
            dumped_at: wire.dumped_at,
            notes: wire.notes,
        })
    }
}
