//! Value objects for the crop batch aggregate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{AreaId, MaterialId, NoteId, PhotoId};
use serde::{Deserialize, Serialize};

use super::CropError;

/// Whether the batch was started in a seeding or a growing area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CropType {
    #[default]
    Seeding,
    Growing,
}

impl CropType {
    pub fn code(&self) -> &'static str {
        match self {
            CropType::Seeding => "SEEDING",
            CropType::Growing => "GROWING",
        }
    }
}

impl FromStr for CropType {
    type Err = CropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEEDING" => Ok(CropType::Seeding),
            "GROWING" => Ok(CropType::Growing),
            _ => Err(CropError::InvalidCropType),
        }
    }
}

/// Lifecycle status of a batch.
///
/// There is no "harvested" status: harvests and dumps are partial and
/// recurring, so a batch is simply archived once no plants remain in any
/// area, and becomes active again if plants reappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CropStatus {
    #[default]
    Active,
    Archived,
}

impl CropStatus {
    pub fn code(&self) -> &'static str {
        match self {
            CropStatus::Active => "ACTIVE",
            CropStatus::Archived => "ARCHIVED",
        }
    }

    /// Archived exactly when every tracked bucket is empty.
    pub fn from_current_quantities(quantities: impl IntoIterator<Item = u32>) -> Self {
        if quantities.into_iter().all(|q| q == 0) {
            CropStatus::Archived
        } else {
            CropStatus::Active
        }
    }
}

impl fmt::Display for CropStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CropStatus {
    type Err = CropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CropStatus::Active),
            "ARCHIVED" => Ok(CropStatus::Archived),
            _ => Err(CropError::InvalidCropStatus),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerKind {
    Tray {
        cell: u32,
    },
    #[default]
    Pot,
}

impl ContainerKind {
    pub fn code(&self) -> &'static str {
        match self {
            ContainerKind::Tray { .. } => "TRAY",
            ContainerKind::Pot => "POT",
        }
    }

    pub fn cell(&self) -> Option<u32> {
        match self {
            ContainerKind::Tray { cell } => Some(*cell),
            ContainerKind::Pot => None,
        }
    }

    /// Builds a container kind from its code and, for trays, the cell count.
    pub fn from_code(code: &str, cell: Option<u32>) -> Result<Self, CropError> {
        match code {
            "TRAY" => Ok(ContainerKind::Tray {
                cell: cell.ok_or(CropError::InvalidTrayCell)?,
            }),
            "POT" => Ok(ContainerKind::Pot),
            _ => Err(CropError::InvalidContainerType),
        }
    }
}

/// What the plants of a batch are kept in, and how many of them there are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Container {
    pub quantity: u32,
    pub kind: ContainerKind,
}

impl Container {
    pub fn new(quantity: u32, kind: ContainerKind) -> Result<Self, CropError> {
        if quantity == 0 {
            return Err(CropError::InvalidContainerQuantity);
        }
        if let ContainerKind::Tray { cell: 0 } = kind {
            return Err(CropError::InvalidTrayCell);
        }
        Ok(Self { quantity, kind })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarvestType {
    /// Takes every plant out of the area.
    All,
    /// Picks produce while the plants stay in place.
    Partial,
}

impl HarvestType {
    pub fn code(&self) -> &'static str {
        match self {
            HarvestType::All => "ALL",
            HarvestType::Partial => "PARTIAL",
        }
    }
}

impl FromStr for HarvestType {
    type Err = CropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(HarvestType::All),
            "PARTIAL" => Ok(HarvestType::Partial),
            _ => Err(CropError::InvalidHarvestType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProducedUnit {
    Kg,
    Gr,
}

impl ProducedUnit {
    pub fn to_grams(&self, quantity: f64) -> f64 {
        match self {
            ProducedUnit::Kg => quantity * 1000.0,
            ProducedUnit::Gr => quantity,
        }
    }
}

impl FromStr for ProducedUnit {
    type Err = CropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Kg" | "KG" | "kg" => Ok(ProducedUnit::Kg),
            "Gr" | "GR" | "gr" => Ok(ProducedUnit::Gr),
            _ => Err(CropError::InvalidProducedUnit),
        }
    }
}

/// Plants of the batch that sit in one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaBucket {
    pub area_id: AreaId,
    pub initial_quantity: u32,
    pub current_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_watered: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_fertilized: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_pesticided: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_pruned: Option<DateTime<Utc>>,
}

impl AreaBucket {
    pub fn new(area_id: AreaId, quantity: u32, at: DateTime<Utc>) -> Self {
        Self {
            area_id,
            initial_quantity: quantity,
            current_quantity: quantity,
            created_at: at,
            updated_at: at,
            last_watered: None,
            last_fertilized: None,
            last_pesticided: None,
            last_pruned: None,
        }
    }

    /// Plants that left this area by moving, harvesting or dumping.
    pub fn removed_quantity(&self) -> u32 {
        self.initial_quantity - self.current_quantity
    }
}

/// A bucket created by moving plants out of another area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovedArea {
    pub source_area_id: AreaId,
    #[serde(flatten)]
    pub bucket: AreaBucket,
}

pub const INITIAL_AREA_CODE: &str = "INITIAL_AREA";
pub const MOVED_AREA_CODE: &str = "MOVED_AREA";

/// Snapshot of a bucket after a quantity change, tagged with which kind of
/// bucket it is.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatedArea {
    Initial(AreaBucket),
    Moved(MovedArea),
}

impl UpdatedArea {
    pub fn code(&self) -> &'static str {
        match self {
            UpdatedArea::Initial(_) => INITIAL_AREA_CODE,
            UpdatedArea::Moved(_) => MOVED_AREA_CODE,
        }
    }

    pub fn bucket(&self) -> &AreaBucket {
        match self {
            UpdatedArea::Initial(bucket) => bucket,
            UpdatedArea::Moved(moved) => &moved.bucket,
        }
    }

    pub fn area_id(&self) -> AreaId {
        self.bucket().area_id
    }
}

/// Harvest accumulated from one source area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedStorage {
    pub source_area_id: AreaId,
    pub quantity: u32,
    pub produced_gram_quantity: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plants dumped from one source area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trash {
    pub source_area_id: AreaId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropNote {
    pub id: NoteId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPhoto {
    pub id: PhotoId,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub description: String,
}

/// How a command names the material it plants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRef {
    Id(MaterialId),
    PlantTypeAndName { plant_type: String, name: String },
}

impl From<MaterialId> for InventoryRef {
    fn from(id: MaterialId) -> Self {
        InventoryRef::Id(id)
    }
}
