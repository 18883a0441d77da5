//! Crop batch aggregate.
//!
//! A crop batch starts in one area and spreads over others as plants are
//! moved, then leaves the farm through harvests and dumps. The aggregate
//! tracks how many plants sit in every area it ever occupied so that the
//! total is always accounted for.

mod aggregate;
mod batch_id;
mod commands;
mod events;
mod service;
mod value_objects;

use thiserror::Error;

use crate::lookup::LookupError;

pub use aggregate::Crop;
pub use batch_id::generate_batch_id;
pub use commands::{
    AddNote, AddPhoto, ChangeContainer, ChangeInventory, CreateCrop, DumpCrop, HarvestCrop,
    MoveCrop, RemoveNote, WaterCrop,
};
pub use events::{
    BatchCreatedData, ContainerChangedData, CropEvent, DumpedData, HarvestedData,
    InventoryChangedData, MovedData, NoteCreatedData, NoteRemovedData, PhotoCreatedData,
    WateredData,
};
pub use service::CropService;
pub use value_objects::{
    AreaBucket, Container, ContainerKind, CropNote, CropPhoto, CropStatus, CropType, HarvestType,
    HarvestedStorage, INITIAL_AREA_CODE, InventoryRef, MOVED_AREA_CODE, MovedArea, ProducedUnit,
    Trash, UpdatedArea,
};

/// Rejections raised by crop batch commands.
#[derive(Debug, Error)]
pub enum CropError {
    #[error("Crop not found")]
    CropNotFound,

    #[error("Crop batch has already been created")]
    AlreadyCreated,

    #[error("Area not found")]
    AreaNotFound,

    #[error("Invalid crop type")]
    InvalidCropType,

    #[error("Invalid crop status")]
    InvalidCropStatus,

    #[error("Crop inventory material not found")]
    MaterialNotFound,

    #[error("Crop batch ID already created")]
    BatchIdAlreadyExists,

    #[error("Crop source area not found")]
    SourceAreaNotFound,

    #[error("Crop destination not found")]
    DestinationAreaNotFound,

    #[error("Invalid move crop to area. Area source and destination cannot be same")]
    SameArea,

    #[error(
        "Invalid move crop to area. Crop can only be moved from Seeding to Growing, Seeding to Seeding or Growing to Growing"
    )]
    InvalidAreaRule,

    #[error("Invalid quantity. Make sure your quantity is not zero and enough to be moved")]
    InvalidMoveQuantity,

    #[error("Invalid existing area. Make sure your existing area is there")]
    AreaNotTracked,

    #[error("Crop can only be harvested from a growing area")]
    HarvestAreaNotGrowing,

    #[error("Not enough quantity")]
    NothingToHarvest,

    #[error("Invalid produced quantity")]
    InvalidProducedQuantity,

    #[error("Invalid harvest type")]
    InvalidHarvestType,

    #[error("Invalid produced unit")]
    InvalidProducedUnit,

    #[error("Invalid quantity")]
    InvalidDumpQuantity,

    #[error("Not enough current quantity to dump")]
    NotEnoughToDump,

    #[error("Invalid watering date")]
    InvalidWateringDate,

    #[error("Invalid crop container quantity")]
    InvalidContainerQuantity,

    #[error("Invalid crop container tray cell")]
    InvalidTrayCell,

    #[error("Invalid crop container type")]
    InvalidContainerType,

    #[error("Cannot change quantity and container because the crop batch has doing activity")]
    ContainerLocked,

    #[error("Invalid crop note content")]
    NoteContentRequired,

    #[error("Crop note not found")]
    NoteNotFound,

    #[error("Invalid photo {0}")]
    PhotoFieldMissing(&'static str),

    #[error("Invalid photo {0}")]
    InvalidPhotoDimension(&'static str),

    /// A collaborator failed to answer; distinct from the thing not existing.
    #[error("{collaborator} lookup failed: {source}")]
    Lookup {
        collaborator: &'static str,
        #[source]
        source: LookupError,
    },
}

impl CropError {
    /// Stable machine-readable code for the rejection.
    pub fn code(&self) -> &'static str {
        match self {
            CropError::CropNotFound => "CROP_NOT_FOUND",
            CropError::AlreadyCreated => "CROP_ALREADY_CREATED",
            CropError::AreaNotFound => "AREA_NOT_FOUND",
            CropError::InvalidCropType => "INVALID_CROP_TYPE",
            CropError::InvalidCropStatus => "INVALID_CROP_STATUS",
            CropError::MaterialNotFound => "MATERIAL_NOT_FOUND",
            CropError::BatchIdAlreadyExists => "BATCH_ID_ALREADY_CREATED",
            CropError::SourceAreaNotFound => "SOURCE_AREA_NOT_FOUND",
            CropError::DestinationAreaNotFound => "DESTINATION_AREA_NOT_FOUND",
            CropError::SameArea => "MOVE_SAME_AREA",
            CropError::InvalidAreaRule => "MOVE_INVALID_AREA_RULE",
            CropError::InvalidMoveQuantity => "MOVE_INVALID_QUANTITY",
            CropError::AreaNotTracked => "AREA_NOT_TRACKED",
            CropError::HarvestAreaNotGrowing => "HARVEST_AREA_NOT_GROWING",
            CropError::NothingToHarvest => "HARVEST_NOT_ENOUGH_QUANTITY",
            CropError::InvalidProducedQuantity => "HARVEST_INVALID_PRODUCED_QUANTITY",
            CropError::InvalidHarvestType => "HARVEST_INVALID_TYPE",
            CropError::InvalidProducedUnit => "HARVEST_INVALID_UNIT",
            CropError::InvalidDumpQuantity => "DUMP_INVALID_QUANTITY",
            CropError::NotEnoughToDump => "DUMP_NOT_ENOUGH_QUANTITY",
            CropError::InvalidWateringDate => "WATER_INVALID_DATE",
            CropError::InvalidContainerQuantity => "CONTAINER_INVALID_QUANTITY",
            CropError::InvalidTrayCell => "CONTAINER_INVALID_TRAY_CELL",
            CropError::InvalidContainerType => "CONTAINER_INVALID_TYPE",
            CropError::ContainerLocked => "CONTAINER_LOCKED",
            CropError::NoteContentRequired => "NOTE_INVALID_CONTENT",
            CropError::NoteNotFound => "NOTE_NOT_FOUND",
            CropError::PhotoFieldMissing(_) => "PHOTO_INVALID_FIELD",
            CropError::InvalidPhotoDimension(_) => "PHOTO_INVALID_DIMENSION",
            CropError::Lookup { .. } => "LOOKUP_FAILED",
        }
    }

    /// True for rejections caused by something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CropError::CropNotFound
                | CropError::AreaNotFound
                | CropError::MaterialNotFound
                | CropError::SourceAreaNotFound
                | CropError::DestinationAreaNotFound
                | CropError::NoteNotFound
        )
    }

    pub(crate) fn lookup(collaborator: &'static str) -> impl FnOnce(LookupError) -> CropError {
        move |source| CropError::Lookup {
            collaborator,
            source,
        }
    }
}
