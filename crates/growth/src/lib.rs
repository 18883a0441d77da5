//! Growth context: event-sourced crop batches.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits with replay from stored history
//! - Command trait and CommandHandler with conflict retry
//! - The Crop aggregate, its commands, events and service
//! - Lookup traits for the farm, area, material and task collaborators

pub mod aggregate;
pub mod command;
pub mod crop;
pub mod error;
pub mod lookup;
pub mod publisher;
pub mod task;

pub use aggregate::{Aggregate, DomainEvent, reconstruct, replay_onto};
pub use command::{Command, CommandHandler, CommandResult, DEFAULT_MAX_ATTEMPTS};
pub use crop::{
    AddNote, AddPhoto, ChangeContainer, ChangeInventory, CreateCrop, Crop, CropError, CropEvent,
    CropService, DumpCrop, HarvestCrop, MoveCrop, RemoveNote, WaterCrop,
};
pub use error::{DomainError, EventDecodeError};
pub use lookup::{
    AreaQuery, AreaRecord, AreaType, BatchIdQuery, CropLookups, FarmQuery, FarmRecord,
    InMemoryMasterData, LookupError, LookupResult, MaterialQuery, MaterialRecord, TaskQuery,
    TaskRecord,
};
pub use publisher::{EventPublisher, NoopPublisher};
pub use task::{CROP_DOMAIN, TASK_AGGREGATE_TYPE, TASK_COMPLETED, TaskCompletedData};
