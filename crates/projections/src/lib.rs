//! Read models and projections for the crop query side.
//!
//! This crate provides:
//! - [`Projection`] trait with per-aggregate [`Checkpoint`]s
//! - [`ProjectionProcessor`] for live delivery, gap re-drive, catch-up and rebuild
//! - [`BackgroundPublisher`] to take projection work off the command path
//! - The crop read model and the crop activity timeline, with in-memory and
//!   PostgreSQL stores
//! - [`CropQueries`], the farm-checked query facade

pub mod error;
pub mod lookups;
pub mod processor;
pub mod projection;
pub mod publisher;
pub mod queries;
pub mod store;
pub mod views;

pub use error::{ProjectionError, Result};
pub use lookups::ReadModelLookups;
pub use processor::{CatchUpReport, ProjectionProcessor};
pub use projection::{Checkpoint, Projection};
pub use publisher::BackgroundPublisher;
pub use queries::{CropPage, CropQueries};
pub use store::{
    CropActivityStore, CropReadStore, InMemoryCropActivityStore, InMemoryCropReadStore,
    PostgresCropActivityStore, PostgresCropReadStore,
};
pub use views::{
    ActivityKind, ActivityType, CropActivity, CropActivityProjection, CropRead,
    CropReadProjection, TaskStamp, TaskStampKind,
};
