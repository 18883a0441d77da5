//! Shared identifiers and paging types used across the crop growth crates.

pub mod page;
pub mod types;

pub use page::Page;
pub use types::{ActivityId, AggregateId, AreaId, FarmId, MaterialId, NoteId, PhotoId, TaskId};
