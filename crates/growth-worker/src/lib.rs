//! Process shell for the growth context.
//!
//! Builds the storage backend once at start-up, hands every component its
//! handles, and keeps the read models repaired in the background.

pub mod backend;
pub mod config;
pub mod error;
pub mod repair;

pub use backend::{Backend, MasterData};
pub use config::{Config, ConfigError, LogFormat, StorageBackend};
pub use error::{Result, WorkerError};
pub use repair::run_repair_loop;
