use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

use crate::config::ConfigError;

/// Failures that stop the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Could not install the log subscriber: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
