//! Storage backend wiring.

use std::sync::Arc;

use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use growth::{BatchIdQuery, CropLookups, CropService, InMemoryMasterData};
use projections::{
    BackgroundPublisher, CatchUpReport, CropActivityProjection, CropActivityStore, CropQueries,
    CropReadProjection, CropReadStore, InMemoryCropActivityStore, InMemoryCropReadStore,
    PostgresCropActivityStore, PostgresCropReadStore, ProjectionProcessor, ReadModelLookups,
};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;

use crate::config::{Config, ConfigError};
use crate::error::Result;

/// Farm, area, material and task records owned by neighbouring contexts.
pub type MasterData = Arc<InMemoryMasterData>;

/// Every long-lived handle of the process, built once at start-up.
///
/// Must be built inside a Tokio runtime: projection delivery runs on a
/// spawned task.
pub struct Backend<S: EventStore> {
    pub events: S,
    pub service: Arc<CropService<S>>,
    pub processor: Arc<ProjectionProcessor<S>>,
    pub queries: CropQueries,
    delivery: JoinHandle<()>,
}

impl Backend<InMemoryEventStore> {
    pub fn in_memory(config: &Config, master: MasterData) -> Self {
        let crops = InMemoryCropReadStore::new();
        Self::assemble(
            InMemoryEventStore::new(),
            config,
            master,
            Arc::new(crops.clone()),
            Arc::new(crops),
            Arc::new(InMemoryCropActivityStore::new()),
        )
    }
}

impl Backend<PostgresEventStore> {
    /// Connects, applies migrations and wires the PostgreSQL stores.
    pub async fn postgres(config: &Config, master: MasterData) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(url)
            .await?;

        let events = PostgresEventStore::new(pool.clone());
        events.run_migrations().await?;
        tracing::info!("database migrations applied");

        let crops = PostgresCropReadStore::new(pool.clone());
        Ok(Self::assemble(
            events,
            config,
            master,
            Arc::new(crops.clone()),
            Arc::new(crops),
            Arc::new(PostgresCropActivityStore::new(pool)),
        ))
    }
}

impl<S: EventStore + Clone + 'static> Backend<S> {
    fn assemble(
        events: S,
        config: &Config,
        master: MasterData,
        crops: Arc<dyn CropReadStore>,
        batch_ids: Arc<dyn BatchIdQuery>,
        activities: Arc<dyn CropActivityStore>,
    ) -> Self {
        let lookups = ReadModelLookups::new(master.clone(), master.clone(), master.clone());
        let processor = Arc::new(
            ProjectionProcessor::new(events.clone())
                .with_projection(Arc::new(CropReadProjection::new(
                    crops.clone(),
                    lookups.clone(),
                )))
                .with_projection(Arc::new(CropActivityProjection::new(
                    activities.clone(),
                    lookups,
                ))),
        );

        let (publisher, delivery) = BackgroundPublisher::spawn(processor.clone());
        let service = CropService::new(
            events.clone(),
            CropLookups::new(master.clone(), master.clone(), batch_ids),
        )
        .with_publisher(Arc::new(publisher))
        .with_max_attempts(config.command_max_attempts);

        Self {
            events,
            service: Arc::new(service),
            processor,
            queries: CropQueries::new(crops, activities, master),
            delivery,
        }
    }

    /// Applies everything the projections have not seen yet.
    pub async fn repair(&self) -> Result<CatchUpReport> {
        Ok(self.processor.run_catch_up().await?)
    }

    /// Drops the command side and waits for queued deliveries to finish.
    ///
    /// Returns once every other clone of `service` is gone too.
    pub async fn shutdown(self) {
        let Self {
            service, delivery, ..
        } = self;
        drop(service);
        if let Err(error) = delivery.await {
            tracing::warn!(%error, "projection delivery task ended abnormally");
        }
    }
}
