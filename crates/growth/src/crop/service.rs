//! Crop service providing a simplified API for crop batch operations.

use std::sync::Arc;

use common::AggregateId;
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::lookup::CropLookups;
use crate::publisher::{EventPublisher, NoopPublisher};

use super::{
    AddNote, AddPhoto, ChangeContainer, ChangeInventory, CreateCrop, Crop, DumpCrop, HarvestCrop,
    MoveCrop, RemoveNote, WaterCrop,
};

/// Service for managing crop batches.
///
/// Wraps the command handler with the lookups commands are decided against
/// and the publisher committed events are announced to.
pub struct CropService<S: EventStore> {
    handler: CommandHandler<S, Crop>,
    lookups: CropLookups,
    publisher: Arc<dyn EventPublisher>,
}

impl<S: EventStore> CropService<S> {
    pub fn new(store: S, lookups: CropLookups) -> Self {
        Self {
            handler: CommandHandler::new(store),
            lookups,
            publisher: Arc::new(NoopPublisher),
        }
    }

    /// Announces committed events to `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, Crop> {
        &self.handler
    }

    pub fn lookups(&self) -> &CropLookups {
        &self.lookups
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_crop(&self, cmd: CreateCrop) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn move_crop(&self, cmd: MoveCrop) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn harvest_crop(&self, cmd: HarvestCrop) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn dump_crop(&self, cmd: DumpCrop) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn water_crop(&self, cmd: WaterCrop) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_container(
        &self,
        cmd: ChangeContainer,
    ) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_inventory(
        &self,
        cmd: ChangeInventory,
    ) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_note(&self, cmd: AddNote) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_note(&self, cmd: RemoveNote) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_photo(&self, cmd: AddPhoto) -> Result<CommandResult<Crop>, DomainError> {
        self.execute(&cmd).await
    }

    /// Loads a crop batch, failing if it was never created.
    pub async fn get_crop(&self, crop_id: AggregateId) -> Result<Crop, DomainError> {
        self.handler
            .load_existing(crop_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: Crop::aggregate_type(),
                aggregate_id: crop_id,
            })
    }

    async fn execute<C>(&self, cmd: &C) -> Result<CommandResult<Crop>, DomainError>
    where
        C: Command<Aggregate = Crop, Context = CropLookups>,
    {
        metrics::counter!("crop_commands_total", "command" => cmd.name()).increment(1);

        let result = self.handler.dispatch(cmd, &self.lookups).await;
        match &result {
            Ok(result) if !result.envelopes.is_empty() => {
                tracing::debug!(
                    crop_id = %cmd.aggregate_id(),
                    version = %result.new_version,
                    events = result.envelopes.len(),
                    "crop command committed"
                );
                self.publisher.publish(&result.envelopes).await;
            }
            Ok(_) => {}
            Err(e) => {
                metrics::counter!("crop_command_failures_total", "command" => cmd.name())
                    .increment(1);
                tracing::debug!(command = cmd.name(), error = %e, "crop command rejected");
            }
        }
        result
    }
}
