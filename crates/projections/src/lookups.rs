//! Name resolution for read models.

use std::sync::Arc;

use common::{AreaId, MaterialId, TaskId};
use growth::{AreaQuery, AreaRecord, MaterialQuery, MaterialRecord, TaskQuery, TaskRecord};

use crate::{ProjectionError, Result};

/// Collaborators the projections resolve area, material and task details
/// through. A record that does not exist is a [`ProjectionError::MissingReference`]
/// so the event is retried by the next repair pass.
#[derive(Clone)]
pub struct ReadModelLookups {
    pub areas: Arc<dyn AreaQuery>,
    pub materials: Arc<dyn MaterialQuery>,
    pub tasks: Arc<dyn TaskQuery>,
}

impl ReadModelLookups {
    pub fn new(
        areas: Arc<dyn AreaQuery>,
        materials: Arc<dyn MaterialQuery>,
        tasks: Arc<dyn TaskQuery>,
    ) -> Self {
        Self {
            areas,
            materials,
            tasks,
        }
    }

    pub async fn area(&self, id: AreaId) -> Result<AreaRecord> {
        self.areas
            .find_area(id)
            .await
            .map_err(ProjectionError::lookup("area"))?
            .ok_or_else(|| ProjectionError::missing("area", id))
    }

    pub async fn material(&self, id: MaterialId) -> Result<MaterialRecord> {
        self.materials
            .find_material(id)
            .await
            .map_err(ProjectionError::lookup("material"))?
            .ok_or_else(|| ProjectionError::missing("material", id))
    }

    pub async fn task(&self, id: TaskId) -> Result<TaskRecord> {
        self.tasks
            .find_task(id)
            .await
            .map_err(ProjectionError::lookup("task"))?
            .ok_or_else(|| ProjectionError::missing("task", id))
    }
}
