//! Read-only collaborators consulted while deciding commands and building
//! read models.
//!
//! Every lookup distinguishes three outcomes: `Ok(Some(_))` for a hit,
//! `Ok(None)` for "does not exist", and `Err(_)` when the backing query
//! itself failed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, AreaId, FarmId, MaterialId, TaskId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A collaborator could not answer.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup unavailable: {0}")]
    Unavailable(String),

    #[error("lookup backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type LookupResult<T> = Result<Option<T>, LookupError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaType {
    Seeding,
    Growing,
}

impl AreaType {
    pub fn code(&self) -> &'static str {
        match self {
            AreaType::Seeding => "SEEDING",
            AreaType::Growing => "GROWING",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AreaType {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEEDING" => Ok(AreaType::Seeding),
            "GROWING" => Ok(AreaType::Growing),
            other => Err(LookupError::Unavailable(format!("unknown area type `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub id: AreaId,
    pub name: String,
    pub area_type: AreaType,
    pub farm_id: FarmId,
}

/// An inventory material that can be planted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: MaterialId,
    pub name: String,
    pub plant_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmRecord {
    pub id: FarmId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub domain: String,
    /// The crop the task was raised for, if it targets one.
    pub crop_id: Option<AggregateId>,
    pub material_id: Option<MaterialId>,
    pub area_id: Option<AreaId>,
}

#[async_trait]
pub trait AreaQuery: Send + Sync {
    async fn find_area(&self, id: AreaId) -> LookupResult<AreaRecord>;
}

#[async_trait]
pub trait MaterialQuery: Send + Sync {
    async fn find_material(&self, id: MaterialId) -> LookupResult<MaterialRecord>;

    async fn find_material_by_plant_type_and_name(
        &self,
        plant_type: &str,
        name: &str,
    ) -> LookupResult<MaterialRecord>;
}

/// Resolves a batch ID to the crop currently holding it.
#[async_trait]
pub trait BatchIdQuery: Send + Sync {
    async fn find_crop_by_batch_id(&self, batch_id: &str) -> LookupResult<AggregateId>;
}

#[async_trait]
pub trait FarmQuery: Send + Sync {
    async fn find_farm(&self, id: FarmId) -> LookupResult<FarmRecord>;
}

#[async_trait]
pub trait TaskQuery: Send + Sync {
    async fn find_task(&self, id: TaskId) -> LookupResult<TaskRecord>;
}

/// The collaborators crop commands are decided against.
#[derive(Clone)]
pub struct CropLookups {
    pub areas: Arc<dyn AreaQuery>,
    pub materials: Arc<dyn MaterialQuery>,
    pub batch_ids: Arc<dyn BatchIdQuery>,
}

impl CropLookups {
    pub fn new(
        areas: Arc<dyn AreaQuery>,
        materials: Arc<dyn MaterialQuery>,
        batch_ids: Arc<dyn BatchIdQuery>,
    ) -> Self {
        Self {
            areas,
            materials,
            batch_ids,
        }
    }
}

/// Master data held in memory.
///
/// Stands in for the farm, area, material and task contexts when they are
/// not backed by a database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMasterData {
    areas: Arc<RwLock<HashMap<AreaId, AreaRecord>>>,
    materials: Arc<RwLock<HashMap<MaterialId, MaterialRecord>>>,
    farms: Arc<RwLock<HashMap<FarmId, FarmRecord>>>,
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl InMemoryMasterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_area(&self, area: AreaRecord) {
        self.areas.write().await.insert(area.id, area);
    }

    pub async fn insert_material(&self, material: MaterialRecord) {
        self.materials.write().await.insert(material.id, material);
    }

    pub async fn insert_farm(&self, farm: FarmRecord) {
        self.farms.write().await.insert(farm.id, farm);
    }

    pub async fn insert_task(&self, task: TaskRecord) {
        self.tasks.write().await.insert(task.id, task);
    }

    /// Whether no record of any kind has been loaded.
    pub async fn is_empty(&self) -> bool {
        self.areas.read().await.is_empty()
            && self.materials.read().await.is_empty()
            && self.farms.read().await.is_empty()
            && self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl AreaQuery for InMemoryMasterData {
    async fn find_area(&self, id: AreaId) -> LookupResult<AreaRecord> {
        Ok(self.areas.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl MaterialQuery for InMemoryMasterData {
    async fn find_material(&self, id: MaterialId) -> LookupResult<MaterialRecord> {
        Ok(self.materials.read().await.get(&id).cloned())
    }

    async fn find_material_by_plant_type_and_name(
        &self,
        plant_type: &str,
        name: &str,
    ) -> LookupResult<MaterialRecord> {
        Ok(self
            .materials
            .read()
            .await
            .values()
            .find(|m| m.plant_type == plant_type && m.name == name)
            .cloned())
    }
}

#[async_trait]
impl FarmQuery for InMemoryMasterData {
    async fn find_farm(&self, id: FarmId) -> LookupResult<FarmRecord> {
        Ok(self.farms.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl TaskQuery for InMemoryMasterData {
    async fn find_task(&self, id: TaskId) -> LookupResult<TaskRecord> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_records_are_none_not_errors() {
        let data = InMemoryMasterData::new();
        assert!(data.find_area(AreaId::new()).await.unwrap().is_none());
        assert!(data.find_material(MaterialId::new()).await.unwrap().is_none());
        assert!(data.find_task(TaskId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn any_record_makes_master_data_non_empty() {
        let data = InMemoryMasterData::new();
        assert!(data.is_empty().await);

        data.insert_farm(FarmRecord {
            id: FarmId::new(),
            name: "Hillside".to_string(),
        })
        .await;
        assert!(!data.is_empty().await);
    }

    #[tokio::test]
    async fn material_by_plant_type_and_name() {
        let data = InMemoryMasterData::new();
        let tomato = MaterialRecord {
            id: MaterialId::new(),
            name: "Tomato Super One".to_string(),
            plant_type: "VEGETABLE".to_string(),
        };
        data.insert_material(tomato.clone()).await;

        let found = data
            .find_material_by_plant_type_and_name("VEGETABLE", "Tomato Super One")
            .await
            .unwrap();
        assert_eq!(found, Some(tomato));

        let other = data
            .find_material_by_plant_type_and_name("HERB", "Tomato Super One")
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn area_type_codes() {
        assert_eq!("GROWING".parse::<AreaType>().unwrap(), AreaType::Growing);
        assert!("NURSERY".parse::<AreaType>().is_err());
        assert_eq!(
            serde_json::to_value(AreaType::Seeding).unwrap(),
            serde_json::json!("SEEDING")
        );
    }
}
