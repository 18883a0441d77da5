//! Activity timeline of every crop batch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ActivityId, AggregateId, AreaId, PhotoId, TaskId};
use event_store::{EventEnvelope, Version};
use growth::crop::HarvestType;
use growth::{Aggregate, Crop, CropEvent, DomainEvent, TASK_AGGREGATE_TYPE};
use serde::{Deserialize, Serialize};

use super::{CropTask, NUTRIENT, PESTCONTROL, completed_crop_task};
use crate::lookups::ReadModelLookups;
use crate::projection::{Checkpoint, Projection};
use crate::store::CropActivityStore;
use crate::{ProjectionError, Result};

/// Description given to a seed entry rewritten by a container or inventory change.
pub const UPDATED_DESCRIPTION: &str = "UPDATED";

/// What happened, with the details shown on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Seed {
        area_id: AreaId,
        area_name: String,
        quantity: u32,
        seeding_date: DateTime<Utc>,
    },
    Move {
        src_area_id: AreaId,
        src_area_name: String,
        dst_area_id: AreaId,
        dst_area_name: String,
        quantity: u32,
        moved_date: DateTime<Utc>,
    },
    Harvest {
        harvest_type: HarvestType,
        src_area_id: AreaId,
        src_area_name: String,
        quantity: u32,
        produced_gram_quantity: f64,
        harvest_date: DateTime<Utc>,
    },
    Dump {
        src_area_id: AreaId,
        src_area_name: String,
        quantity: u32,
        dump_date: DateTime<Utc>,
    },
    Water {
        area_id: AreaId,
        area_name: String,
        watering_date: DateTime<Utc>,
    },
    Photo {
        photo_id: PhotoId,
        filename: String,
        mime_type: String,
        size: u64,
        width: u32,
        height: u32,
        description: String,
    },
    Fertilize {
        task_id: TaskId,
        material_type: String,
        material_name: String,
        area_name: String,
    },
    Pesticide {
        task_id: TaskId,
        material_type: String,
        material_name: String,
        area_name: String,
    },
    Task {
        task_id: TaskId,
        category: String,
        title: String,
        description: String,
        area_name: String,
    },
}

impl ActivityKind {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityKind::Seed { .. } => ActivityType::Seed,
            ActivityKind::Move { .. } => ActivityType::Move,
            ActivityKind::Harvest { .. } => ActivityType::Harvest,
            ActivityKind::Dump { .. } => ActivityType::Dump,
            ActivityKind::Water { .. } => ActivityType::Water,
            ActivityKind::Photo { .. } => ActivityType::Photo,
            ActivityKind::Fertilize { .. } => ActivityType::Fertilize,
            ActivityKind::Pesticide { .. } => ActivityType::Pesticide,
            ActivityKind::Task { .. } => ActivityType::Task,
        }
    }
}

/// The discriminator of an [`ActivityKind`], used to query by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityType {
    Seed,
    Move,
    Harvest,
    Dump,
    Water,
    Photo,
    Fertilize,
    Pesticide,
    Task,
}

impl ActivityType {
    pub fn code(&self) -> &'static str {
        match self {
            ActivityType::Seed => "SEED",
            ActivityType::Move => "MOVE",
            ActivityType::Harvest => "HARVEST",
            ActivityType::Dump => "DUMP",
            ActivityType::Water => "WATER",
            ActivityType::Photo => "PHOTO",
            ActivityType::Fertilize => "FERTILIZE",
            ActivityType::Pesticide => "PESTICIDE",
            ActivityType::Task => "TASK",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ActivityType {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "SEED" => ActivityType::Seed,
            "MOVE" => ActivityType::Move,
            "HARVEST" => ActivityType::Harvest,
            "DUMP" => ActivityType::Dump,
            "WATER" => ActivityType::Water,
            "PHOTO" => ActivityType::Photo,
            "FERTILIZE" => ActivityType::Fertilize,
            "PESTICIDE" => ActivityType::Pesticide,
            "TASK" => ActivityType::Task,
            other => {
                return Err(ProjectionError::Corrupt(format!(
                    "unknown activity type `{other}`"
                )));
            }
        })
    }
}

/// One entry of a batch's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropActivity {
    pub id: ActivityId,
    pub crop_id: AggregateId,
    pub batch_id: String,
    pub container_type: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub kind: ActivityKind,
}

impl CropActivity {
    pub fn activity_type(&self) -> ActivityType {
        self.kind.activity_type()
    }
}

/// Appends an activity per crop event, and per completed crop task.
///
/// Batch ID and container type of each entry are taken from the batch's
/// seed entry, which is the first one written for a batch.
#[derive(Clone)]
pub struct CropActivityProjection {
    store: Arc<dyn CropActivityStore>,
    lookups: ReadModelLookups,
}

impl CropActivityProjection {
    pub const NAME: &'static str = "crop_activity";

    pub fn new(store: Arc<dyn CropActivityStore>, lookups: ReadModelLookups) -> Self {
        Self { store, lookups }
    }

    pub fn store(&self) -> &Arc<dyn CropActivityStore> {
        &self.store
    }

    async fn seed(&self, crop_id: AggregateId) -> Result<CropActivity> {
        self.store
            .find_by_crop_and_type(crop_id, ActivityType::Seed)
            .await?
            .ok_or_else(|| ProjectionError::missing("seed activity", crop_id))
    }

    /// A new entry for `seed`'s batch. The ID is derived from the event so
    /// that replaying the log reproduces the same timeline.
    fn entry(
        event: &EventEnvelope,
        seed: &CropActivity,
        description: String,
        kind: ActivityKind,
    ) -> CropActivity {
        CropActivity {
            id: ActivityId::from_uuid(event.event_id.as_uuid()),
            crop_id: seed.crop_id,
            batch_id: seed.batch_id.clone(),
            container_type: seed.container_type.clone(),
            created_at: event.created_at,
            description,
            kind,
        }
    }

    async fn fold_crop_event(
        &self,
        event: &EventEnvelope,
        crop_event: CropEvent,
    ) -> Result<Option<CropActivity>> {
        let activity = match crop_event {
            CropEvent::BatchCreated(data) => {
                let area = self.lookups.area(data.initial_area_id).await?;
                CropActivity {
                    id: ActivityId::from_uuid(event.event_id.as_uuid()),
                    crop_id: data.crop_id,
                    batch_id: data.batch_id,
                    container_type: data.container.kind.code().to_string(),
                    created_at: event.created_at,
                    description: String::new(),
                    kind: ActivityKind::Seed {
                        area_id: area.id,
                        area_name: area.name,
                        quantity: data.quantity,
                        seeding_date: data.created_at,
                    },
                }
            }
            CropEvent::ContainerChanged(data) => {
                let mut seed = self.seed(data.crop_id).await?;
                seed.container_type = data.container.kind.code().to_string();
                if let ActivityKind::Seed { quantity, .. } = &mut seed.kind {
                    *quantity = data.container.quantity;
                }
                seed.description = UPDATED_DESCRIPTION.to_string();
                seed
            }
            CropEvent::InventoryChanged(data) => {
                let mut seed = self.seed(data.crop_id).await?;
                seed.batch_id = data.batch_id;
                seed.description = UPDATED_DESCRIPTION.to_string();
                seed
            }
            CropEvent::Moved(data) => {
                let mut seed = self.seed(data.crop_id).await?;
                seed.batch_id = data.batch_id;
                seed.container_type = data.container_type;
                let src = self.lookups.area(data.src_area_id).await?;
                let dst = self.lookups.area(data.dst_area_id).await?;
                Self::entry(
                    event,
                    &seed,
                    String::new(),
                    ActivityKind::Move {
                        src_area_id: src.id,
                        src_area_name: src.name,
                        dst_area_id: dst.id,
                        dst_area_name: dst.name,
                        quantity: data.quantity,
                        moved_date: data.moved_at,
                    },
                )
            }
            CropEvent::Harvested(data) => {
                let seed = self.seed(data.crop_id).await?;
                let src = self
                    .lookups
                    .area(data.harvested_storage.source_area_id)
                    .await?;
                Self::entry(
                    event,
                    &seed,
                    data.notes,
                    ActivityKind::Harvest {
                        harvest_type: data.harvest_type,
                        src_area_id: src.id,
                        src_area_name: src.name,
                        quantity: data.harvested_quantity,
                        produced_gram_quantity: data.produced_gram_quantity,
                        harvest_date: data.harvested_at,
                    },
                )
            }
            CropEvent::Dumped(data) => {
                let seed = self.seed(data.crop_id).await?;
                let src = self.lookups.area(data.trash.source_area_id).await?;
                Self::entry(
                    event,
                    &seed,
                    data.notes,
                    ActivityKind::Dump {
                        src_area_id: src.id,
                        src_area_name: src.name,
                        quantity: data.quantity,
                        dump_date: data.dumped_at,
                    },
                )
            }
            CropEvent::Watered(data) => {
                let mut seed = self.seed(data.crop_id).await?;
                seed.batch_id = data.batch_id;
                seed.container_type = data.container_type;
                Self::entry(
                    event,
                    &seed,
                    String::new(),
                    ActivityKind::Water {
                        area_id: data.area_id,
                        area_name: data.area_name,
                        watering_date: data.watered_at,
                    },
                )
            }
            CropEvent::PhotoCreated(data) => {
                let seed = self.seed(data.crop_id).await?;
                Self::entry(
                    event,
                    &seed,
                    String::new(),
                    ActivityKind::Photo {
                        photo_id: data.photo_id,
                        filename: data.filename,
                        mime_type: data.mime_type,
                        size: data.size,
                        width: data.width,
                        height: data.height,
                        description: data.description,
                    },
                )
            }
            CropEvent::NoteCreated(_) | CropEvent::NoteRemoved(_) => return Ok(None),
        };
        Ok(Some(activity))
    }

    async fn fold_task_event(&self, event: &EventEnvelope) -> Result<Option<CropActivity>> {
        let Some(CropTask {
            record,
            crop_id,
            completed_at: _,
        }) = completed_crop_task(&self.lookups, event).await?
        else {
            return Ok(None);
        };
        let seed = self.seed(crop_id).await?;

        let area_name = match record.area_id {
            Some(area_id) => self.lookups.area(area_id).await?.name,
            None => String::new(),
        };
        let (material_type, material_name) = match record.material_id {
            Some(material_id) => {
                let material = self.lookups.material(material_id).await?;
                (material.plant_type, material.name)
            }
            None => (String::new(), String::new()),
        };

        let kind = match record.category.as_str() {
            NUTRIENT => ActivityKind::Fertilize {
                task_id: record.id,
                material_type,
                material_name,
                area_name,
            },
            PESTCONTROL => ActivityKind::Pesticide {
                task_id: record.id,
                material_type,
                material_name,
                area_name,
            },
            _ => ActivityKind::Task {
                task_id: record.id,
                category: record.category,
                title: record.title,
                description: record.description,
                area_name,
            },
        };
        Ok(Some(Self::entry(event, &seed, String::new(), kind)))
    }
}

#[async_trait]
impl Projection for CropActivityProjection {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        self.store.checkpoint(aggregate_id).await
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let activity = if event.aggregate_type == Crop::aggregate_type() {
            let crop_event = CropEvent::from_envelope(event)?;
            self.fold_crop_event(event, crop_event).await?
        } else if event.aggregate_type == TASK_AGGREGATE_TYPE {
            self.fold_task_event(event).await?
        } else {
            None
        };

        let checkpoint = Checkpoint::of(event);
        let applied = match activity {
            Some(activity) => self.store.save(&activity, checkpoint).await?,
            None => self.store.save_checkpoint(checkpoint).await?,
        };
        if !applied {
            tracing::debug!(projection = Self::NAME, %checkpoint, "stale write dropped");
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.store.reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_tagged_by_code() {
        let kind = ActivityKind::Water {
            area_id: AreaId::new(),
            area_name: "Bed 1".to_string(),
            watering_date: Utc::now(),
        };
        let json = serde_json::to_value(&kind).unwrap();

        assert_eq!(json["code"], "WATER");
        assert_eq!(json["area_name"], "Bed 1");
        assert_eq!(kind.activity_type(), ActivityType::Water);
    }

    #[test]
    fn activity_type_codes_parse_back() {
        for t in [ActivityType::Seed, ActivityType::Fertilize, ActivityType::Task] {
            assert_eq!(t.code().parse::<ActivityType>().unwrap(), t);
        }
        assert!("PRUNE".parse::<ActivityType>().is_err());
    }
}
