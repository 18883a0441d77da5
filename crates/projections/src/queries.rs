//! Query facade over the crop read models.

use std::sync::Arc;

use common::{AggregateId, AreaId, FarmId, Page};
use growth::FarmQuery;
use growth::crop::CropStatus;

use crate::store::{CropActivityStore, CropReadStore};
use crate::views::{ActivityType, BatchCount, CropActivity, CropRead, CropsInformation};
use crate::{ProjectionError, Result};

/// One page of a farm listing with the total across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct CropPage {
    pub crops: Vec<CropRead>,
    pub page: Page,
    pub total: u64,
}

/// Read-side entry point. Farm-scoped queries check the farm exists first.
#[derive(Clone)]
pub struct CropQueries {
    crops: Arc<dyn CropReadStore>,
    activities: Arc<dyn CropActivityStore>,
    farms: Arc<dyn FarmQuery>,
}

impl CropQueries {
    pub fn new(
        crops: Arc<dyn CropReadStore>,
        activities: Arc<dyn CropActivityStore>,
        farms: Arc<dyn FarmQuery>,
    ) -> Self {
        Self {
            crops,
            activities,
            farms,
        }
    }

    async fn ensure_farm(&self, farm_id: FarmId) -> Result<()> {
        self.farms
            .find_farm(farm_id)
            .await
            .map_err(ProjectionError::lookup("farm"))?
            .ok_or_else(|| ProjectionError::missing("farm", farm_id))?;
        Ok(())
    }

    pub async fn crop(&self, id: AggregateId) -> Result<Option<CropRead>> {
        self.crops.find_by_id(id).await
    }

    pub async fn crop_by_batch_id(&self, batch_id: &str) -> Result<Option<CropRead>> {
        self.crops.find_by_batch_id(batch_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn farm_crops(
        &self,
        farm_id: FarmId,
        status: Option<CropStatus>,
        page: Page,
    ) -> Result<CropPage> {
        self.ensure_farm(farm_id).await?;
        let crops = self.crops.find_all_by_farm(farm_id, status, page).await?;
        let total = self.crops.count_all_by_farm(farm_id, status).await?;
        Ok(CropPage { crops, page, total })
    }

    #[tracing::instrument(skip(self))]
    pub async fn archives(&self, farm_id: FarmId, page: Page) -> Result<CropPage> {
        self.ensure_farm(farm_id).await?;
        let crops = self.crops.find_archives(farm_id, page).await?;
        let total = self.crops.count_archives(farm_id).await?;
        Ok(CropPage { crops, page, total })
    }

    pub async fn area_crops(&self, area_id: AreaId) -> Result<Vec<CropRead>> {
        self.crops.find_by_area(area_id).await
    }

    pub async fn information(&self, farm_id: FarmId) -> Result<CropsInformation> {
        self.ensure_farm(farm_id).await?;
        self.crops.crops_information(farm_id).await
    }

    pub async fn total_batches(&self, farm_id: FarmId) -> Result<Vec<BatchCount>> {
        self.ensure_farm(farm_id).await?;
        self.crops.count_total_batch(farm_id).await
    }

    pub async fn activities(&self, crop_id: AggregateId) -> Result<Vec<CropActivity>> {
        self.activities.find_all_by_crop(crop_id).await
    }

    pub async fn activity_of_type(
        &self,
        crop_id: AggregateId,
        activity_type: ActivityType,
    ) -> Result<Option<CropActivity>> {
        self.activities
            .find_by_crop_and_type(crop_id, activity_type)
            .await
    }
}
