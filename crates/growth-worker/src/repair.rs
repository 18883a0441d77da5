//! Periodic repair pass over the projections.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use event_store::EventStore;
use projections::ProjectionProcessor;
use tokio::time::MissedTickBehavior;

/// Runs a catch-up every `every` until `shutdown` completes.
///
/// The first pass happens one interval after the call; start-up catch-up is
/// the caller's job. A failed pass is logged and retried on the next tick.
pub async fn run_repair_loop<S, F>(
    processor: Arc<ProjectionProcessor<S>>,
    every: Duration,
    shutdown: F,
) where
    S: EventStore,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("repair loop stopped");
                return;
            }
            _ = ticker.tick() => {
                metrics::counter!("repair_passes_total").increment(1);
                match processor.run_catch_up().await {
                    Ok(report) if report.applied > 0 || report.failures > 0 => {
                        tracing::info!(
                            applied = report.applied,
                            failures = report.failures,
                            "repair pass changed the read models"
                        );
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(%error, "repair pass failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{AreaId, FarmId, MaterialId};
    use growth::crop::{ContainerKind, CropType};
    use growth::{
        AreaRecord, AreaType, CreateCrop, CropLookups, CropService, InMemoryMasterData,
        MaterialRecord,
    };
    use projections::{CropReadProjection, InMemoryCropReadStore, ReadModelLookups};
    use tokio::sync::oneshot;

    use crate::Backend;
    use crate::config::Config;

    #[tokio::test]
    async fn unpublished_events_are_picked_up() {
        let data = Arc::new(InMemoryMasterData::new());
        let (area_id, material_id) = (AreaId::new(), MaterialId::new());
        data.insert_area(AreaRecord {
            id: area_id,
            name: "Nursery".to_string(),
            area_type: AreaType::Seeding,
            farm_id: FarmId::new(),
        })
        .await;
        data.insert_material(MaterialRecord {
            id: material_id,
            name: "Chili Bird Eye".to_string(),
            plant_type: "VEGETABLE".to_string(),
        })
        .await;
        let backend = Backend::in_memory(&Config::default(), data.clone());

        // Commit through a service that never publishes.
        let silent = CropService::new(
            backend.events.clone(),
            CropLookups::new(data.clone(), data.clone(), Arc::new(InMemoryCropReadStore::new())),
        );
        let cmd = CreateCrop::new(area_id, CropType::Seeding, material_id, 10, ContainerKind::Pot)
            .at(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        let crop_id = cmd.crop_id;
        silent.create_crop(cmd).await.unwrap();
        assert!(backend.queries.crop(crop_id).await.unwrap().is_none());

        let (stop, stopped) = oneshot::channel::<()>();
        let repair = tokio::spawn(run_repair_loop(
            backend.processor.clone(),
            Duration::from_millis(10),
            async move {
                let _ = stopped.await;
            },
        ));

        let mut found = None;
        for _ in 0..100 {
            found = backend.queries.crop(crop_id).await.unwrap();
            if found.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop.send(()).unwrap();
        repair.await.unwrap();

        assert_eq!(found.map(|c| c.inventory.name).as_deref(), Some("Chili Bird Eye"));
    }

    #[tokio::test]
    async fn shutdown_ends_the_loop_before_the_first_pass() {
        let data = Arc::new(InMemoryMasterData::new());
        let lookups = ReadModelLookups::new(data.clone(), data.clone(), data);
        let processor = Arc::new(
            ProjectionProcessor::new(event_store::InMemoryEventStore::new()).with_projection(
                Arc::new(CropReadProjection::new(
                    Arc::new(InMemoryCropReadStore::new()),
                    lookups,
                )),
            ),
        );

        run_repair_loop(processor, Duration::from_secs(3600), async {}).await;
    }
}
