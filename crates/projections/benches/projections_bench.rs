use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use common::{AreaId, FarmId, MaterialId};
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{EventStore, InMemoryEventStore};
use growth::crop::{ContainerKind, CropType, HarvestType, ProducedUnit};
use growth::{
    AreaRecord, AreaType, CreateCrop, CropLookups, CropService, HarvestCrop, InMemoryMasterData,
    MaterialRecord, MoveCrop, WaterCrop,
};
use projections::{
    CropActivityProjection, CropReadProjection, InMemoryCropActivityStore, InMemoryCropReadStore,
    ProjectionProcessor, ReadModelLookups,
};

struct Fixture {
    store: InMemoryEventStore,
    master: Arc<InMemoryMasterData>,
}

/// Runs N crop batches through seed, move, water and harvest: 4 events each.
async fn populate(n: usize) -> Fixture {
    let master = Arc::new(InMemoryMasterData::new());
    let farm_id = FarmId::new();
    let (seeding, growing, tomato) = (AreaId::new(), AreaId::new(), MaterialId::new());
    for (id, name, area_type) in [
        (seeding, "Nursery", AreaType::Seeding),
        (growing, "Greenhouse", AreaType::Growing),
    ] {
        master
            .insert_area(AreaRecord {
                id,
                name: name.to_string(),
                area_type,
                farm_id,
            })
            .await;
    }
    master
        .insert_material(MaterialRecord {
            id: tomato,
            name: "Tomato Super One".to_string(),
            plant_type: "VEGETABLE".to_string(),
        })
        .await;

    let store = InMemoryEventStore::new();
    let service = CropService::new(
        store.clone(),
        CropLookups::new(
            master.clone(),
            master.clone(),
            Arc::new(InMemoryCropReadStore::new()),
        ),
    );

    let start = Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap();
    for i in 0..n {
        let at = start + Duration::days(i as i64);
        let cmd = CreateCrop::new(
            seeding,
            CropType::Seeding,
            tomato,
            50,
            ContainerKind::Tray { cell: 50 },
        )
        .at(at);
        let crop_id = cmd.crop_id;
        service.create_crop(cmd).await.unwrap();
        service
            .move_crop(MoveCrop::new(crop_id, seeding, growing, 50).at(at))
            .await
            .unwrap();
        service
            .water_crop(WaterCrop::new(crop_id, growing).at(at))
            .await
            .unwrap();
        service
            .harvest_crop(
                HarvestCrop::new(crop_id, growing, HarvestType::All, 4.0, ProducedUnit::Kg).at(at),
            )
            .await
            .unwrap();
    }

    Fixture { store, master }
}

fn processor(fixture: &Fixture) -> ProjectionProcessor<InMemoryEventStore> {
    let lookups = ReadModelLookups::new(
        fixture.master.clone(),
        fixture.master.clone(),
        fixture.master.clone(),
    );
    ProjectionProcessor::new(fixture.store.clone())
        .with_projection(Arc::new(CropReadProjection::new(
            Arc::new(InMemoryCropReadStore::new()),
            lookups.clone(),
        )))
        .with_projection(Arc::new(CropActivityProjection::new(
            Arc::new(InMemoryCropActivityStore::new()),
            lookups,
        )))
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for crops in [100, 1000] {
        let fixture = rt.block_on(populate(crops));
        c.bench_function(&format!("projections/catch_up_{}_events", crops * 4), |b| {
            b.iter(|| {
                rt.block_on(async {
                    processor(&fixture).run_catch_up().await.unwrap();
                });
            });
        });
    }
}

fn bench_live_delivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fixture = rt.block_on(populate(1));
    let events = rt.block_on(async {
        let mut stream = fixture.store.stream_all_events().await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = futures_util::StreamExt::next(&mut stream).await {
            events.push(event.unwrap());
        }
        events
    });

    c.bench_function("projections/deliver_one_lifecycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let processor = processor(&fixture);
                for event in &events {
                    processor.process_event(event).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_catch_up, bench_live_delivery);
criterion_main!(benches);
