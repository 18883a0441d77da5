use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, AreaId, FarmId, MaterialId};
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{EventEnvelope, InMemoryEventStore, store::EventStore};
use growth::crop::{ContainerKind, CropType};
use growth::{
    AreaRecord, AreaType, BatchIdQuery, CreateCrop, Crop, CropLookups, CropService, DumpCrop,
    InMemoryMasterData, LookupResult, MaterialRecord, MoveCrop, reconstruct,
};

struct NoBatches;

#[async_trait]
impl BatchIdQuery for NoBatches {
    async fn find_crop_by_batch_id(&self, _: &str) -> LookupResult<AggregateId> {
        Ok(None)
    }
}

struct Setup {
    service: CropService<InMemoryEventStore>,
    store: InMemoryEventStore,
    seeding: AreaId,
    growing: AreaId,
    material: MaterialId,
}

async fn setup() -> Setup {
    let data = Arc::new(InMemoryMasterData::new());
    let farm_id = FarmId::new();
    let seeding = AreaId::new();
    let growing = AreaId::new();
    for (id, area_type) in [(seeding, AreaType::Seeding), (growing, AreaType::Growing)] {
        data.insert_area(AreaRecord {
            id,
            name: "Bench area".to_string(),
            area_type,
            farm_id,
        })
        .await;
    }
    let material = MaterialId::new();
    data.insert_material(MaterialRecord {
        id: material,
        name: "Bench Basil".to_string(),
        plant_type: "VEGETABLE".to_string(),
    })
    .await;

    let store = InMemoryEventStore::new();
    let lookups = CropLookups::new(data.clone(), data, Arc::new(NoBatches));
    Setup {
        service: CropService::new(store.clone(), lookups),
        store,
        seeding,
        growing,
        material,
    }
}

fn create_cmd(s: &Setup, quantity: u32) -> CreateCrop {
    CreateCrop::new(
        s.seeding,
        CropType::Seeding,
        s.material,
        quantity,
        ContainerKind::Tray { cell: 50 },
    )
}

fn bench_create_crop(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let s = rt.block_on(setup());

    c.bench_function("growth/create_crop", |b| {
        b.iter(|| {
            rt.block_on(async {
                s.service.create_crop(create_cmd(&s, 100)).await.unwrap();
            });
        });
    });
}

fn bench_move_crop(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let s = rt.block_on(setup());
    let cmd = create_cmd(&s, u32::MAX);
    let crop_id = cmd.crop_id;
    rt.block_on(async { s.service.create_crop(cmd).await.unwrap() });

    c.bench_function("growth/move_crop", |b| {
        b.iter(|| {
            rt.block_on(async {
                s.service
                    .move_crop(MoveCrop::new(crop_id, s.seeding, s.growing, 1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reconstruct(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let s = rt.block_on(setup());
    let cmd = create_cmd(&s, 10_000);
    let crop_id = cmd.crop_id;

    let history: Vec<EventEnvelope> = rt.block_on(async {
        s.service.create_crop(cmd).await.unwrap();
        for _ in 0..50 {
            s.service
                .move_crop(MoveCrop::new(crop_id, s.seeding, s.growing, 10))
                .await
                .unwrap();
            s.service
                .dump_crop(DumpCrop::new(crop_id, s.growing, 1))
                .await
                .unwrap();
        }
        s.store.get_events_for_aggregate(crop_id).await.unwrap()
    });

    c.bench_function("growth/reconstruct_101_events", |b| {
        b.iter(|| {
            let crop: Crop = reconstruct(&history).unwrap();
            crop
        });
    });
}

criterion_group!(benches, bench_create_crop, bench_move_crop, bench_reconstruct);
criterion_main!(benches);
