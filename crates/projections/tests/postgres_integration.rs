//! PostgreSQL integration tests for the crop read model stores.
//!
//! The tests share one container and truncate the read tables first, so
//! they are serialized:
//!
//! ```bash
//! cargo test -p projections --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use common::{ActivityId, AggregateId, AreaId, FarmId, MaterialId, NoteId, Page, PhotoId};
use event_store::{PostgresEventStore, Version};
use growth::BatchIdQuery;
use growth::crop::{
    AreaBucket, Container, ContainerKind, CropNote, CropPhoto, CropStatus, CropType,
    HarvestedStorage, Trash,
};
use projections::views::{
    AreaStatus, AreaView, HarvestedStorageView, InventoryView, MovedAreaView, TrashView,
};
use projections::{
    ActivityKind, ActivityType, Checkpoint, CropActivity, CropActivityStore, CropRead,
    CropReadStore, PostgresCropActivityStore, PostgresCropReadStore, ProjectionError, TaskStamp,
    TaskStampKind,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // keeps the container alive for the whole test binary
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresEventStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE crop_read_note, crop_read_photo, crop_read_moved_area, \
         crop_read_harvested_storage, crop_read_trash, crop_read, crop_activity, \
         projection_checkpoint",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 6, 0, 0).unwrap()
}

fn crop(farm_id: FarmId, variety: &str, seeded_on: u32) -> CropRead {
    CropRead {
        id: AggregateId::new(),
        batch_id: format!("{}-{seeded_on}mar", variety.to_lowercase()),
        status: CropStatus::Active,
        crop_type: CropType::Seeding,
        container: Container {
            quantity: 40,
            kind: ContainerKind::Tray { cell: 20 },
        },
        inventory: InventoryView {
            id: MaterialId::new(),
            name: variety.to_string(),
            plant_type: "VEGETABLE".to_string(),
        },
        farm_id,
        initial_area: AreaView {
            name: "Nursery".to_string(),
            bucket: AreaBucket::new(AreaId::new(), 40, day(seeded_on)),
        },
        moved_areas: Vec::new(),
        harvested_storage: Vec::new(),
        trash: Vec::new(),
        notes: Vec::new(),
        photos: Vec::new(),
        area_status: AreaStatus {
            seeding: 40,
            growing: 0,
            dumped: 0,
        },
    }
}

/// Moves 30 plants to a greenhouse, harvests them and dumps the rest.
fn grown(mut crop: CropRead) -> CropRead {
    let nursery = crop.initial_area.bucket.area_id;
    let greenhouse = AreaId::new();

    crop.initial_area.bucket.current_quantity = 0;
    crop.initial_area.bucket.updated_at = day(12);
    let mut bucket = AreaBucket::new(greenhouse, 30, day(11));
    bucket.current_quantity = 0;
    bucket.last_watered = Some(day(11));
    crop.moved_areas.push(MovedAreaView {
        source_area_id: nursery,
        area: AreaView {
            name: "Greenhouse".to_string(),
            bucket,
        },
    });
    crop.harvested_storage.push(HarvestedStorageView {
        source_area_name: "Greenhouse".to_string(),
        storage: HarvestedStorage {
            source_area_id: greenhouse,
            quantity: 30,
            produced_gram_quantity: 1250.5,
            created_at: day(12),
            updated_at: day(12),
        },
    });
    crop.trash.push(TrashView {
        source_area_name: "Nursery".to_string(),
        trash: Trash {
            source_area_id: nursery,
            quantity: 10,
            created_at: day(12),
            updated_at: day(12),
        },
    });
    crop.area_status = AreaStatus {
        seeding: 0,
        growing: 0,
        dumped: 10,
    };
    crop.status = CropStatus::Archived;
    crop
}

async fn insert(store: &PostgresCropReadStore, crop: &CropRead) {
    let cp = Checkpoint::new(crop.id, Version::first());
    assert!(store.save(crop, cp).await.unwrap());
}

mod crop_read {
    use super::*;

    #[tokio::test]
    #[serial]
    async fn saved_crop_round_trips_with_children() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let mut row = grown(crop(FarmId::new(), "Tomato", 10));
        row.add_note(CropNote {
            id: NoteId::new(),
            content: "germinated".to_string(),
            created_at: day(10),
        });
        row.add_note(CropNote {
            id: NoteId::new(),
            content: "first leaves".to_string(),
            created_at: day(11),
        });
        for name in ["a.jpg", "b.jpg"] {
            row.add_photo(CropPhoto {
                id: PhotoId::new(),
                filename: name.to_string(),
                mime_type: "image/jpeg".to_string(),
                size: 4096,
                width: 800,
                height: 600,
                description: String::new(),
            });
        }

        insert(&store, &row).await;

        let loaded = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(loaded, row);
        assert_eq!(loaded.notes[0].content, "first leaves");
    }

    #[tokio::test]
    #[serial]
    async fn later_versions_update_children_in_place() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let mut row = grown(crop(FarmId::new(), "Tomato", 10));
        insert(&store, &row).await;

        row.moved_areas[0].area.bucket.last_watered = Some(day(13));
        row.harvested_storage[0].storage.quantity = 35;
        row.trash[0].trash.quantity = 5;
        let note = CropNote {
            id: NoteId::new(),
            content: "pruned".to_string(),
            created_at: day(13),
        };
        row.add_note(note.clone());
        assert!(
            store
                .save(&row, Checkpoint::new(row.id, Version::new(2)))
                .await
                .unwrap()
        );

        row.remove_note(note.id);
        assert!(
            store
                .save(&row, Checkpoint::new(row.id, Version::new(3)))
                .await
                .unwrap()
        );

        let loaded = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(loaded, row);
        assert_eq!(store.checkpoint(row.id).await.unwrap(), Some(Version::new(3)));
    }

    #[tokio::test]
    #[serial]
    async fn task_stamps_touch_only_their_column() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let row = grown(crop(FarmId::new(), "Tomato", 10));
        insert(&store, &row).await;
        let nursery = row.initial_area.bucket.area_id;
        let greenhouse = row.moved_areas[0].area.bucket.area_id;
        let task_stream = AggregateId::new();

        let stamp = |area_id, kind, on| TaskStamp {
            crop_id: row.id,
            area_id,
            kind,
            at: day(on),
        };
        let fed = stamp(greenhouse, TaskStampKind::Fertilized, 14);
        let sprayed = stamp(nursery, TaskStampKind::Pesticided, 15);
        assert!(
            store
                .stamp_task(&fed, Checkpoint::new(task_stream, Version::first()))
                .await
                .unwrap()
        );
        assert!(
            store
                .stamp_task(&sprayed, Checkpoint::new(task_stream, Version::new(2)))
                .await
                .unwrap()
        );

        // A crop event folded from the row as it was before the stamps.
        let mut folded = row.clone();
        folded.batch_id = "tomato-renamed".to_string();
        assert!(
            store
                .save(&folded, Checkpoint::new(row.id, Version::new(2)))
                .await
                .unwrap()
        );

        let loaded = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(loaded.batch_id, "tomato-renamed");
        assert_eq!(loaded.initial_area.bucket.last_pesticided, Some(day(15)));
        assert_eq!(loaded.moved_areas[0].area.bucket.last_fertilized, Some(day(14)));
        assert_eq!(loaded.moved_areas[0].area.bucket.last_watered, Some(day(11)));
        assert_eq!(store.checkpoint(task_stream).await.unwrap(), Some(Version::new(2)));
    }

    #[tokio::test]
    #[serial]
    async fn stamping_a_missing_row_keeps_the_checkpoint() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let task_stream = AggregateId::new();
        let stamp = TaskStamp {
            crop_id: AggregateId::new(),
            area_id: AreaId::new(),
            kind: TaskStampKind::Fertilized,
            at: day(14),
        };

        let err = store
            .stamp_task(&stamp, Checkpoint::new(task_stream, Version::first()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectionError::MissingReference { .. }));
        assert_eq!(store.checkpoint(task_stream).await.unwrap(), None);
    }

    #[tokio::test]
    #[serial]
    async fn quantities_beyond_i32_are_stored() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let mut row = crop(FarmId::new(), "Wheat", 2);
        let huge = u32::MAX;
        row.container.quantity = huge;
        row.initial_area.bucket = AreaBucket::new(row.initial_area.bucket.area_id, huge, day(2));
        row.area_status.seeding = huge;
        insert(&store, &row).await;

        let loaded = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(loaded, row);
    }

    #[tokio::test]
    #[serial]
    async fn writes_must_follow_the_stored_version() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let mut row = crop(FarmId::new(), "Basil", 1);
        insert(&store, &row).await;

        row.batch_id = "stale".to_string();
        assert!(
            !store
                .save(&row, Checkpoint::new(row.id, Version::first()))
                .await
                .unwrap()
        );
        assert!(
            !store
                .save(&row, Checkpoint::new(row.id, Version::new(3)))
                .await
                .unwrap()
        );
        assert!(
            !store
                .save_checkpoint(Checkpoint::new(row.id, Version::new(5)))
                .await
                .unwrap()
        );

        let stored = store.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(stored.batch_id, "basil-1mar");
        assert_eq!(store.checkpoint(row.id).await.unwrap(), Some(Version::first()));

        assert!(
            store
                .save_checkpoint(Checkpoint::new(row.id, Version::new(2)))
                .await
                .unwrap()
        );
        assert_eq!(store.checkpoint(row.id).await.unwrap(), Some(Version::new(2)));
    }

    #[tokio::test]
    #[serial]
    async fn farm_listing_is_newest_first_paged_and_filtered() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let farm_id = FarmId::new();
        let mut ids = Vec::new();
        for seeded_on in [3, 1, 2] {
            let row = crop(farm_id, "Basil", seeded_on);
            ids.push((seeded_on, row.id));
            insert(&store, &row).await;
        }
        let archived = grown(crop(farm_id, "Tomato", 4));
        insert(&store, &archived).await;
        insert(&store, &crop(FarmId::new(), "Basil", 5)).await;

        let page = store
            .find_all_by_farm(farm_id, Some(CropStatus::Active), Page::new(1, 2))
            .await
            .unwrap();
        let days: Vec<_> = page
            .iter()
            .map(|c| ids.iter().find(|(_, id)| *id == c.id).unwrap().0)
            .collect();
        assert_eq!(days, vec![3, 2]);

        let rest = store
            .find_all_by_farm(farm_id, Some(CropStatus::Active), Page::new(2, 2))
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);

        assert_eq!(store.count_all_by_farm(farm_id, None).await.unwrap(), 4);
        assert_eq!(
            store
                .count_all_by_farm(farm_id, Some(CropStatus::Active))
                .await
                .unwrap(),
            3
        );

        let archives = store.find_archives(farm_id, Page::default()).await.unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].id, archived.id);
        assert_eq!(store.count_archives(farm_id).await.unwrap(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn area_lookup_matches_initial_and_moved_areas() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let farm_id = FarmId::new();
        let moved = grown(crop(farm_id, "Tomato", 10));
        let greenhouse = moved.moved_areas[0].area.bucket.area_id;
        let nursery = moved.initial_area.bucket.area_id;
        insert(&store, &moved).await;
        insert(&store, &crop(farm_id, "Basil", 11)).await;

        let in_greenhouse = store.find_by_area(greenhouse).await.unwrap();
        assert_eq!(in_greenhouse.len(), 1);
        assert_eq!(in_greenhouse[0].id, moved.id);

        let in_nursery = store.find_by_area(nursery).await.unwrap();
        assert_eq!(in_nursery.len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn farm_totals_are_aggregated() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let farm_id = FarmId::new();
        insert(&store, &grown(crop(farm_id, "Tomato", 10))).await;
        insert(&store, &crop(farm_id, "Basil", 11)).await;
        insert(&store, &crop(farm_id, "Basil", 12)).await;
        insert(&store, &grown(crop(FarmId::new(), "Tomato", 13))).await;

        let info = store.crops_information(farm_id).await.unwrap();
        assert_eq!(info.total_harvest_produced, 1250.5);
        assert_eq!(info.total_plant_variety, 2);

        let counts: Vec<_> = store
            .count_total_batch(farm_id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| (b.variety_name, b.total_batch))
            .collect();
        assert_eq!(
            counts,
            vec![("Basil".to_string(), 2), ("Tomato".to_string(), 1)]
        );
    }

    #[tokio::test]
    #[serial]
    async fn batch_ids_resolve_to_crops() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let row = crop(FarmId::new(), "Lettuce", 7);
        insert(&store, &row).await;

        assert_eq!(
            store.find_crop_by_batch_id("lettuce-7mar").await.unwrap(),
            Some(row.id)
        );
        assert_eq!(store.find_crop_by_batch_id("nope").await.unwrap(), None);
        assert_eq!(
            store
                .find_by_batch_id("lettuce-7mar")
                .await
                .unwrap()
                .map(|c| c.id),
            Some(row.id)
        );
    }

    #[tokio::test]
    #[serial]
    async fn reset_clears_rows_and_checkpoints() {
        let store = PostgresCropReadStore::new(get_test_pool().await);
        let row = grown(crop(FarmId::new(), "Tomato", 10));
        insert(&store, &row).await;

        store.reset().await.unwrap();

        assert_eq!(store.find_by_id(row.id).await.unwrap(), None);
        assert_eq!(store.checkpoint(row.id).await.unwrap(), None);
        insert(&store, &row).await;
    }
}

mod crop_activity {
    use super::*;

    fn seed_entry(crop_id: AggregateId, at: DateTime<Utc>) -> CropActivity {
        CropActivity {
            id: ActivityId::new(),
            crop_id,
            batch_id: "tomato-10mar".to_string(),
            container_type: "TRAY".to_string(),
            created_at: at,
            description: String::new(),
            kind: ActivityKind::Seed {
                area_id: AreaId::new(),
                area_name: "Nursery".to_string(),
                quantity: 40,
                seeding_date: at,
            },
        }
    }

    fn water_entry(seed: &CropActivity, at: DateTime<Utc>) -> CropActivity {
        CropActivity {
            id: ActivityId::new(),
            created_at: at,
            kind: ActivityKind::Water {
                area_id: AreaId::new(),
                area_name: "Greenhouse".to_string(),
                watering_date: at,
            },
            ..seed.clone()
        }
    }

    #[tokio::test]
    #[serial]
    async fn timeline_is_newest_first() {
        let store = PostgresCropActivityStore::new(get_test_pool().await);
        let crop_id = AggregateId::new();
        let seed = seed_entry(crop_id, day(10));
        let first = water_entry(&seed, day(11));
        let second = water_entry(&seed, day(12));

        for (version, entry) in [&seed, &first, &second].into_iter().enumerate() {
            let cp = Checkpoint::new(crop_id, Version::new(version as i64 + 1));
            assert!(store.save(entry, cp).await.unwrap());
        }
        let other_crop = AggregateId::new();
        store
            .save(
                &seed_entry(other_crop, day(13)),
                Checkpoint::new(other_crop, Version::first()),
            )
            .await
            .unwrap();

        let timeline = store.find_all_by_crop(crop_id).await.unwrap();
        assert_eq!(timeline, vec![second.clone(), first, seed.clone()]);

        let latest = store
            .find_by_crop_and_type(crop_id, ActivityType::Water)
            .await
            .unwrap();
        assert_eq!(latest, Some(second));
        let found = store
            .find_by_crop_and_type(crop_id, ActivityType::Seed)
            .await
            .unwrap();
        assert_eq!(found, Some(seed));
        assert_eq!(
            store
                .find_by_crop_and_type(crop_id, ActivityType::Harvest)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    #[serial]
    async fn saving_an_existing_id_replaces_the_entry() {
        let store = PostgresCropActivityStore::new(get_test_pool().await);
        let crop_id = AggregateId::new();
        let mut seed = seed_entry(crop_id, day(10));
        assert!(
            store
                .save(&seed, Checkpoint::new(crop_id, Version::first()))
                .await
                .unwrap()
        );

        seed.container_type = "POT".to_string();
        seed.description = "UPDATED".to_string();
        assert!(
            store
                .save(&seed, Checkpoint::new(crop_id, Version::new(2)))
                .await
                .unwrap()
        );

        let timeline = store.find_all_by_crop(crop_id).await.unwrap();
        assert_eq!(timeline, vec![seed]);
    }

    #[tokio::test]
    #[serial]
    async fn stale_entries_are_not_written() {
        let store = PostgresCropActivityStore::new(get_test_pool().await);
        let crop_id = AggregateId::new();
        let seed = seed_entry(crop_id, day(10));
        store
            .save(&seed, Checkpoint::new(crop_id, Version::first()))
            .await
            .unwrap();

        let replayed = water_entry(&seed, day(11));
        assert!(
            !store
                .save(&replayed, Checkpoint::new(crop_id, Version::first()))
                .await
                .unwrap()
        );

        assert_eq!(store.find_all_by_crop(crop_id).await.unwrap().len(), 1);
        assert_eq!(store.checkpoint(crop_id).await.unwrap(), Some(Version::first()));
    }

    #[tokio::test]
    #[serial]
    async fn read_and_activity_checkpoints_are_kept_apart() {
        let pool = get_test_pool().await;
        let crops = PostgresCropReadStore::new(pool.clone());
        let activities = PostgresCropActivityStore::new(pool);
        let crop_id = AggregateId::new();

        activities
            .save(
                &seed_entry(crop_id, day(10)),
                Checkpoint::new(crop_id, Version::first()),
            )
            .await
            .unwrap();

        assert_eq!(crops.checkpoint(crop_id).await.unwrap(), None);
        activities.reset().await.unwrap();
        assert_eq!(activities.checkpoint(crop_id).await.unwrap(), None);
    }
}
