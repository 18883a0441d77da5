use async_trait::async_trait;
use common::{AggregateId, AreaId, FarmId, NoteId, Page, PhotoId};
use event_store::Version;
use growth::crop::{
    AreaBucket, Container, ContainerKind, CropNote, CropPhoto, CropStatus, HarvestedStorage, Trash,
};
use growth::{BatchIdQuery, LookupError, LookupResult};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use super::{CropActivityStore, CropReadStore};
use crate::projection::Checkpoint;
use crate::views::{
    ActivityKind, ActivityType, AreaStatus, AreaView, BatchCount, CropActivity,
    CropActivityProjection, CropRead, CropReadProjection, CropsInformation, HarvestedStorageView,
    InventoryView, MovedAreaView, TaskStamp, TaskStampKind, TrashView,
};
use crate::{ProjectionError, Result};

const CROP_COLUMNS: &str = "SELECT uid, batch_id, status, crop_type, container_type, \
     container_cell, container_quantity, inventory_uid, inventory_name, inventory_plant_type, \
     farm_uid, initial_area_uid, initial_area_name, initial_quantity, current_quantity, \
     initial_created_at, initial_updated_at, last_watered, last_fertilized, last_pesticided, \
     last_pruned, area_status_seeding, area_status_growing, area_status_dumped FROM crop_read";

// Task stamp columns are only set on insert; see `CropReadStore`.
const UPSERT_CROP: &str = r#"
    INSERT INTO crop_read (
        uid, batch_id, status, crop_type, container_type, container_cell, container_quantity,
        inventory_uid, inventory_name, inventory_plant_type, farm_uid,
        initial_area_uid, initial_area_name, initial_quantity, current_quantity,
        initial_created_at, initial_updated_at,
        last_watered, last_fertilized, last_pesticided, last_pruned,
        area_status_seeding, area_status_growing, area_status_dumped
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
            $19, $20, $21, $22, $23, $24)
    ON CONFLICT (uid) DO UPDATE SET
        batch_id = EXCLUDED.batch_id,
        status = EXCLUDED.status,
        crop_type = EXCLUDED.crop_type,
        container_type = EXCLUDED.container_type,
        container_cell = EXCLUDED.container_cell,
        container_quantity = EXCLUDED.container_quantity,
        inventory_uid = EXCLUDED.inventory_uid,
        inventory_name = EXCLUDED.inventory_name,
        inventory_plant_type = EXCLUDED.inventory_plant_type,
        farm_uid = EXCLUDED.farm_uid,
        initial_area_uid = EXCLUDED.initial_area_uid,
        initial_area_name = EXCLUDED.initial_area_name,
        initial_quantity = EXCLUDED.initial_quantity,
        current_quantity = EXCLUDED.current_quantity,
        initial_created_at = EXCLUDED.initial_created_at,
        initial_updated_at = EXCLUDED.initial_updated_at,
        last_watered = EXCLUDED.last_watered,
        last_pruned = EXCLUDED.last_pruned,
        area_status_seeding = EXCLUDED.area_status_seeding,
        area_status_growing = EXCLUDED.area_status_growing,
        area_status_dumped = EXCLUDED.area_status_dumped
"#;

// Task stamp columns are left to `stamp_task`; see `CropReadStore`.
const UPDATE_MOVED_AREA: &str = r#"
    UPDATE crop_read_moved_area
    SET area_name = $3, source_area_uid = $4, initial_quantity = $5, current_quantity = $6,
        created_at = $7, updated_at = $8, last_watered = $9, last_pruned = $10
    WHERE crop_uid = $1 AND area_uid = $2
"#;

const INSERT_MOVED_AREA: &str = r#"
    INSERT INTO crop_read_moved_area (
        crop_uid, area_uid, area_name, source_area_uid, initial_quantity, current_quantity,
        created_at, updated_at, last_watered, last_pruned, last_fertilized, last_pesticided
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

const UPDATE_HARVESTED_STORAGE: &str = r#"
    UPDATE crop_read_harvested_storage
    SET source_area_name = $3, quantity = $4, produced_gram_quantity = $5,
        created_at = $6, updated_at = $7
    WHERE crop_uid = $1 AND source_area_uid = $2
"#;

const INSERT_HARVESTED_STORAGE: &str = r#"
    INSERT INTO crop_read_harvested_storage (
        crop_uid, source_area_uid, source_area_name, quantity, produced_gram_quantity,
        created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

const UPDATE_TRASH: &str = r#"
    UPDATE crop_read_trash
    SET source_area_name = $3, quantity = $4, created_at = $5, updated_at = $6
    WHERE crop_uid = $1 AND source_area_uid = $2
"#;

const INSERT_TRASH: &str = r#"
    INSERT INTO crop_read_trash (
        crop_uid, source_area_uid, source_area_name, quantity, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

const ACTIVITY_COLUMNS: &str = "SELECT uid, crop_uid, batch_id, container_type, activity, \
     description, created_at FROM crop_activity";

fn to_db(value: u32) -> i64 {
    i64::from(value)
}

fn from_db(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ProjectionError::Corrupt(format!("{column} {value} out of range")))
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}

/// Moves the projection's checkpoint for one aggregate forward, inside the
/// caller's transaction. The row is locked until the transaction ends.
async fn advance_checkpoint(
    conn: &mut PgConnection,
    projection: &str,
    checkpoint: Checkpoint,
) -> Result<bool> {
    let stored: Option<i64> = sqlx::query_scalar(
        "SELECT version FROM projection_checkpoint \
         WHERE projection = $1 AND aggregate_id = $2 FOR UPDATE",
    )
    .bind(projection)
    .bind(checkpoint.aggregate_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    if !checkpoint.follows(stored.map(Version::new)) {
        return Ok(false);
    }

    // The guard catches a concurrent first insert that the lock above cannot.
    let written = sqlx::query(
        r#"
        INSERT INTO projection_checkpoint (projection, aggregate_id, version)
        VALUES ($1, $2, $3)
        ON CONFLICT (projection, aggregate_id) DO UPDATE SET version = EXCLUDED.version
        WHERE projection_checkpoint.version = EXCLUDED.version - 1
        "#,
    )
    .bind(projection)
    .bind(checkpoint.aggregate_id.as_uuid())
    .bind(checkpoint.version.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(written.rows_affected() == 1)
}

async fn load_checkpoint(
    pool: &PgPool,
    projection: &str,
    aggregate_id: AggregateId,
) -> Result<Option<Version>> {
    let version: Option<i64> = sqlx::query_scalar(
        "SELECT version FROM projection_checkpoint WHERE projection = $1 AND aggregate_id = $2",
    )
    .bind(projection)
    .bind(aggregate_id.as_uuid())
    .fetch_optional(pool)
    .await?;
    Ok(version.map(Version::new))
}

async fn store_checkpoint(pool: &PgPool, projection: &str, checkpoint: Checkpoint) -> Result<bool> {
    let mut tx = pool.begin().await?;
    if !advance_checkpoint(&mut tx, projection, checkpoint).await? {
        return Ok(false);
    }
    tx.commit().await?;
    Ok(true)
}

/// Binds the columns a crop save owns; the insert adds the task stamps.
fn moved_area_query<'q>(
    sql: &'q str,
    crop_id: Uuid,
    moved: &'q MovedAreaView,
) -> Query<'q, Postgres, PgArguments> {
    let bucket = &moved.area.bucket;
    sqlx::query(sql)
        .bind(crop_id)
        .bind(bucket.area_id.as_uuid())
        .bind(&moved.area.name)
        .bind(moved.source_area_id.as_uuid())
        .bind(to_db(bucket.initial_quantity))
        .bind(to_db(bucket.current_quantity))
        .bind(bucket.created_at)
        .bind(bucket.updated_at)
        .bind(bucket.last_watered)
        .bind(bucket.last_pruned)
}

fn harvested_storage_query<'q>(
    sql: &'q str,
    crop_id: Uuid,
    harvested: &'q HarvestedStorageView,
) -> Query<'q, Postgres, PgArguments> {
    let storage = &harvested.storage;
    sqlx::query(sql)
        .bind(crop_id)
        .bind(storage.source_area_id.as_uuid())
        .bind(&harvested.source_area_name)
        .bind(to_db(storage.quantity))
        .bind(storage.produced_gram_quantity)
        .bind(storage.created_at)
        .bind(storage.updated_at)
}

fn trash_query<'q>(
    sql: &'q str,
    crop_id: Uuid,
    dumped: &'q TrashView,
) -> Query<'q, Postgres, PgArguments> {
    let trash = &dumped.trash;
    sqlx::query(sql)
        .bind(crop_id)
        .bind(trash.source_area_id.as_uuid())
        .bind(&dumped.source_area_name)
        .bind(to_db(trash.quantity))
        .bind(trash.created_at)
        .bind(trash.updated_at)
}

/// Crop read models in the `crop_read` table and its child tables.
///
/// A save is one transaction: checkpoint, row and children commit together.
/// Child rows are written with an UPDATE followed by an INSERT when nothing
/// matched.
#[derive(Clone)]
pub struct PostgresCropReadStore {
    pool: PgPool,
}

impl PostgresCropReadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_crop(row: &PgRow) -> Result<CropRead> {
        let parse = |column: &str, value: String| {
            ProjectionError::Corrupt(format!("{column} `{value}`"))
        };

        let status: String = row.try_get("status")?;
        let crop_type: String = row.try_get("crop_type")?;
        let container_type: String = row.try_get("container_type")?;
        let cell = from_db(row.try_get("container_cell")?, "container_cell")?;
        let kind = ContainerKind::from_code(&container_type, Some(cell))
            .map_err(|_| parse("container_type", container_type.clone()))?;

        Ok(CropRead {
            id: AggregateId::from_uuid(row.try_get("uid")?),
            batch_id: row.try_get("batch_id")?,
            status: status.parse().map_err(|_| parse("status", status.clone()))?,
            crop_type: crop_type
                .parse()
                .map_err(|_| parse("crop_type", crop_type.clone()))?,
            container: Container {
                quantity: from_db(row.try_get("container_quantity")?, "container_quantity")?,
                kind,
            },
            inventory: InventoryView {
                id: common::MaterialId::from_uuid(row.try_get("inventory_uid")?),
                name: row.try_get("inventory_name")?,
                plant_type: row.try_get("inventory_plant_type")?,
            },
            farm_id: FarmId::from_uuid(row.try_get("farm_uid")?),
            initial_area: AreaView {
                name: row.try_get("initial_area_name")?,
                bucket: AreaBucket {
                    area_id: AreaId::from_uuid(row.try_get("initial_area_uid")?),
                    initial_quantity: from_db(row.try_get("initial_quantity")?, "initial_quantity")?,
                    current_quantity: from_db(row.try_get("current_quantity")?, "current_quantity")?,
                    created_at: row.try_get("initial_created_at")?,
                    updated_at: row.try_get("initial_updated_at")?,
                    last_watered: row.try_get("last_watered")?,
                    last_fertilized: row.try_get("last_fertilized")?,
                    last_pesticided: row.try_get("last_pesticided")?,
                    last_pruned: row.try_get("last_pruned")?,
                },
            },
            moved_areas: Vec::new(),
            harvested_storage: Vec::new(),
            trash: Vec::new(),
            notes: Vec::new(),
            photos: Vec::new(),
            area_status: AreaStatus {
                seeding: from_db(row.try_get("area_status_seeding")?, "area_status_seeding")?,
                growing: from_db(row.try_get("area_status_growing")?, "area_status_growing")?,
                dumped: from_db(row.try_get("area_status_dumped")?, "area_status_dumped")?,
            },
        })
    }

    /// Builds the full read model of a `crop_read` row, children included.
    async fn hydrate(&self, row: &PgRow) -> Result<CropRead> {
        let mut crop = Self::row_to_crop(row)?;
        let uid = crop.id.as_uuid();

        for r in sqlx::query(
            "SELECT area_uid, area_name, source_area_uid, initial_quantity, current_quantity, \
             created_at, updated_at, last_watered, last_fertilized, last_pesticided, last_pruned \
             FROM crop_read_moved_area WHERE crop_uid = $1 ORDER BY created_at ASC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?
        {
            crop.moved_areas.push(MovedAreaView {
                source_area_id: AreaId::from_uuid(r.try_get("source_area_uid")?),
                area: AreaView {
                    name: r.try_get("area_name")?,
                    bucket: AreaBucket {
                        area_id: AreaId::from_uuid(r.try_get("area_uid")?),
                        initial_quantity: from_db(r.try_get("initial_quantity")?, "initial_quantity")?,
                        current_quantity: from_db(r.try_get("current_quantity")?, "current_quantity")?,
                        created_at: r.try_get("created_at")?,
                        updated_at: r.try_get("updated_at")?,
                        last_watered: r.try_get("last_watered")?,
                        last_fertilized: r.try_get("last_fertilized")?,
                        last_pesticided: r.try_get("last_pesticided")?,
                        last_pruned: r.try_get("last_pruned")?,
                    },
                },
            });
        }

        for r in sqlx::query(
            "SELECT source_area_uid, source_area_name, quantity, produced_gram_quantity, \
             created_at, updated_at FROM crop_read_harvested_storage \
             WHERE crop_uid = $1 ORDER BY created_at ASC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?
        {
            crop.harvested_storage.push(HarvestedStorageView {
                source_area_name: r.try_get("source_area_name")?,
                storage: HarvestedStorage {
                    source_area_id: AreaId::from_uuid(r.try_get("source_area_uid")?),
                    quantity: from_db(r.try_get("quantity")?, "quantity")?,
                    produced_gram_quantity: r.try_get("produced_gram_quantity")?,
                    created_at: r.try_get("created_at")?,
                    updated_at: r.try_get("updated_at")?,
                },
            });
        }

        for r in sqlx::query(
            "SELECT source_area_uid, source_area_name, quantity, created_at, updated_at \
             FROM crop_read_trash WHERE crop_uid = $1 ORDER BY created_at ASC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?
        {
            crop.trash.push(TrashView {
                source_area_name: r.try_get("source_area_name")?,
                trash: Trash {
                    source_area_id: AreaId::from_uuid(r.try_get("source_area_uid")?),
                    quantity: from_db(r.try_get("quantity")?, "quantity")?,
                    created_at: r.try_get("created_at")?,
                    updated_at: r.try_get("updated_at")?,
                },
            });
        }

        for r in sqlx::query(
            "SELECT uid, content, created_at FROM crop_read_note \
             WHERE crop_uid = $1 ORDER BY created_at DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?
        {
            crop.notes.push(CropNote {
                id: NoteId::from_uuid(r.try_get("uid")?),
                content: r.try_get("content")?,
                created_at: r.try_get("created_at")?,
            });
        }

        for r in sqlx::query(
            "SELECT uid, filename, mime_type, size, width, height, description \
             FROM crop_read_photo WHERE crop_uid = $1 ORDER BY position ASC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?
        {
            let size: i64 = r.try_get("size")?;
            crop.photos.push(CropPhoto {
                id: PhotoId::from_uuid(r.try_get("uid")?),
                filename: r.try_get("filename")?,
                mime_type: r.try_get("mime_type")?,
                size: u64::try_from(size)
                    .map_err(|_| ProjectionError::Corrupt(format!("negative photo size {size}")))?,
                width: from_db(r.try_get("width")?, "width")?,
                height: from_db(r.try_get("height")?, "height")?,
                description: r.try_get("description")?,
            });
        }

        Ok(crop)
    }

    async fn hydrate_all(&self, rows: Vec<PgRow>) -> Result<Vec<CropRead>> {
        let mut crops = Vec::with_capacity(rows.len());
        for row in &rows {
            crops.push(self.hydrate(row).await?);
        }
        Ok(crops)
    }

    async fn write_row(conn: &mut PgConnection, crop: &CropRead) -> Result<()> {
        let uid = crop.id.as_uuid();
        let initial = &crop.initial_area.bucket;

        sqlx::query(UPSERT_CROP)
            .bind(uid)
            .bind(&crop.batch_id)
            .bind(crop.status.code())
            .bind(crop.crop_type.code())
            .bind(crop.container.kind.code())
            .bind(to_db(crop.container.kind.cell().unwrap_or(0)))
            .bind(to_db(crop.container.quantity))
            .bind(crop.inventory.id.as_uuid())
            .bind(&crop.inventory.name)
            .bind(&crop.inventory.plant_type)
            .bind(crop.farm_id.as_uuid())
            .bind(initial.area_id.as_uuid())
            .bind(&crop.initial_area.name)
            .bind(to_db(initial.initial_quantity))
            .bind(to_db(initial.current_quantity))
            .bind(initial.created_at)
            .bind(initial.updated_at)
            .bind(initial.last_watered)
            .bind(initial.last_fertilized)
            .bind(initial.last_pesticided)
            .bind(initial.last_pruned)
            .bind(to_db(crop.area_status.seeding))
            .bind(to_db(crop.area_status.growing))
            .bind(to_db(crop.area_status.dumped))
            .execute(&mut *conn)
            .await?;

        for moved in &crop.moved_areas {
            let updated = moved_area_query(UPDATE_MOVED_AREA, uid, moved)
                .execute(&mut *conn)
                .await?;
            if updated.rows_affected() == 0 {
                moved_area_query(INSERT_MOVED_AREA, uid, moved)
                    .bind(moved.area.bucket.last_fertilized)
                    .bind(moved.area.bucket.last_pesticided)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        for harvested in &crop.harvested_storage {
            let updated = harvested_storage_query(UPDATE_HARVESTED_STORAGE, uid, harvested)
                .execute(&mut *conn)
                .await?;
            if updated.rows_affected() == 0 {
                harvested_storage_query(INSERT_HARVESTED_STORAGE, uid, harvested)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        for dumped in &crop.trash {
            let updated = trash_query(UPDATE_TRASH, uid, dumped)
                .execute(&mut *conn)
                .await?;
            if updated.rows_affected() == 0 {
                trash_query(INSERT_TRASH, uid, dumped)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        sqlx::query("DELETE FROM crop_read_note WHERE crop_uid = $1")
            .bind(uid)
            .execute(&mut *conn)
            .await?;
        for note in &crop.notes {
            sqlx::query(
                "INSERT INTO crop_read_note (uid, crop_uid, content, created_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(note.id.as_uuid())
            .bind(uid)
            .bind(&note.content)
            .bind(note.created_at)
            .execute(&mut *conn)
            .await?;
        }

        for photo in &crop.photos {
            let size = i64::try_from(photo.size)
                .map_err(|_| ProjectionError::Corrupt(format!("photo size {}", photo.size)))?;
            sqlx::query(
                r#"
                INSERT INTO crop_read_photo
                    (uid, crop_uid, filename, mime_type, size, width, height, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (uid) DO NOTHING
                "#,
            )
            .bind(photo.id.as_uuid())
            .bind(uid)
            .bind(&photo.filename)
            .bind(&photo.mime_type)
            .bind(size)
            .bind(to_db(photo.width))
            .bind(to_db(photo.height))
            .bind(&photo.description)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl CropReadStore for PostgresCropReadStore {
    async fn save(&self, crop: &CropRead, checkpoint: Checkpoint) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        if !advance_checkpoint(&mut tx, CropReadProjection::NAME, checkpoint).await? {
            return Ok(false);
        }
        Self::write_row(&mut tx, crop).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn stamp_task(&self, stamp: &TaskStamp, checkpoint: Checkpoint) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        if !advance_checkpoint(&mut tx, CropReadProjection::NAME, checkpoint).await? {
            return Ok(false);
        }

        let initial_area: Option<Uuid> =
            sqlx::query_scalar("SELECT initial_area_uid FROM crop_read WHERE uid = $1 FOR UPDATE")
                .bind(stamp.crop_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(initial_area) = initial_area else {
            return Err(ProjectionError::missing("crop read model", stamp.crop_id));
        };

        let column = match stamp.kind {
            TaskStampKind::Fertilized => "last_fertilized",
            TaskStampKind::Pesticided => "last_pesticided",
        };
        let sql = if initial_area == stamp.area_id.as_uuid() {
            format!("UPDATE crop_read SET {column} = $3 WHERE uid = $1 AND initial_area_uid = $2")
        } else {
            format!(
                "UPDATE crop_read_moved_area SET {column} = $3 \
                 WHERE crop_uid = $1 AND area_uid = $2"
            )
        };
        sqlx::query(&sql)
            .bind(stamp.crop_id.as_uuid())
            .bind(stamp.area_id.as_uuid())
            .bind(stamp.at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        store_checkpoint(&self.pool, CropReadProjection::NAME, checkpoint).await
    }

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        load_checkpoint(&self.pool, CropReadProjection::NAME, aggregate_id).await
    }

    async fn find_by_id(&self, id: AggregateId) -> Result<Option<CropRead>> {
        let row = sqlx::query(&format!("{CROP_COLUMNS} WHERE uid = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_batch_id(&self, batch_id: &str) -> Result<Option<CropRead>> {
        let row = sqlx::query(&format!("{CROP_COLUMNS} WHERE batch_id = $1 LIMIT 1"))
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_all_by_farm(
        &self,
        farm_id: FarmId,
        status: Option<CropStatus>,
        page: Page,
    ) -> Result<Vec<CropRead>> {
        let rows = sqlx::query(&format!(
            "{CROP_COLUMNS} WHERE farm_uid = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY initial_created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(farm_id.as_uuid())
        .bind(status.map(|s| s.code()))
        .bind(page.size() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(rows).await
    }

    async fn count_all_by_farm(&self, farm_id: FarmId, status: Option<CropStatus>) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(uid) FROM crop_read WHERE farm_uid = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(farm_id.as_uuid())
        .bind(status.map(|s| s.code()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count(total))
    }

    async fn find_by_area(&self, area_id: AreaId) -> Result<Vec<CropRead>> {
        let rows = sqlx::query(&format!(
            "{CROP_COLUMNS} WHERE initial_area_uid = $1 \
             OR uid IN (SELECT crop_uid FROM crop_read_moved_area WHERE area_uid = $1) \
             ORDER BY initial_created_at DESC"
        ))
        .bind(area_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(rows).await
    }

    async fn crops_information(&self, farm_id: FarmId) -> Result<CropsInformation> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE((
                    SELECT SUM(h.produced_gram_quantity)
                    FROM crop_read_harvested_storage h
                    JOIN crop_read c ON c.uid = h.crop_uid
                    WHERE c.farm_uid = $1
                ), 0)::DOUBLE PRECISION AS produced,
                (SELECT COUNT(DISTINCT inventory_name) FROM crop_read WHERE farm_uid = $1) AS varieties
            "#,
        )
        .bind(farm_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(CropsInformation {
            total_harvest_produced: row.try_get("produced")?,
            total_plant_variety: count(row.try_get("varieties")?),
        })
    }

    async fn count_total_batch(&self, farm_id: FarmId) -> Result<Vec<BatchCount>> {
        let rows = sqlx::query(
            "SELECT inventory_name, COUNT(uid) AS total FROM crop_read WHERE farm_uid = $1 \
             GROUP BY inventory_name ORDER BY inventory_name ASC",
        )
        .bind(farm_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(BatchCount {
                    variety_name: row.try_get("inventory_name")?,
                    total_batch: count(row.try_get("total")?),
                })
            })
            .collect()
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "TRUNCATE crop_read_note, crop_read_photo, crop_read_moved_area, \
             crop_read_harvested_storage, crop_read_trash, crop_read",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM projection_checkpoint WHERE projection = $1")
            .bind(CropReadProjection::NAME)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl BatchIdQuery for PostgresCropReadStore {
    async fn find_crop_by_batch_id(&self, batch_id: &str) -> LookupResult<AggregateId> {
        let uid: Option<Uuid> =
            sqlx::query_scalar("SELECT uid FROM crop_read WHERE batch_id = $1 LIMIT 1")
                .bind(batch_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| LookupError::Backend(Box::new(e)))?;
        Ok(uid.map(AggregateId::from_uuid))
    }
}

/// Activity timelines in the `crop_activity` table.
#[derive(Clone)]
pub struct PostgresCropActivityStore {
    pool: PgPool,
}

impl PostgresCropActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_activity(row: PgRow) -> Result<CropActivity> {
        let kind: ActivityKind = serde_json::from_value(row.try_get("activity")?)?;
        Ok(CropActivity {
            id: common::ActivityId::from_uuid(row.try_get("uid")?),
            crop_id: AggregateId::from_uuid(row.try_get("crop_uid")?),
            batch_id: row.try_get("batch_id")?,
            container_type: row.try_get("container_type")?,
            created_at: row.try_get("created_at")?,
            description: row.try_get("description")?,
            kind,
        })
    }
}

#[async_trait]
impl CropActivityStore for PostgresCropActivityStore {
    async fn save(&self, activity: &CropActivity, checkpoint: Checkpoint) -> Result<bool> {
        let kind = serde_json::to_value(&activity.kind)?;
        let mut tx = self.pool.begin().await?;
        if !advance_checkpoint(&mut tx, CropActivityProjection::NAME, checkpoint).await? {
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT INTO crop_activity
                (uid, crop_uid, batch_id, container_type, activity_type, activity, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (uid) DO UPDATE SET
                batch_id = EXCLUDED.batch_id,
                container_type = EXCLUDED.container_type,
                activity_type = EXCLUDED.activity_type,
                activity = EXCLUDED.activity,
                description = EXCLUDED.description,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(activity.id.as_uuid())
        .bind(activity.crop_id.as_uuid())
        .bind(&activity.batch_id)
        .bind(&activity.container_type)
        .bind(activity.activity_type().code())
        .bind(kind)
        .bind(&activity.description)
        .bind(activity.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        store_checkpoint(&self.pool, CropActivityProjection::NAME, checkpoint).await
    }

    async fn checkpoint(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        load_checkpoint(&self.pool, CropActivityProjection::NAME, aggregate_id).await
    }

    async fn find_all_by_crop(&self, crop_id: AggregateId) -> Result<Vec<CropActivity>> {
        let rows = sqlx::query(&format!(
            "{ACTIVITY_COLUMNS} WHERE crop_uid = $1 ORDER BY created_at DESC, position DESC"
        ))
        .bind(crop_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_activity).collect()
    }

    async fn find_by_crop_and_type(
        &self,
        crop_id: AggregateId,
        activity_type: ActivityType,
    ) -> Result<Option<CropActivity>> {
        let row = sqlx::query(&format!(
            "{ACTIVITY_COLUMNS} WHERE crop_uid = $1 AND activity_type = $2 \
             ORDER BY created_at DESC, position DESC LIMIT 1"
        ))
        .bind(crop_id.as_uuid())
        .bind(activity_type.code())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_activity).transpose()
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("TRUNCATE crop_activity").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM projection_checkpoint WHERE projection = $1")
            .bind(CropActivityProjection::NAME)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
