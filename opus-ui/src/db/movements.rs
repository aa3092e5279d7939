//! Movement database operations
//!
//! Movements are identified by (work_id, number); the upsert targets that
//! unique pair so re-saving the same movement updates its title instead of
//! duplicating it.

use opus_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Movement record (one numbered section of a work)
#[derive(Debug, Clone, serde::Serialize)]
pub struct Movement {
    /// Unique identifier (UUID)
    pub guid: Uuid,
    pub work_id: Uuid,
    /// 1-based position within the work, unique per work
    pub number: i64,
    /// Movement title ("Allegro", "II. Adagio")
    pub title: Option<String>,
}

impl Movement {
    /// Create new movement with a fresh guid
    pub fn new(work_id: Uuid, number: i64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            work_id,
            number,
            title: None,
        }
    }
}

/// Upsert movement by (work_id, number)
///
/// Creates the movement if absent, else updates its title. Returns the
/// stored row, whose guid is the original one on the update path.
pub async fn upsert_movement(pool: &SqlitePool, movement: &Movement) -> Result<Movement> {
    sqlx::query(
        r#"
        INSERT INTO movements (guid, work_id, number, title, created_at, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(work_id, number) DO UPDATE SET
            title = excluded.title,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(movement.guid.to_string())
    .bind(movement.work_id.to_string())
    .bind(movement.number)
    .bind(&movement.title)
    .execute(pool)
    .await?;

    load_movement_by_number(pool, movement.work_id, movement.number)
        .await?
        .ok_or_else(|| Error::Internal("movement upsert produced no row".to_string()))
}

fn movement_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Movement> {
    let guid_str: String = row.get("guid");
    let work_str: String = row.get("work_id");
    Ok(Movement {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("bad movement guid: {}", e)))?,
        work_id: Uuid::parse_str(&work_str)
            .map_err(|e| Error::Internal(format!("bad work guid: {}", e)))?,
        number: row.get("number"),
        title: row.get("title"),
    })
}

/// Load movement by guid
pub async fn load_movement(pool: &SqlitePool, guid: Uuid) -> Result<Option<Movement>> {
    let row = sqlx::query("SELECT guid, work_id, number, title FROM movements WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(movement_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Load movement by its (work_id, number) identity key
pub async fn load_movement_by_number(
    pool: &SqlitePool,
    work_id: Uuid,
    number: i64,
) -> Result<Option<Movement>> {
    let row = sqlx::query(
        "SELECT guid, work_id, number, title FROM movements WHERE work_id = ? AND number = ?",
    )
    .bind(work_id.to_string())
    .bind(number)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(movement_from_row(&row)?)),
        None => Ok(None),
    }
}

/// List movements for one work in number order
pub async fn list_movements_for_work(pool: &SqlitePool, work_id: Uuid) -> Result<Vec<Movement>> {
    let rows = sqlx::query(
        "SELECT guid, work_id, number, title FROM movements WHERE work_id = ? ORDER BY number",
    )
    .bind(work_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(movement_from_row).collect()
}

/// Update a movement's title in place
///
/// Renumbering is not supported; the number is the movement's identity
/// within its work.
pub async fn rename_movement(
    pool: &SqlitePool,
    movement_id: Uuid,
    title: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE movements SET title = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(title)
    .bind(movement_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("movement {}", movement_id)));
    }

    Ok(())
}

/// Number of track links pointing at this movement
pub async fn count_track_links(pool: &SqlitePool, movement_id: Uuid) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM track_movements WHERE movement_id = ?")
        .bind(movement_id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(row.get("n"))
}

/// Delete a movement, refusing while tracks are linked to it
///
/// The guard keeps the catalog consistent: unlink the tracks first, then
/// delete. On refusal the row remains untouched.
pub async fn delete_movement(pool: &SqlitePool, movement_id: Uuid) -> Result<()> {
    let links = count_track_links(pool, movement_id).await?;
    if links > 0 {
        return Err(Error::Conflict(format!(
            "tracks are linked to this movement ({} link{})",
            links,
            if links == 1 { "" } else { "s" }
        )));
    }

    let result = sqlx::query("DELETE FROM movements WHERE guid = ?")
        .bind(movement_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("movement {}", movement_id)));
    }

    Ok(())
}
