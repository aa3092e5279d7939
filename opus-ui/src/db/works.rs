//! Work database operations
//!
//! A work's identity key is (composer_id, catalog_system, catalog_number)
//! when a catalog number is known, else (composer_id, title). Lookups here
//! implement that precedence; the reconciliation service decides between
//! update and insert.

use opus_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Work record (one musical composition)
#[derive(Debug, Clone, serde::Serialize)]
pub struct Work {
    /// Unique identifier (UUID)
    pub guid: Uuid,
    /// Owning composer
    pub composer_id: Uuid,
    /// Formal title ("Harpsichord Concerto No. 1 in D minor")
    pub title: String,
    /// Informal name ("Moonlight")
    pub nickname: Option<String>,
    /// Catalog scheme ("BWV", "Op", "K")
    pub catalog_system: Option<String>,
    /// Index within the catalog scheme ("1052")
    pub catalog_number: Option<String>,
    pub year_composed: Option<i64>,
    /// Musical form ("concerto", "sonata")
    pub form: Option<String>,
}

impl Work {
    /// Create new work with a fresh guid
    pub fn new(composer_id: Uuid, title: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            composer_id,
            title,
            nickname: None,
            catalog_system: None,
            catalog_number: None,
            year_composed: None,
            form: None,
        }
    }
}

/// Save work to database (insert or update by guid)
///
/// Mutable fields (title, nickname, catalog info, year, form) take the
/// latest call's values.
pub async fn save_work(pool: &SqlitePool, work: &Work) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO works (
            guid, composer_id, title, nickname, catalog_system, catalog_number,
            year_composed, form, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(guid) DO UPDATE SET
            title = excluded.title,
            nickname = excluded.nickname,
            catalog_system = excluded.catalog_system,
            catalog_number = excluded.catalog_number,
            year_composed = excluded.year_composed,
            form = excluded.form,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(work.guid.to_string())
    .bind(work.composer_id.to_string())
    .bind(&work.title)
    .bind(&work.nickname)
    .bind(&work.catalog_system)
    .bind(&work.catalog_number)
    .bind(work.year_composed)
    .bind(&work.form)
    .execute(pool)
    .await?;

    Ok(())
}

fn work_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Work> {
    let guid_str: String = row.get("guid");
    let composer_str: String = row.get("composer_id");
    Ok(Work {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| opus_common::Error::Internal(format!("bad work guid: {}", e)))?,
        composer_id: Uuid::parse_str(&composer_str)
            .map_err(|e| opus_common::Error::Internal(format!("bad composer guid: {}", e)))?,
        title: row.get("title"),
        nickname: row.get("nickname"),
        catalog_system: row.get("catalog_system"),
        catalog_number: row.get("catalog_number"),
        year_composed: row.get("year_composed"),
        form: row.get("form"),
    })
}

const WORK_COLUMNS: &str = "guid, composer_id, title, nickname, catalog_system, \
                            catalog_number, year_composed, form";

/// Load work by guid
pub async fn load_work(pool: &SqlitePool, guid: Uuid) -> Result<Option<Work>> {
    let row = sqlx::query(&format!("SELECT {} FROM works WHERE guid = ?", WORK_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(work_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Find work by its catalog identity key
///
/// Title differences do not matter here: the catalog pair takes precedence
/// over title for identity. `IS ?` so a missing catalog system still
/// matches rows where it is NULL.
pub async fn find_work_by_catalog(
    pool: &SqlitePool,
    composer_id: Uuid,
    catalog_system: Option<&str>,
    catalog_number: &str,
) -> Result<Option<Work>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM works \
         WHERE composer_id = ? AND catalog_system IS ? AND catalog_number = ?",
        WORK_COLUMNS
    ))
    .bind(composer_id.to_string())
    .bind(catalog_system)
    .bind(catalog_number)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(work_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Find work by title (fallback identity when no catalog number is known)
pub async fn find_work_by_title(
    pool: &SqlitePool,
    composer_id: Uuid,
    title: &str,
) -> Result<Option<Work>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM works WHERE composer_id = ? AND title = ?",
        WORK_COLUMNS
    ))
    .bind(composer_id.to_string())
    .bind(title)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(work_from_row(&row)?)),
        None => Ok(None),
    }
}

/// True when any composer has a work with this catalog pair
///
/// Used by the batch existence probe, which matches on catalog system +
/// number only.
pub async fn catalog_pair_exists(
    pool: &SqlitePool,
    catalog_system: &str,
    catalog_number: &str,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT 1 FROM works WHERE catalog_system = ? AND catalog_number = ? LIMIT 1",
    )
    .bind(catalog_system)
    .bind(catalog_number)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// List works for one composer, catalog order then title
pub async fn list_works_by_composer(pool: &SqlitePool, composer_id: Uuid) -> Result<Vec<Work>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM works WHERE composer_id = ? \
         ORDER BY catalog_system, CAST(catalog_number AS INTEGER), title",
        WORK_COLUMNS
    ))
    .bind(composer_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(work_from_row).collect()
}

/// List all works (admin work management table)
pub async fn list_works(pool: &SqlitePool) -> Result<Vec<Work>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM works ORDER BY composer_id, catalog_system, \
         CAST(catalog_number AS INTEGER), title",
        WORK_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(work_from_row).collect()
}
