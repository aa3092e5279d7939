//! Track-to-movement link operations
//!
//! A track_movements row is the "is classified" marker: a Spotify track
//! with no row here has not been placed in the catalog yet. The pair
//! (track_id, movement_id) is unique, and linking is insert-or-ignore so
//! re-running a save cannot duplicate links.

use opus_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Track-to-movement link
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackMovement {
    /// Unique identifier (UUID)
    pub guid: Uuid,
    pub track_id: String,
    pub movement_id: Uuid,
    /// Offset where the movement starts inside a compilation track
    pub start_ms: Option<i64>,
    /// Offset where the movement ends inside a compilation track
    pub end_ms: Option<i64>,
}

impl TrackMovement {
    /// Create new link with a fresh guid
    pub fn new(track_id: String, movement_id: Uuid) -> Self {
        Self {
            guid: Uuid::new_v4(),
            track_id,
            movement_id,
            start_ms: None,
            end_ms: None,
        }
    }
}

/// Insert the link, ignoring the write if it already exists (idempotent)
pub async fn link_track_to_movement(pool: &SqlitePool, link: &TrackMovement) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO track_movements (guid, track_id, movement_id, start_ms, end_ms, created_at)
        VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(track_id, movement_id) DO NOTHING
        "#,
    )
    .bind(link.guid.to_string())
    .bind(&link.track_id)
    .bind(link.movement_id.to_string())
    .bind(link.start_ms)
    .bind(link.end_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove all movement links for a track
///
/// Leaves the work/movement/recording rows untouched; the track becomes
/// eligible for re-analysis. Returns the number of links removed.
pub async fn unlink_track(pool: &SqlitePool, track_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM track_movements WHERE track_id = ?")
        .bind(track_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Links for one track (usually zero or one)
pub async fn load_links_for_track(
    pool: &SqlitePool,
    track_id: &str,
) -> Result<Vec<TrackMovement>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, track_id, movement_id, start_ms, end_ms
        FROM track_movements
        WHERE track_id = ?
        "#,
    )
    .bind(track_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let guid_str: String = row.get("guid");
            let movement_str: String = row.get("movement_id");
            Ok(TrackMovement {
                guid: Uuid::parse_str(&guid_str).map_err(|e| {
                    opus_common::Error::Internal(format!("bad link guid: {}", e))
                })?,
                track_id: row.get("track_id"),
                movement_id: Uuid::parse_str(&movement_str).map_err(|e| {
                    opus_common::Error::Internal(format!("bad movement guid: {}", e))
                })?,
                start_ms: row.get("start_ms"),
                end_ms: row.get("end_ms"),
            })
        })
        .collect()
}

/// Next free movement number for a work on one album
///
/// Movement numbers are derived from position among the album's tracks
/// already linked into this work: the first linked track got 1, so the
/// next is max + 1.
pub async fn next_movement_number(
    pool: &SqlitePool,
    work_id: Uuid,
    album_id: &str,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(m.number), 0) AS max_number
        FROM movements m
        JOIN track_movements tm ON tm.movement_id = m.guid
        JOIN spotify_tracks t ON t.id = tm.track_id
        WHERE m.work_id = ? AND t.album_id = ?
        "#,
    )
    .bind(work_id.to_string())
    .bind(album_id)
    .fetch_one(pool)
    .await?;

    let max_number: i64 = row.get("max_number");
    Ok(max_number + 1)
}

/// Catalog placement of one classified track, for listing views
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackClassification {
    pub track_id: String,
    pub movement_id: Uuid,
    pub movement_number: i64,
    pub movement_title: Option<String>,
    pub work_id: Uuid,
    pub work_title: String,
    pub catalog_system: Option<String>,
    pub catalog_number: Option<String>,
    pub composer_id: Uuid,
    pub composer_name: String,
}

/// Classifications for a batch of track ids
///
/// Tracks without a link are simply absent from the result.
pub async fn load_classifications(
    pool: &SqlitePool,
    track_ids: &[String],
) -> Result<Vec<TrackClassification>> {
    if track_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; track_ids.len()].join(", ");
    let sql = format!(
        r#"
        SELECT tm.track_id, m.guid AS movement_id, m.number AS movement_number,
               m.title AS movement_title, w.guid AS work_id, w.title AS work_title,
               w.catalog_system, w.catalog_number,
               c.guid AS composer_id, c.name AS composer_name
        FROM track_movements tm
        JOIN movements m ON m.guid = tm.movement_id
        JOIN works w ON w.guid = m.work_id
        JOIN composers c ON c.guid = w.composer_id
        WHERE tm.track_id IN ({})
        "#,
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for id in track_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            let movement_str: String = row.get("movement_id");
            let work_str: String = row.get("work_id");
            let composer_str: String = row.get("composer_id");
            let parse = |s: &str| {
                Uuid::parse_str(s)
                    .map_err(|e| opus_common::Error::Internal(format!("bad guid: {}", e)))
            };
            Ok(TrackClassification {
                track_id: row.get("track_id"),
                movement_id: parse(&movement_str)?,
                movement_number: row.get("movement_number"),
                movement_title: row.get("movement_title"),
                work_id: parse(&work_str)?,
                work_title: row.get("work_title"),
                catalog_system: row.get("catalog_system"),
                catalog_number: row.get("catalog_number"),
                composer_id: parse(&composer_str)?,
                composer_name: row.get("composer_name"),
            })
        })
        .collect()
}
