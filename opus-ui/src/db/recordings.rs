//! Recording database operations
//!
//! A recording pairs one Spotify album with one work ("this album contains
//! a performance of this work"). Creation is first-write-wins; popularity
//! is a placeholder column nothing computes yet.

use opus_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Recording record
#[derive(Debug, Clone, serde::Serialize)]
pub struct Recording {
    /// Unique identifier (UUID)
    pub guid: Uuid,
    pub spotify_album_id: String,
    pub work_id: Uuid,
    pub popularity: Option<i64>,
}

impl Recording {
    /// Create new recording with a fresh guid
    pub fn new(spotify_album_id: String, work_id: Uuid) -> Self {
        Self {
            guid: Uuid::new_v4(),
            spotify_album_id,
            work_id,
            popularity: None,
        }
    }
}

/// Insert recording if the (album, work) pair is new; first write wins
///
/// Returns the stored row either way.
pub async fn ensure_recording(pool: &SqlitePool, recording: &Recording) -> Result<Recording> {
    sqlx::query(
        r#"
        INSERT INTO recordings (guid, spotify_album_id, work_id, created_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(spotify_album_id, work_id) DO NOTHING
        "#,
    )
    .bind(recording.guid.to_string())
    .bind(&recording.spotify_album_id)
    .bind(recording.work_id.to_string())
    .execute(pool)
    .await?;

    load_recording_by_pair(pool, &recording.spotify_album_id, recording.work_id)
        .await?
        .ok_or_else(|| Error::Internal("recording insert produced no row".to_string()))
}

fn recording_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Recording> {
    let guid_str: String = row.get("guid");
    let work_str: String = row.get("work_id");
    Ok(Recording {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("bad recording guid: {}", e)))?,
        spotify_album_id: row.get("spotify_album_id"),
        work_id: Uuid::parse_str(&work_str)
            .map_err(|e| Error::Internal(format!("bad work guid: {}", e)))?,
        popularity: row.get("popularity"),
    })
}

/// Load recording by its (album, work) identity key
pub async fn load_recording_by_pair(
    pool: &SqlitePool,
    spotify_album_id: &str,
    work_id: Uuid,
) -> Result<Option<Recording>> {
    let row = sqlx::query(
        r#"
        SELECT guid, spotify_album_id, work_id, popularity
        FROM recordings
        WHERE spotify_album_id = ? AND work_id = ?
        "#,
    )
    .bind(spotify_album_id)
    .bind(work_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(recording_from_row(&row)?)),
        None => Ok(None),
    }
}

/// List recordings of one work
pub async fn list_recordings_for_work(pool: &SqlitePool, work_id: Uuid) -> Result<Vec<Recording>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, spotify_album_id, work_id, popularity
        FROM recordings
        WHERE work_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(work_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(recording_from_row).collect()
}
