//! Match queue database operations
//!
//! A worklist of Spotify track ids awaiting classification. Tracks are
//! enqueued once (deduplicated on track id), paged out in fixed-size pages
//! ordered by submission time, and marked matched/failed after processing.
//! No priority, no retry count, no expiry.

use opus_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Fixed review page size
pub const PAGE_SIZE: i64 = 20;

/// Processing state of one queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Matched,
    Failed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Matched => "matched",
            MatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "matched" => Ok(MatchStatus::Matched),
            "failed" => Ok(MatchStatus::Failed),
            other => Err(Error::InvalidInput(format!("unknown match status: {}", other))),
        }
    }
}

/// One queued track
#[derive(Debug, Clone, Serialize)]
pub struct MatchQueueEntry {
    pub guid: Uuid,
    pub track_id: String,
    pub status: MatchStatus,
    /// Spotify user id of the submitter, when known
    pub submitted_by: Option<String>,
    /// ISO 8601 timestamp
    pub submitted_at: String,
    pub processed_at: Option<String>,
}

/// Enqueue a track for classification
///
/// Deduplicated against already-queued ids: returns true when the track
/// was newly enqueued, false when it was already present (any status).
pub async fn enqueue_track(
    pool: &SqlitePool,
    track_id: &str,
    submitted_by: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO match_queue (guid, track_id, status, submitted_by, submitted_at)
        VALUES (?, ?, 'pending', ?, CURRENT_TIMESTAMP)
        ON CONFLICT(track_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(track_id)
    .bind(submitted_by)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MatchQueueEntry> {
    let guid_str: String = row.get("guid");
    let status_str: String = row.get("status");
    Ok(MatchQueueEntry {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("bad queue guid: {}", e)))?,
        track_id: row.get("track_id"),
        status: MatchStatus::parse(&status_str)?,
        submitted_by: row.get("submitted_by"),
        submitted_at: row.get("submitted_at"),
        processed_at: row.get("processed_at"),
    })
}

/// One page of pending entries, oldest submissions first
///
/// `page` is 0-based; every page holds [`PAGE_SIZE`] entries.
pub async fn load_pending_page(pool: &SqlitePool, page: i64) -> Result<Vec<MatchQueueEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, track_id, status, submitted_by, submitted_at, processed_at
        FROM match_queue
        WHERE status = 'pending'
        ORDER BY submitted_at, rowid
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(PAGE_SIZE)
    .bind(page.max(0) * PAGE_SIZE)
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Number of entries still pending
pub async fn count_pending(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM match_queue WHERE status = 'pending'")
        .fetch_one(pool)
        .await?;

    Ok(row.get("n"))
}

/// Load one entry by track id
pub async fn load_entry(pool: &SqlitePool, track_id: &str) -> Result<Option<MatchQueueEntry>> {
    let row = sqlx::query(
        r#"
        SELECT guid, track_id, status, submitted_by, submitted_at, processed_at
        FROM match_queue
        WHERE track_id = ?
        "#,
    )
    .bind(track_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(entry_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Remove an entry entirely
///
/// Used when a track's movement links are removed: a later liked-songs
/// refresh may then enqueue the track again.
pub async fn remove_entry(pool: &SqlitePool, track_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM match_queue WHERE track_id = ?")
        .bind(track_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark an entry matched or failed (stamps processed_at)
pub async fn mark_status(pool: &SqlitePool, track_id: &str, status: MatchStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE match_queue
        SET status = ?, processed_at = CURRENT_TIMESTAMP
        WHERE track_id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(track_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("match queue entry for track {}", track_id)));
    }

    Ok(())
}
