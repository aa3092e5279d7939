//! Match queue review endpoints
//!
//! The queue pages out pending tracks for admin review, 20 at a time in
//! submission order. Track display details come from the reviewer's
//! liked-songs cache when present, else from the local mirror rows;
//! entries whose track is in neither still list the bare id.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use opus_common::events::OpusEvent;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::auth::AuthedUser;
use crate::db::match_queue::{self, MatchQueueEntry, MatchStatus, PAGE_SIZE};
use crate::db::tracks;
use crate::error::ApiError;
use crate::AppState;

/// Display details for a queued track
#[derive(Debug, Serialize)]
pub struct QueueTrackView {
    pub name: String,
    pub album_name: Option<String>,
    pub album_id: Option<String>,
    pub album_image_url: Option<String>,
    pub artists: Vec<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueEntryView {
    #[serde(flatten)]
    pub entry: MatchQueueEntry,
    pub track: Option<QueueTrackView>,
}

#[derive(Debug, Serialize)]
pub struct QueuePageResponse {
    pub entries: Vec<QueueEntryView>,
    pub page: i64,
    pub page_size: i64,
    pub pending_total: i64,
}

#[derive(Debug, Deserialize)]
pub struct QueuePageQuery {
    #[serde(default)]
    pub page: i64,
}

/// GET /api/admin/queue?page=N
///
/// One page of pending entries, oldest first.
pub async fn get_queue_page(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Query(query): Query<QueuePageQuery>,
) -> Result<Json<QueuePageResponse>, ApiError> {
    let page = query.page.max(0);
    let entries = match_queue::load_pending_page(&state.db, page).await?;
    let pending_total = match_queue::count_pending(&state.db).await?;

    let mut views = Vec::with_capacity(entries.len());
    for entry in entries {
        let track = queue_track_view(&state, &authed, &entry.track_id).await?;
        views.push(QueueEntryView { entry, track });
    }
    backfill_from_spotify(&state, &authed, &mut views).await;

    Ok(Json(QueuePageResponse {
        entries: views,
        page,
        page_size: PAGE_SIZE,
        pending_total,
    }))
}

/// Fills display details for entries found in neither the reviewer's
/// cache nor the local mirror with one batch track lookup. A lookup
/// failure leaves those entries listing the bare id; the queue itself is
/// served from the database.
async fn backfill_from_spotify(
    state: &AppState,
    authed: &AuthedUser,
    views: &mut [QueueEntryView],
) {
    let missing: Vec<String> = views
        .iter()
        .filter(|view| view.track.is_none())
        .map(|view| view.entry.track_id.clone())
        .collect();
    if missing.is_empty() {
        return;
    }

    let fetched = match state.spotify.get_tracks(&authed.access_token, &missing).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!("Could not fetch queue track details: {}", e);
            return;
        }
    };

    for track in fetched {
        let Some(track_id) = track.id.clone() else {
            continue;
        };
        let Some(view) = views.iter_mut().find(|v| v.entry.track_id == track_id) else {
            continue;
        };
        view.track = Some(QueueTrackView {
            name: track.name,
            album_name: track.album.as_ref().map(|a| a.name.clone()),
            album_id: track.album.as_ref().and_then(|a| a.id.clone()),
            album_image_url: track.album.as_ref().and_then(|a| a.image_url()),
            artists: track.artists.iter().map(|a| a.name.clone()).collect(),
            duration_ms: track.duration_ms,
        });
    }
}

async fn queue_track_view(
    state: &AppState,
    authed: &AuthedUser,
    track_id: &str,
) -> Result<Option<QueueTrackView>, ApiError> {
    if let Some(liked) = state.liked_cache.get_track(&authed.user.guid, track_id) {
        return Ok(Some(QueueTrackView {
            name: liked.name,
            album_name: liked.album_name,
            album_id: liked.album_id,
            album_image_url: liked.album_image_url,
            artists: liked.artists.into_iter().map(|a| a.name).collect(),
            duration_ms: liked.duration_ms,
        }));
    }

    let Some(track) = tracks::load_track(&state.db, track_id).await? else {
        return Ok(None);
    };
    let album = match &track.album_id {
        Some(album_id) => tracks::load_album(&state.db, album_id).await?,
        None => None,
    };
    let artists = tracks::list_artists_for_track(&state.db, track_id).await?;

    Ok(Some(QueueTrackView {
        name: track.name,
        album_name: album.as_ref().map(|a| a.name.clone()),
        album_id: track.album_id,
        album_image_url: album.and_then(|a| a.image_url),
        artists: artists.into_iter().map(|a| a.name).collect(),
        duration_ms: track.duration_ms,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
    pub track_id: String,
}

/// POST /api/admin/queue
///
/// Manually enqueues a track for review. A track already queued (any
/// status) is left alone.
pub async fn enqueue(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Json(body): Json<EnqueueBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.track_id.trim().is_empty() {
        return Err(ApiError::BadRequest("track_id is required".to_string()));
    }

    let added =
        match_queue::enqueue_track(&state.db, &body.track_id, Some(&authed.user.guid)).await?;
    if added {
        state.event_bus.emit_lossy(OpusEvent::MatchQueueChanged {
            pending: match_queue::count_pending(&state.db).await?,
            timestamp: chrono::Utc::now(),
        });
    }

    Ok(Json(serde_json::json!({ "enqueued": added })))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: MatchStatus,
}

/// POST /api/admin/queue/:track_id/status
///
/// Marks an entry matched or failed and returns the updated entry.
/// Saving a track marks it matched automatically; this endpoint is for
/// manual resolution, usually "failed" for tracks the model cannot
/// place.
pub async fn set_status(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<MatchQueueEntry>, ApiError> {
    if body.status == MatchStatus::Pending {
        return Err(ApiError::BadRequest(
            "entries cannot be marked pending again".to_string(),
        ));
    }

    match_queue::mark_status(&state.db, &track_id, body.status).await?;
    let entry = match_queue::load_entry(&state.db, &track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("match queue entry for track {}", track_id)))?;
    info!(track_id = %track_id, status = body.status.as_str(), "Queue entry resolved");

    state.event_bus.emit_lossy(OpusEvent::MatchQueueChanged {
        pending: match_queue::count_pending(&state.db).await?,
        timestamp: chrono::Utc::now(),
    });

    Ok(Json(entry))
}
