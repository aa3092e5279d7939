//! Liked songs listing
//!
//! Serves the signed-in user's Spotify liked songs, annotated with any
//! classical classification already in the catalog. The Spotify library
//! walk is expensive (one request per 50 tracks), so results are held in
//! an in-memory cache for an hour; the refresh endpoint bypasses it.
//! Unclassified tracks are enqueued for matching whenever a fresh list
//! is fetched.

use axum::{extract::State, response::Json, Extension};
use opus_common::events::OpusEvent;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::api::auth::AuthedUser;
use crate::db::{match_queue, settings, track_movements};
use crate::error::ApiError;
use crate::services::liked_cache::LikedTrack;
use crate::AppState;

/// One liked track with its classification, if any
#[derive(Debug, Serialize)]
pub struct LikedTrackView {
    #[serde(flatten)]
    pub track: LikedTrack,
    pub classification: Option<ClassificationView>,
}

/// Catalog placement of a classified track
#[derive(Debug, Serialize)]
pub struct ClassificationView {
    pub movement_id: String,
    pub movement_number: i64,
    pub movement_title: Option<String>,
    pub work_id: String,
    pub work_title: String,
    pub catalog_system: Option<String>,
    pub catalog_number: Option<String>,
    pub composer_id: String,
    pub composer_name: String,
}

#[derive(Debug, Serialize)]
pub struct LikedSongsResponse {
    pub tracks: Vec<LikedTrackView>,
    pub total: usize,
    pub classified: usize,
    pub from_cache: bool,
    pub fetched_at: Option<String>,
}

/// GET /api/liked
///
/// Returns the cached list when it is under an hour old, otherwise
/// walks the Spotify library.
pub async fn get_liked_songs(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
) -> Result<Json<LikedSongsResponse>, ApiError> {
    let response = load_liked_songs(&state, &authed, false).await?;
    Ok(Json(response))
}

/// POST /api/liked/refresh
///
/// Drops the cached list and refetches from Spotify.
pub async fn refresh_liked_songs(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
) -> Result<Json<LikedSongsResponse>, ApiError> {
    state.liked_cache.invalidate(&authed.user.guid);
    let response = load_liked_songs(&state, &authed, true).await?;
    Ok(Json(response))
}

async fn load_liked_songs(
    state: &AppState,
    authed: &AuthedUser,
    forced: bool,
) -> Result<LikedSongsResponse, ApiError> {
    let cached = state.liked_cache.get_fresh(&authed.user.guid);
    let from_cache = cached.is_some();

    let tracks = match cached {
        Some(tracks) => {
            debug!(user_id = %authed.user.guid, count = tracks.len(), "Serving liked songs from cache");
            tracks
        }
        None => {
            let saved = state
                .spotify
                .fetch_all_saved_tracks(&authed.access_token)
                .await?;
            let tracks: Vec<LikedTrack> = saved.into_iter().map(LikedTrack::from).collect();
            info!(
                user_id = %authed.user.guid,
                count = tracks.len(),
                forced,
                "Fetched liked songs from Spotify"
            );

            state.liked_cache.store(&authed.user.guid, tracks.clone());
            settings::set_liked_refreshed_at(&state.db, &chrono::Utc::now().to_rfc3339()).await?;
            state.event_bus.emit_lossy(OpusEvent::LikedSongsRefreshed {
                count: tracks.len(),
                timestamp: chrono::Utc::now(),
            });
            tracks
        }
    };

    let ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
    let classifications: HashMap<String, _> = track_movements::load_classifications(&state.db, &ids)
        .await?
        .into_iter()
        .map(|c| (c.track_id.clone(), c))
        .collect();

    // Anything still unclassified becomes a match backlog entry exactly
    // once; re-listing a track already in the queue is a no-op.
    if !from_cache {
        let mut enqueued = 0;
        for track in &tracks {
            if !classifications.contains_key(&track.id)
                && match_queue::enqueue_track(&state.db, &track.id, Some(&authed.user.guid)).await?
            {
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            debug!(enqueued, "Queued unclassified tracks for matching");
            state.event_bus.emit_lossy(OpusEvent::MatchQueueChanged {
                pending: match_queue::count_pending(&state.db).await?,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    let classified = classifications.len();
    let total = tracks.len();
    let fetched_at = state
        .liked_cache
        .fetched_at(&authed.user.guid)
        .map(|t| t.to_rfc3339());

    let views = tracks
        .into_iter()
        .map(|track| {
            let classification = classifications.get(&track.id).map(|c| ClassificationView {
                movement_id: c.movement_id.to_string(),
                movement_number: c.movement_number,
                movement_title: c.movement_title.clone(),
                work_id: c.work_id.to_string(),
                work_title: c.work_title.clone(),
                catalog_system: c.catalog_system.clone(),
                catalog_number: c.catalog_number.clone(),
                composer_id: c.composer_id.to_string(),
                composer_name: c.composer_name.clone(),
            });
            LikedTrackView {
                track,
                classification,
            }
        })
        .collect();

    Ok(LikedSongsResponse {
        tracks: views,
        total,
        classified,
        from_cache,
        fetched_at,
    })
}
