//! Track save and unlink endpoints
//!
//! Saving runs the full reconciliation: the reviewed metadata is written
//! into the catalog (composer, work, movement, recording, link) and the
//! match queue entry, if any, is marked matched. Unlinking removes a
//! track's movement links and drops its queue entry so a later
//! liked-songs refresh can enqueue it again.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use opus_common::events::OpusEvent;
use opus_common::Error;
use serde::Serialize;
use tracing::info;

use crate::api::auth::AuthedUser;
use crate::db::{match_queue, track_movements};
use crate::error::ApiError;
use crate::services::reconcile::{save_track_with_metadata, SaveOutcome, SaveTrackRequest};
use crate::AppState;

/// POST /api/admin/tracks/save
///
/// Writes one reviewed track into the catalog. Saving the same request
/// twice changes nothing.
pub async fn save_track(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Json(request): Json<SaveTrackRequest>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let outcome = save_track_with_metadata(&state.db, &request).await?;

    // The track may have arrived outside the queue (direct album save)
    match match_queue::mark_status(&state.db, &request.track.id, match_queue::MatchStatus::Matched)
        .await
    {
        Ok(()) => {
            state.event_bus.emit_lossy(OpusEvent::MatchQueueChanged {
                pending: match_queue::count_pending(&state.db).await?,
                timestamp: chrono::Utc::now(),
            });
        }
        Err(Error::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    info!(
        track_id = %request.track.id,
        admin = %authed.user.spotify_user_id,
        work = %outcome.work.title,
        movement = outcome.movement.number,
        "Track saved to catalog"
    );

    state.event_bus.emit_lossy(OpusEvent::TrackClassified {
        track_id: request.track.id.clone(),
        work_id: outcome.work.guid.to_string(),
        movement_id: outcome.movement.guid.to_string(),
        timestamp: chrono::Utc::now(),
    });

    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct UnlinkResponse {
    pub track_id: String,
    pub removed_links: u64,
}

/// DELETE /api/admin/tracks/:id/movements
///
/// Removes every movement link for the track. Catalog rows (works,
/// movements, recordings) stay in place; only the association goes away.
pub async fn unlink_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> Result<Json<UnlinkResponse>, ApiError> {
    let removed = track_movements::unlink_track(&state.db, &track_id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound(format!(
            "no movement links for track {}",
            track_id
        )));
    }

    // Drop the queue entry so the next liked refresh can re-enqueue
    if match_queue::remove_entry(&state.db, &track_id).await? {
        state.event_bus.emit_lossy(OpusEvent::MatchQueueChanged {
            pending: match_queue::count_pending(&state.db).await?,
            timestamp: chrono::Utc::now(),
        });
    }

    info!(track_id = %track_id, removed, "Track unlinked from catalog");

    Ok(Json(UnlinkResponse {
        track_id,
        removed_links: removed,
    }))
}
