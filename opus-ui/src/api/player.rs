//! Playback state reporting, SSE fan-out and seek relay
//!
//! The browser page hosting the Web Playback SDK reports state changes
//! here; the server holds one snapshot per user and rebroadcasts changes
//! over SSE so every connected page can project playback progress from
//! its own animation loop. Seeks are relayed to the Spotify player API
//! rather than handled locally.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    response::Json,
    Extension,
};
use futures::stream::{Stream, StreamExt};
use opus_common::events::OpusEvent;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::api::auth::AuthedUser;
use crate::error::ApiError;
use crate::AppState;

/// State report from the Web Playback SDK page
#[derive(Debug, Deserialize)]
pub struct PlayerStateBody {
    pub track_id: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub paused: bool,
}

/// Snapshot returned to pages, position already projected to "now"
#[derive(Debug, Serialize)]
pub struct PlayerStateView {
    pub track_id: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub paused: bool,
    pub updated_at: String,
}

/// POST /api/player/state
///
/// Records a playback snapshot for the signed-in user and broadcasts it.
pub async fn report_state(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Json(body): Json<PlayerStateBody>,
) -> Json<PlayerStateView> {
    let snapshot = state.player.update(
        &authed.user.guid,
        body.track_id,
        body.position_ms,
        body.duration_ms,
        body.paused,
    );

    Json(PlayerStateView {
        position_ms: snapshot.position_ms,
        track_id: snapshot.track_id,
        duration_ms: snapshot.duration_ms,
        paused: snapshot.paused,
        updated_at: snapshot.updated_at.to_rfc3339(),
    })
}

/// GET /api/player/state
///
/// Latest snapshot with the position projected forward for elapsed wall
/// time. Pages call this once on load, then follow the SSE stream.
pub async fn get_state(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
) -> Json<Option<PlayerStateView>> {
    let view = state
        .player
        .snapshot_with_position(&authed.user.guid)
        .map(|(snapshot, position)| PlayerStateView {
            track_id: snapshot.track_id,
            position_ms: position,
            duration_ms: snapshot.duration_ms,
            paused: snapshot.paused,
            updated_at: snapshot.updated_at.to_rfc3339(),
        });
    Json(view)
}

/// GET /api/player/events - SSE event stream
///
/// Streams every broadcast event (player state, classification, queue
/// and liked-list changes) as JSON, with the variant name as the SSE
/// event field.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let rx = state.event_bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    let event_type = event_type_str(&event);
                    debug!("Broadcasting SSE event: {}", event_type);
                    Some(Ok(Event::default().event(event_type).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // BroadcastStream error (lagged or closed)
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Extract event type string from OpusEvent
fn event_type_str(event: &OpusEvent) -> &'static str {
    match event {
        OpusEvent::PlayerStateChanged { .. } => "PlayerStateChanged",
        OpusEvent::TrackClassified { .. } => "TrackClassified",
        OpusEvent::MatchQueueChanged { .. } => "MatchQueueChanged",
        OpusEvent::LikedSongsRefreshed { .. } => "LikedSongsRefreshed",
    }
}

#[derive(Debug, Deserialize)]
pub struct SeekBody {
    pub position_ms: u64,
    pub device_id: Option<String>,
}

/// POST /api/player/seek
///
/// Relays a seek to the Spotify player API. The SDK page fires this on
/// scrubber release, not during the drag.
pub async fn seek(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Json(body): Json<SeekBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .spotify
        .seek(&authed.access_token, body.position_ms, body.device_id.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// GET /api/player/token
///
/// Fresh access token for initializing the Web Playback SDK. The session
/// middleware has already refreshed it when it was near expiry.
pub async fn playback_token(
    Extension(authed): Extension<AuthedUser>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "access_token": authed.access_token }))
}
