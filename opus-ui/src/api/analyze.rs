//! Metadata inference endpoints
//!
//! Admin-triggered LLM analysis. Single-track analysis sends the track
//! title and artist names; album analysis sends the album title plus the
//! full track listing in disc/track order and expects exactly one result
//! per track. Nothing is written to the catalog here; the admin reviews
//! the proposal and saves it through the tracks endpoint.

use axum::{extract::State, response::Json, Extension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::auth::AuthedUser;
use crate::db::settings;
use crate::error::ApiError;
use crate::services::inference::InferredMetadata;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeTrackBody {
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
}

/// POST /api/admin/analyze/track
///
/// Infers classical metadata for one track from its title and artists.
pub async fn analyze_track(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeTrackBody>,
) -> Result<Json<InferredMetadata>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::BadRequest("track title is required".to_string()));
    }

    let model = settings::get_llm_model(&state.db).await?;
    let metadata = state
        .inference
        .infer_track(&body.title, &body.artists, model.as_deref())
        .await?;
    Ok(Json(metadata))
}

/// Largest accepted per-track analysis batch
const MAX_TRACK_BATCH: usize = 50;

#[derive(Debug, Deserialize)]
pub struct AnalyzeTracksBody {
    pub tracks: Vec<AnalyzeTrackBody>,
}

/// POST /api/admin/analyze/tracks
///
/// Infers metadata for a batch of unrelated tracks, one inference call
/// per track in input order. A track whose call fails gets an all-null
/// result in its slot instead of aborting the rest of the batch.
pub async fn analyze_tracks(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeTracksBody>,
) -> Result<Json<Vec<InferredMetadata>>, ApiError> {
    if body.tracks.is_empty() {
        return Err(ApiError::BadRequest("tracks list is empty".to_string()));
    }
    if body.tracks.len() > MAX_TRACK_BATCH {
        return Err(ApiError::BadRequest(format!(
            "at most {} tracks per batch",
            MAX_TRACK_BATCH
        )));
    }

    let model = settings::get_llm_model(&state.db).await?;
    let mut results = Vec::with_capacity(body.tracks.len());
    for item in &body.tracks {
        if item.title.trim().is_empty() {
            results.push(InferredMetadata::empty());
            continue;
        }
        match state
            .inference
            .infer_track(&item.title, &item.artists, model.as_deref())
            .await
        {
            Ok(metadata) => results.push(metadata),
            Err(e) => {
                warn!("Inference failed for '{}', substituting empty result: {}", item.title, e);
                results.push(InferredMetadata::empty());
            }
        }
    }

    info!(tracks = body.tracks.len(), "Track batch analysis complete");
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeAlbumBody {
    pub album_id: String,
}

/// Album context echoed back with the analysis
#[derive(Debug, Serialize)]
pub struct AnalyzedAlbum {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub image_url: Option<String>,
}

/// One album track paired with its inferred metadata
#[derive(Debug, Serialize)]
pub struct AnalyzedTrack {
    pub id: Option<String>,
    pub name: String,
    pub disc_number: Option<i64>,
    pub track_number: Option<i64>,
    pub duration_ms: Option<i64>,
    pub artists: Vec<String>,
    pub metadata: InferredMetadata,
}

#[derive(Debug, Serialize)]
pub struct AlbumAnalysisResponse {
    pub album: AnalyzedAlbum,
    pub tracks: Vec<AnalyzedTrack>,
}

/// POST /api/admin/analyze/album
///
/// Fetches the album's track listing from Spotify and infers metadata
/// for every track in one LLM call. A result count that does not match
/// the track count fails the whole analysis.
pub async fn analyze_album(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Json(body): Json<AnalyzeAlbumBody>,
) -> Result<Json<AlbumAnalysisResponse>, ApiError> {
    if body.album_id.trim().is_empty() {
        return Err(ApiError::BadRequest("album_id is required".to_string()));
    }

    let album = state
        .spotify
        .get_album(&authed.access_token, &body.album_id)
        .await?;

    let mut tracks = album.tracks.items.clone();
    tracks.sort_by_key(|t| (t.disc_number.unwrap_or(1), t.track_number.unwrap_or(0)));

    let titles: Vec<String> = tracks.iter().map(|t| t.name.clone()).collect();
    let model = settings::get_llm_model(&state.db).await?;
    let results = state
        .inference
        .infer_album(&album.name, &titles, model.as_deref())
        .await?;

    info!(
        album_id = %album.id,
        tracks = tracks.len(),
        "Album analysis complete"
    );

    let analyzed = tracks
        .into_iter()
        .zip(results)
        .map(|(track, metadata)| AnalyzedTrack {
            id: track.id,
            name: track.name,
            disc_number: track.disc_number,
            track_number: track.track_number,
            duration_ms: track.duration_ms,
            artists: track.artists.iter().map(|a| a.name.clone()).collect(),
            metadata,
        })
        .collect();

    Ok(Json(AlbumAnalysisResponse {
        album: AnalyzedAlbum {
            id: album.id.clone(),
            name: album.name.clone(),
            release_date: album.release_date.clone(),
            image_url: album.image_url(),
        },
        tracks: analyzed,
    }))
}
