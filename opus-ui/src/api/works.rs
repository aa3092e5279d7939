//! Work and movement catalog endpoints
//!
//! Browse endpoints return catalog rows joined with composer names and
//! album details; curation endpoints edit works and movements. Movement
//! deletion is guarded: it fails while tracks are still linked.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{composers, movements, recordings, tracks, works};
use crate::db::movements::Movement;
use crate::db::works::Work;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WorksQuery {
    pub composer_id: Option<Uuid>,
}

/// One work row with its composer's name
#[derive(Debug, Serialize)]
pub struct WorkView {
    #[serde(flatten)]
    pub work: Work,
    pub composer_name: Option<String>,
}

/// GET /api/works
///
/// Lists catalog works, optionally restricted to one composer.
pub async fn list_works(
    State(state): State<AppState>,
    Query(query): Query<WorksQuery>,
) -> Result<Json<Vec<WorkView>>, ApiError> {
    let work_rows = match query.composer_id {
        Some(composer_id) => works::list_works_by_composer(&state.db, composer_id).await?,
        None => works::list_works(&state.db).await?,
    };

    let names: HashMap<Uuid, String> = composers::list_composers(&state.db)
        .await?
        .into_iter()
        .map(|c| (c.guid, c.name))
        .collect();

    let views = work_rows
        .into_iter()
        .map(|work| {
            let composer_name = names.get(&work.composer_id).cloned();
            WorkView {
                work,
                composer_name,
            }
        })
        .collect();

    Ok(Json(views))
}

/// Movement with its linked tracks
#[derive(Debug, Serialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: Movement,
    pub tracks: Vec<tracks::SpotifyTrack>,
}

/// Recording with its album details
#[derive(Debug, Serialize)]
pub struct RecordingView {
    #[serde(flatten)]
    pub recording: recordings::Recording,
    pub album: Option<tracks::SpotifyAlbum>,
}

#[derive(Debug, Serialize)]
pub struct WorkDetailResponse {
    #[serde(flatten)]
    pub work: Work,
    pub composer: composers::Composer,
    pub movements: Vec<MovementView>,
    pub recordings: Vec<RecordingView>,
}

/// GET /api/works/:id
///
/// Full work detail: composer, movements in number order with their
/// linked tracks, and known recordings with album details.
pub async fn get_work(
    State(state): State<AppState>,
    Path(work_id): Path<Uuid>,
) -> Result<Json<WorkDetailResponse>, ApiError> {
    let work = works::load_work(&state.db, work_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("work {}", work_id)))?;

    let composer = composers::load_composer(&state.db, work.composer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("composer {}", work.composer_id)))?;

    let mut movement_views = Vec::new();
    for movement in movements::list_movements_for_work(&state.db, work_id).await? {
        let linked =
            tracks::list_tracks_for_movement(&state.db, &movement.guid.to_string()).await?;
        movement_views.push(MovementView {
            movement,
            tracks: linked,
        });
    }

    let mut recording_views = Vec::new();
    for recording in recordings::list_recordings_for_work(&state.db, work_id).await? {
        let album = tracks::load_album(&state.db, &recording.spotify_album_id).await?;
        recording_views.push(RecordingView { recording, album });
    }

    Ok(Json(WorkDetailResponse {
        work,
        composer,
        movements: movement_views,
        recordings: recording_views,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkBody {
    pub title: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub catalog_system: Option<String>,
    #[serde(default)]
    pub catalog_number: Option<String>,
    #[serde(default)]
    pub year_composed: Option<i64>,
    #[serde(default)]
    pub form: Option<String>,
}

/// PUT /api/admin/works/:id
///
/// Replaces the work's mutable fields. Composer reassignment is not
/// supported.
pub async fn update_work(
    State(state): State<AppState>,
    Path(work_id): Path<Uuid>,
    Json(body): Json<UpdateWorkBody>,
) -> Result<Json<Work>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::BadRequest("work title is required".to_string()));
    }

    let mut work = works::load_work(&state.db, work_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("work {}", work_id)))?;

    work.title = body.title;
    work.nickname = body.nickname;
    work.catalog_system = body.catalog_system;
    work.catalog_number = body.catalog_number;
    work.year_composed = body.year_composed;
    work.form = body.form;
    works::save_work(&state.db, &work).await?;

    Ok(Json(work))
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementBody {
    pub number: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// POST /api/admin/works/:id/movements
///
/// Creates the numbered movement, or retitles it when the number already
/// exists for this work.
pub async fn create_movement(
    State(state): State<AppState>,
    Path(work_id): Path<Uuid>,
    Json(body): Json<CreateMovementBody>,
) -> Result<Json<Movement>, ApiError> {
    if body.number < 1 {
        return Err(ApiError::BadRequest(
            "movement number must be 1 or greater".to_string(),
        ));
    }

    works::load_work(&state.db, work_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("work {}", work_id)))?;

    let mut movement = Movement::new(work_id, body.number);
    movement.title = body.title;
    let stored = movements::upsert_movement(&state.db, &movement).await?;

    Ok(Json(stored))
}

#[derive(Debug, Deserialize)]
pub struct RenameMovementBody {
    #[serde(default)]
    pub title: Option<String>,
}

/// PUT /api/admin/movements/:id
pub async fn rename_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
    Json(body): Json<RenameMovementBody>,
) -> Result<Json<Movement>, ApiError> {
    movements::rename_movement(&state.db, movement_id, body.title.as_deref()).await?;
    let movement = movements::load_movement(&state.db, movement_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("movement {}", movement_id)))?;

    Ok(Json(movement))
}

/// DELETE /api/admin/movements/:id
///
/// Refused with 409 while tracks are linked to the movement.
pub async fn delete_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    movements::delete_movement(&state.db, movement_id).await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct CatalogPair {
    pub catalog_system: String,
    pub catalog_number: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogPairResult {
    pub catalog_system: String,
    pub catalog_number: String,
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckWorksBody {
    pub pairs: Vec<CatalogPair>,
}

/// POST /api/admin/works/check
///
/// Batch existence probe over (catalog_system, catalog_number) pairs, so
/// the admin UI can badge album rows before a save. Matches on the
/// catalog pair alone, without the composer.
pub async fn check_works(
    State(state): State<AppState>,
    Json(body): Json<CheckWorksBody>,
) -> Result<Json<Vec<CatalogPairResult>>, ApiError> {
    let mut results = Vec::with_capacity(body.pairs.len());
    for pair in body.pairs {
        let exists =
            works::catalog_pair_exists(&state.db, &pair.catalog_system, &pair.catalog_number)
                .await?;
        results.push(CatalogPairResult {
            catalog_system: pair.catalog_system,
            catalog_number: pair.catalog_number,
            exists,
        });
    }

    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct CheckMovementBody {
    pub composer_id: Uuid,
    #[serde(default)]
    pub catalog_system: Option<String>,
    pub catalog_number: String,
    #[serde(default)]
    pub movement_number: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckMovementResponse {
    pub work_exists: bool,
    pub work_id: Option<String>,
    pub movement_exists: bool,
    pub movement_id: Option<String>,
}

/// POST /api/admin/works/check-movement
///
/// Single-work probe: does this composer already have the catalogued
/// work, and if so, does the given movement number exist on it? Unlike
/// the batch probe this one scopes to the composer.
pub async fn check_work_and_movement(
    State(state): State<AppState>,
    Json(body): Json<CheckMovementBody>,
) -> Result<Json<CheckMovementResponse>, ApiError> {
    let work = works::find_work_by_catalog(
        &state.db,
        body.composer_id,
        body.catalog_system.as_deref(),
        &body.catalog_number,
    )
    .await?;

    let (movement_exists, movement_id) = match (&work, body.movement_number) {
        (Some(work), Some(number)) => {
            match movements::load_movement_by_number(&state.db, work.guid, number).await? {
                Some(movement) => (true, Some(movement.guid.to_string())),
                None => (false, None),
            }
        }
        _ => (false, None),
    };

    Ok(Json(CheckMovementResponse {
        work_exists: work.is_some(),
        work_id: work.map(|w| w.guid.to_string()),
        movement_exists,
        movement_id,
    }))
}
