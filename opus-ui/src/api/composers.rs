//! Composer catalog endpoints
//!
//! Listing and detail are available to any signed-in user; creation and
//! editing are admin curation. Import links a composer to a Spotify
//! artist so later saves can resolve the composer from track artists.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::auth::AuthedUser;
use crate::db::composers::{self, Composer};
use crate::db::works;
use crate::error::ApiError;
use crate::AppState;

/// GET /api/composers
pub async fn list_composers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Composer>>, ApiError> {
    Ok(Json(composers::list_composers(&state.db).await?))
}

#[derive(Debug, serde::Serialize)]
pub struct ComposerDetailResponse {
    #[serde(flatten)]
    pub composer: Composer,
    pub works: Vec<works::Work>,
}

/// GET /api/composers/:id
///
/// Composer with their works in catalog order.
pub async fn get_composer(
    State(state): State<AppState>,
    Path(composer_id): Path<Uuid>,
) -> Result<Json<ComposerDetailResponse>, ApiError> {
    let composer = composers::load_composer(&state.db, composer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("composer {}", composer_id)))?;

    let work_rows = works::list_works_by_composer(&state.db, composer_id).await?;

    Ok(Json(ComposerDetailResponse {
        composer,
        works: work_rows,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ComposerBody {
    pub name: String,
    #[serde(default)]
    pub birth_year: Option<i64>,
    #[serde(default)]
    pub death_year: Option<i64>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub spotify_artist_id: Option<String>,
}

/// POST /api/admin/composers
pub async fn create_composer(
    State(state): State<AppState>,
    Json(body): Json<ComposerBody>,
) -> Result<Json<Composer>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("composer name is required".to_string()));
    }

    if let Some(artist_id) = &body.spotify_artist_id {
        if let Some(existing) =
            composers::load_composer_by_spotify_artist(&state.db, artist_id).await?
        {
            return Err(ApiError::Conflict(format!(
                "Spotify artist already linked to composer {}",
                existing.name
            )));
        }
    }

    let mut composer = Composer::new(body.name);
    composer.birth_year = body.birth_year;
    composer.death_year = body.death_year;
    composer.biography = body.biography;
    composer.spotify_artist_id = body.spotify_artist_id;
    composers::save_composer(&state.db, &composer).await?;

    info!(composer = %composer.name, "Composer created");
    Ok(Json(composer))
}

/// PUT /api/admin/composers/:id
pub async fn update_composer(
    State(state): State<AppState>,
    Path(composer_id): Path<Uuid>,
    Json(body): Json<ComposerBody>,
) -> Result<Json<Composer>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("composer name is required".to_string()));
    }

    let mut composer = composers::load_composer(&state.db, composer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("composer {}", composer_id)))?;

    if let Some(artist_id) = &body.spotify_artist_id {
        if let Some(existing) =
            composers::load_composer_by_spotify_artist(&state.db, artist_id).await?
        {
            if existing.guid != composer_id {
                return Err(ApiError::Conflict(format!(
                    "Spotify artist already linked to composer {}",
                    existing.name
                )));
            }
        }
    }

    composer.name = body.name;
    composer.birth_year = body.birth_year;
    composer.death_year = body.death_year;
    composer.biography = body.biography;
    composer.spotify_artist_id = body.spotify_artist_id;
    composers::save_composer(&state.db, &composer).await?;

    Ok(Json(composer))
}

#[derive(Debug, Deserialize)]
pub struct ImportComposerBody {
    pub artist_id: String,
}

/// POST /api/admin/composers/import
///
/// Creates a composer from a Spotify artist. Idempotent: importing an
/// artist that is already linked returns the existing composer.
pub async fn import_composer(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Json(body): Json<ImportComposerBody>,
) -> Result<Json<Composer>, ApiError> {
    if body.artist_id.trim().is_empty() {
        return Err(ApiError::BadRequest("artist_id is required".to_string()));
    }

    if let Some(existing) =
        composers::load_composer_by_spotify_artist(&state.db, &body.artist_id).await?
    {
        return Ok(Json(existing));
    }

    let artist = state
        .spotify
        .get_artist(&authed.access_token, &body.artist_id)
        .await?;

    let mut composer = Composer::new(artist.name);
    composer.spotify_artist_id = artist.id;
    composers::save_composer(&state.db, &composer).await?;

    info!(composer = %composer.name, "Composer imported from Spotify artist");
    Ok(Json(composer))
}

#[derive(Debug, Deserialize)]
pub struct ArtistSearchQuery {
    pub q: String,
}

/// One artist candidate for the import picker
#[derive(Debug, serde::Serialize)]
pub struct ArtistSearchResult {
    pub id: Option<String>,
    pub name: String,
}

/// GET /api/admin/composers/search?q=NAME
///
/// Searches Spotify artists by name, for picking an artist to import.
pub async fn search_artists(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
    Query(query): Query<ArtistSearchQuery>,
) -> Result<Json<Vec<ArtistSearchResult>>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("q is required".to_string()));
    }

    let results = state
        .spotify
        .search(&authed.access_token, &query.q, "artist", 10)
        .await?;

    let artists = results
        .artists
        .map(|page| page.items)
        .unwrap_or_default()
        .into_iter()
        .map(|artist| ArtistSearchResult {
            id: artist.id,
            name: artist.name,
        })
        .collect();
    Ok(Json(artists))
}
