//! Catalog reconciliation ("save track with metadata")
//!
//! Turns one track's (possibly user-corrected) inferred metadata into
//! consistent composer/work/movement/recording rows and links the Spotify
//! track to the resulting movement.
//!
//! Every step is individually idempotent and the steps are not wrapped in
//! a transaction: a failure partway can leave e.g. a new work with no
//! movement yet, which is acceptable because re-running the save converges
//! on the same final rows.

use crate::db::composers::{self, Composer};
use crate::db::movements::{self, Movement};
use crate::db::recordings::{self, Recording};
use crate::db::track_movements::{self, TrackMovement};
use crate::db::tracks::{self, SpotifyAlbum, SpotifyArtist, SpotifyTrack};
use crate::db::works::{self, Work};
use crate::services::inference::InferredMetadata;
use opus_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Spotify track fields carried by a save request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub disc_number: Option<i64>,
    #[serde(default)]
    pub track_number: Option<i64>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

/// Spotify album fields carried by a save request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Spotify artist fields carried by a save request
///
/// `composer_id` is set when the client already knows which catalog
/// composer this artist is; it short-circuits composer resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub composer_id: Option<Uuid>,
}

/// One save-track-with-metadata request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveTrackRequest {
    pub track: TrackInput,
    pub album: AlbumInput,
    #[serde(default)]
    pub artists: Vec<ArtistInput>,
    /// Explicit composer choice from the admin form, wins over inference
    #[serde(default)]
    pub composer_id: Option<Uuid>,
    pub metadata: InferredMetadata,
    /// Movement boundaries inside a compilation track
    #[serde(default)]
    pub start_ms: Option<i64>,
    #[serde(default)]
    pub end_ms: Option<i64>,
}

/// Rows the save resolved or created
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub composer: Composer,
    pub work: Work,
    pub movement: Movement,
    pub recording: Recording,
}

/// Save one track into the catalog
///
/// Steps:
/// 1. Ensure album and artist mirror rows
/// 2. Resolve the composer
/// 3. Ensure the track mirror row and its artist links
/// 4. Upsert the work by its identity key
/// 5. Upsert the movement by (work, number)
/// 6. Ensure the recording pair (first write wins)
/// 7. Insert the track-movement link (insert-or-ignore)
pub async fn save_track_with_metadata(
    pool: &SqlitePool,
    request: &SaveTrackRequest,
) -> Result<SaveOutcome> {
    debug!(track_id = %request.track.id, "Saving track with metadata");

    // Step 1
    let album_row = SpotifyAlbum {
        id: request.album.id.clone(),
        name: request.album.name.clone(),
        release_date: request.album.release_date.clone(),
        image_url: request.album.image_url.clone(),
    };
    tracks::ensure_album(pool, &album_row).await?;
    for artist in &request.artists {
        tracks::ensure_artist(
            pool,
            &SpotifyArtist { id: artist.id.clone(), name: artist.name.clone() },
        )
        .await?;
    }

    // Step 2
    let composer = resolve_composer(pool, request).await?;

    // Step 3
    tracks::ensure_track(
        pool,
        &SpotifyTrack {
            id: request.track.id.clone(),
            name: request.track.name.clone(),
            album_id: Some(request.album.id.clone()),
            disc_number: request.track.disc_number.unwrap_or(1),
            track_number: request.track.track_number,
            duration_ms: request.track.duration_ms,
        },
    )
    .await?;
    for artist in &request.artists {
        tracks::link_track_artist(pool, &request.track.id, &artist.id).await?;
    }

    // Step 4
    let work = upsert_work(pool, composer.guid, &request.track.name, &request.metadata).await?;

    // Step 5
    let number = resolve_movement_number(pool, request, work.guid).await?;
    let mut movement = Movement::new(work.guid, number);
    movement.title = request.metadata.movement_title.clone();
    let movement = movements::upsert_movement(pool, &movement).await?;

    // Step 6
    let recording =
        recordings::ensure_recording(pool, &Recording::new(request.album.id.clone(), work.guid))
            .await?;

    // Step 7
    let mut link = TrackMovement::new(request.track.id.clone(), movement.guid);
    link.start_ms = request.start_ms;
    link.end_ms = request.end_ms;
    track_movements::link_track_to_movement(pool, &link).await?;

    debug!(
        track_id = %request.track.id,
        work = %work.title,
        movement = movement.number,
        "Track saved into catalog"
    );

    Ok(SaveOutcome { composer, work, movement, recording })
}

/// Resolve the composer for a save request
///
/// Preference order: explicit request composer id, a composer id already
/// attached to the matching artist, a composer linked to one of the
/// track's Spotify artists, a composer with the inferred name, else a
/// newly created composer (linked to the name-matching artist if any).
async fn resolve_composer(pool: &SqlitePool, request: &SaveTrackRequest) -> Result<Composer> {
    if let Some(composer_id) = request.composer_id {
        return composers::load_composer(pool, composer_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("composer {}", composer_id)));
    }

    let inferred_name = request.metadata.composer.as_deref();

    // Composer id carried on an artist input, preferring the artist whose
    // name matches the inferred composer
    let attached = request
        .artists
        .iter()
        .filter(|artist| artist.composer_id.is_some())
        .max_by_key(|artist| name_matches(&artist.name, inferred_name));
    if let Some(artist) = attached {
        let composer_id = artist.composer_id.unwrap_or_default();
        if let Some(composer) = composers::load_composer(pool, composer_id).await? {
            return Ok(composer);
        }
    }

    // A composer already linked to one of the track's Spotify artists
    for artist in &request.artists {
        if let Some(composer) =
            composers::load_composer_by_spotify_artist(pool, &artist.id).await?
        {
            return Ok(composer);
        }
    }

    let name = match inferred_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(Error::InvalidInput(
                "no composer specified and none inferred".to_string(),
            ))
        }
    };

    // Re-saves must find the composer created last time
    if let Some(composer) = composers::load_composer_by_name(pool, &name).await? {
        return Ok(composer);
    }

    let mut composer = Composer::new(name.clone());
    composer.spotify_artist_id = request
        .artists
        .iter()
        .find(|artist| name_matches(&artist.name, Some(&name)))
        .map(|artist| artist.id.clone());
    composers::save_composer(pool, &composer).await?;
    debug!(name = %composer.name, "Created new composer");

    Ok(composer)
}

fn name_matches(artist_name: &str, composer_name: Option<&str>) -> bool {
    match composer_name {
        Some(name) => artist_name.eq_ignore_ascii_case(name),
        None => false,
    }
}

/// Upsert the work by its identity key
///
/// Catalog pair when a catalog number is known, else title. An existing
/// match keeps its guid; mutable fields take the latest call's values. A
/// catalogued save also matches an older uncatalogued row by title so the
/// row is upgraded instead of duplicated.
async fn upsert_work(
    pool: &SqlitePool,
    composer_id: Uuid,
    track_name: &str,
    metadata: &InferredMetadata,
) -> Result<Work> {
    let title = metadata
        .work_title
        .clone()
        .unwrap_or_else(|| track_name.to_string());

    let existing = match metadata.catalog_number.as_deref() {
        Some(number) => {
            let by_catalog = works::find_work_by_catalog(
                pool,
                composer_id,
                metadata.catalog_system.as_deref(),
                number,
            )
            .await?;
            match by_catalog {
                Some(work) => Some(work),
                None => works::find_work_by_title(pool, composer_id, &title).await?,
            }
        }
        None => works::find_work_by_title(pool, composer_id, &title).await?,
    };

    let guid = match &existing {
        Some(work) => work.guid,
        None => Uuid::new_v4(),
    };

    let work = Work {
        guid,
        composer_id,
        title,
        nickname: metadata.nickname.clone(),
        catalog_system: metadata.catalog_system.clone(),
        catalog_number: metadata.catalog_number.clone(),
        year_composed: metadata.year_composed,
        form: metadata.form.clone(),
    };
    works::save_work(pool, &work).await?;

    Ok(work)
}

/// Movement number for this save
///
/// Explicit number from the metadata wins. Otherwise a re-save reuses the
/// number of the movement this track is already linked to in this work.
/// Otherwise derive from position among the album's tracks already linked
/// into the work: first gets 1, next gets max + 1 (callers process album
/// batches in original track order).
async fn resolve_movement_number(
    pool: &SqlitePool,
    request: &SaveTrackRequest,
    work_id: Uuid,
) -> Result<i64> {
    if let Some(number) = request.metadata.movement_number {
        return Ok(number);
    }

    for link in track_movements::load_links_for_track(pool, &request.track.id).await? {
        if let Some(movement) = movements::load_movement(pool, link.movement_id).await? {
            if movement.work_id == work_id {
                return Ok(movement.number);
            }
        }
    }

    track_movements::next_movement_number(pool, work_id, &request.album.id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await.unwrap();
        opus_common::db::init::init_schema(&pool).await.unwrap();
        pool
    }

    fn bach_request(track_id: &str, track_number: i64) -> SaveTrackRequest {
        SaveTrackRequest {
            track: TrackInput {
                id: track_id.to_string(),
                name: format!("Concerto BWV 1052: Movement {}", track_number),
                disc_number: Some(1),
                track_number: Some(track_number),
                duration_ms: Some(300_000),
            },
            album: AlbumInput {
                id: "album1".to_string(),
                name: "Bach: Harpsichord Concertos".to_string(),
                release_date: Some("1981".to_string()),
                image_url: None,
            },
            artists: vec![
                ArtistInput {
                    id: "artist-bach".to_string(),
                    name: "Johann Sebastian Bach".to_string(),
                    composer_id: None,
                },
                ArtistInput {
                    id: "artist-gould".to_string(),
                    name: "Glenn Gould".to_string(),
                    composer_id: None,
                },
            ],
            composer_id: None,
            metadata: InferredMetadata {
                is_classical: Some(true),
                composer: Some("Johann Sebastian Bach".to_string()),
                work_title: Some("Harpsichord Concerto No. 1 in D minor".to_string()),
                catalog_system: Some("BWV".to_string()),
                catalog_number: Some("1052".to_string()),
                ..Default::default()
            },
            start_ms: None,
            end_ms: None,
        }
    }

    #[tokio::test]
    async fn test_new_composer_linked_to_matching_artist() {
        let pool = test_pool().await;

        let outcome = save_track_with_metadata(&pool, &bach_request("track1", 1))
            .await
            .unwrap();

        assert_eq!(outcome.composer.name, "Johann Sebastian Bach");
        // Linked to the artist whose name matches the composer, not the performer
        assert_eq!(outcome.composer.spotify_artist_id.as_deref(), Some("artist-bach"));
    }

    #[tokio::test]
    async fn test_composer_reused_via_artist_link_on_later_saves() {
        let pool = test_pool().await;

        let first = save_track_with_metadata(&pool, &bach_request("track1", 1))
            .await
            .unwrap();

        // Second save carries no composer name at all; the artist link finds it
        let mut request = bach_request("track2", 2);
        request.metadata.composer = None;
        let second = save_track_with_metadata(&pool, &request).await.unwrap();

        assert_eq!(first.composer.guid, second.composer.guid);
        assert_eq!(crate::db::composers::list_composers(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_composer_id_wins() {
        let pool = test_pool().await;

        let composer = Composer::new("Carl Philipp Emanuel Bach".to_string());
        composers::save_composer(&pool, &composer).await.unwrap();

        let mut request = bach_request("track1", 1);
        request.composer_id = Some(composer.guid);

        let outcome = save_track_with_metadata(&pool, &request).await.unwrap();
        assert_eq!(outcome.composer.guid, composer.guid);
    }

    #[tokio::test]
    async fn test_save_without_composer_fails() {
        let pool = test_pool().await;

        let mut request = bach_request("track1", 1);
        request.metadata.composer = None;

        let err = save_track_with_metadata(&pool, &request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_catalogued_save_upgrades_title_matched_work() {
        let pool = test_pool().await;

        // First save knows only the title
        let mut first = bach_request("track1", 1);
        first.metadata.catalog_system = None;
        first.metadata.catalog_number = None;
        let first_outcome = save_track_with_metadata(&pool, &first).await.unwrap();
        assert!(first_outcome.work.catalog_number.is_none());

        // Later save adds the catalog pair; same row, now catalogued
        let second_outcome = save_track_with_metadata(&pool, &bach_request("track1", 1))
            .await
            .unwrap();
        assert_eq!(first_outcome.work.guid, second_outcome.work.guid);
        assert_eq!(second_outcome.work.catalog_number.as_deref(), Some("1052"));
    }
}
