//! Spotify mirror row operations (albums, artists, tracks)
//!
//! These are locally cached copies of Spotify API objects, keyed by the
//! Spotify id. They are a join/lookup convenience, not authoritative;
//! Spotify remains the source of truth. Upserts refresh the cached fields.

use opus_common::Result;
use sqlx::{Row, SqlitePool};

/// Cached Spotify album
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpotifyAlbum {
    /// Spotify album id
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub image_url: Option<String>,
}

/// Cached Spotify artist
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpotifyArtist {
    /// Spotify artist id
    pub id: String,
    pub name: String,
}

/// Cached Spotify track
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpotifyTrack {
    /// Spotify track id
    pub id: String,
    pub name: String,
    pub album_id: Option<String>,
    pub disc_number: i64,
    pub track_number: Option<i64>,
    pub duration_ms: Option<i64>,
}

/// Insert or refresh an album mirror row
pub async fn ensure_album(pool: &SqlitePool, album: &SpotifyAlbum) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO spotify_albums (id, name, release_date, image_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            release_date = excluded.release_date,
            image_url = excluded.image_url,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&album.id)
    .bind(&album.name)
    .bind(&album.release_date)
    .bind(&album.image_url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or refresh an artist mirror row
pub async fn ensure_artist(pool: &SqlitePool, artist: &SpotifyArtist) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO spotify_artists (id, name, created_at, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&artist.id)
    .bind(&artist.name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or refresh a track mirror row
pub async fn ensure_track(pool: &SqlitePool, track: &SpotifyTrack) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO spotify_tracks (
            id, name, album_id, disc_number, track_number, duration_ms,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            album_id = excluded.album_id,
            disc_number = excluded.disc_number,
            track_number = excluded.track_number,
            duration_ms = excluded.duration_ms,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&track.id)
    .bind(&track.name)
    .bind(&track.album_id)
    .bind(track.disc_number)
    .bind(track.track_number)
    .bind(track.duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Link a track to one of its artists (idempotent)
pub async fn link_track_artist(pool: &SqlitePool, track_id: &str, artist_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO track_artists (track_id, artist_id, created_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(track_id, artist_id) DO NOTHING
        "#,
    )
    .bind(track_id)
    .bind(artist_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one track mirror row
pub async fn load_track(pool: &SqlitePool, track_id: &str) -> Result<Option<SpotifyTrack>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, album_id, disc_number, track_number, duration_ms
        FROM spotify_tracks
        WHERE id = ?
        "#,
    )
    .bind(track_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SpotifyTrack {
        id: row.get("id"),
        name: row.get("name"),
        album_id: row.get("album_id"),
        disc_number: row.get("disc_number"),
        track_number: row.get("track_number"),
        duration_ms: row.get("duration_ms"),
    }))
}

/// Load one album mirror row
pub async fn load_album(pool: &SqlitePool, album_id: &str) -> Result<Option<SpotifyAlbum>> {
    let row = sqlx::query(
        "SELECT id, name, release_date, image_url FROM spotify_albums WHERE id = ?",
    )
    .bind(album_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SpotifyAlbum {
        id: row.get("id"),
        name: row.get("name"),
        release_date: row.get("release_date"),
        image_url: row.get("image_url"),
    }))
}

/// Tracks linked to one movement, in album/track order
pub async fn list_tracks_for_movement(
    pool: &SqlitePool,
    movement_id: &str,
) -> Result<Vec<SpotifyTrack>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.album_id, t.disc_number, t.track_number, t.duration_ms
        FROM spotify_tracks t
        JOIN track_movements tm ON tm.track_id = t.id
        WHERE tm.movement_id = ?
        ORDER BY t.album_id, t.disc_number, t.track_number
        "#,
    )
    .bind(movement_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SpotifyTrack {
            id: row.get("id"),
            name: row.get("name"),
            album_id: row.get("album_id"),
            disc_number: row.get("disc_number"),
            track_number: row.get("track_number"),
            duration_ms: row.get("duration_ms"),
        })
        .collect())
}

/// Artists linked to one track, in name order
pub async fn list_artists_for_track(
    pool: &SqlitePool,
    track_id: &str,
) -> Result<Vec<SpotifyArtist>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.name
        FROM spotify_artists a
        JOIN track_artists ta ON ta.artist_id = a.id
        WHERE ta.track_id = ?
        ORDER BY a.name
        "#,
    )
    .bind(track_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SpotifyArtist {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}
