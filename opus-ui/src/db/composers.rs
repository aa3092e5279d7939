//! Composer database operations

use opus_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Composer record
#[derive(Debug, Clone, serde::Serialize)]
pub struct Composer {
    /// Unique identifier (UUID)
    pub guid: Uuid,
    /// Display name ("Johann Sebastian Bach")
    pub name: String,
    pub birth_year: Option<i64>,
    pub death_year: Option<i64>,
    pub biography: Option<String>,
    /// Linked Spotify artist id, unique when present
    pub spotify_artist_id: Option<String>,
}

impl Composer {
    /// Create new composer with a fresh guid
    pub fn new(name: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name,
            birth_year: None,
            death_year: None,
            biography: None,
            spotify_artist_id: None,
        }
    }
}

/// Save composer to database (insert or update by guid)
pub async fn save_composer(pool: &SqlitePool, composer: &Composer) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO composers (
            guid, name, birth_year, death_year, biography, spotify_artist_id,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(guid) DO UPDATE SET
            name = excluded.name,
            birth_year = excluded.birth_year,
            death_year = excluded.death_year,
            biography = excluded.biography,
            spotify_artist_id = excluded.spotify_artist_id,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(composer.guid.to_string())
    .bind(&composer.name)
    .bind(composer.birth_year)
    .bind(composer.death_year)
    .bind(&composer.biography)
    .bind(&composer.spotify_artist_id)
    .execute(pool)
    .await?;

    Ok(())
}

fn composer_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Composer> {
    let guid_str: String = row.get("guid");
    Ok(Composer {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| opus_common::Error::Internal(format!("bad composer guid: {}", e)))?,
        name: row.get("name"),
        birth_year: row.get("birth_year"),
        death_year: row.get("death_year"),
        biography: row.get("biography"),
        spotify_artist_id: row.get("spotify_artist_id"),
    })
}

/// Load composer by guid
pub async fn load_composer(pool: &SqlitePool, guid: Uuid) -> Result<Option<Composer>> {
    let row = sqlx::query(
        r#"
        SELECT guid, name, birth_year, death_year, biography, spotify_artist_id
        FROM composers
        WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(composer_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Load composer by linked Spotify artist id
pub async fn load_composer_by_spotify_artist(
    pool: &SqlitePool,
    spotify_artist_id: &str,
) -> Result<Option<Composer>> {
    let row = sqlx::query(
        r#"
        SELECT guid, name, birth_year, death_year, biography, spotify_artist_id
        FROM composers
        WHERE spotify_artist_id = ?
        "#,
    )
    .bind(spotify_artist_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(composer_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Load composer by exact name
pub async fn load_composer_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Composer>> {
    let row = sqlx::query(
        r#"
        SELECT guid, name, birth_year, death_year, biography, spotify_artist_id
        FROM composers
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(composer_from_row(&row)?)),
        None => Ok(None),
    }
}

/// List all composers ordered by name
pub async fn list_composers(pool: &SqlitePool) -> Result<Vec<Composer>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, name, birth_year, death_year, biography, spotify_artist_id
        FROM composers
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(composer_from_row).collect()
}
