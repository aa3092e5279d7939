//! User, session and OAuth token persistence
//!
//! One user row per Spotify account. Sessions are server-side rows keyed
//! by the cookie token; OAuth tokens are one row per user, replaced
//! wholesale on refresh.

use chrono::{DateTime, Utc};
use opus_common::db::models::{OAuthTokens, Session, User};
use opus_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Find the user for a Spotify account, creating it on first login
///
/// The display name is refreshed from the profile on every login.
pub async fn find_or_create_user(
    pool: &SqlitePool,
    spotify_user_id: &str,
    display_name: Option<&str>,
) -> Result<User> {
    sqlx::query(
        r#"
        INSERT INTO users (guid, spotify_user_id, display_name, created_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(spotify_user_id) DO UPDATE SET
            display_name = excluded.display_name
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(spotify_user_id)
    .bind(display_name)
    .execute(pool)
    .await?;

    load_user_by_spotify_id(pool, spotify_user_id)
        .await?
        .ok_or_else(|| Error::Internal("user upsert produced no row".to_string()))
}

/// Load user by guid
pub async fn load_user(pool: &SqlitePool, guid: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT guid, spotify_user_id, display_name FROM users WHERE guid = ?")
        .bind(guid)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        guid: row.get("guid"),
        spotify_user_id: row.get("spotify_user_id"),
        display_name: row.get("display_name"),
    }))
}

/// Load user by Spotify account id
pub async fn load_user_by_spotify_id(
    pool: &SqlitePool,
    spotify_user_id: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, spotify_user_id, display_name FROM users WHERE spotify_user_id = ?",
    )
    .bind(spotify_user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| User {
        guid: row.get("guid"),
        spotify_user_id: row.get("spotify_user_id"),
        display_name: row.get("display_name"),
    }))
}

/// Save a user's OAuth token pair, replacing any previous row
pub async fn save_tokens(pool: &SqlitePool, tokens: &OAuthTokens) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO oauth_tokens (user_id, access_token, refresh_token, expires_at, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(user_id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            expires_at = excluded.expires_at,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&tokens.user_id)
    .bind(&tokens.access_token)
    .bind(&tokens.refresh_token)
    .bind(tokens.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a user's OAuth token pair
pub async fn load_tokens(pool: &SqlitePool, user_id: &str) -> Result<Option<OAuthTokens>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, access_token, refresh_token, expires_at
        FROM oauth_tokens
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| OAuthTokens {
        user_id: row.get("user_id"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        expires_at: row.get("expires_at"),
    }))
}

/// Save a new session row
pub async fn save_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (token, user_id, created_at, expires_at)
        VALUES (?, ?, CURRENT_TIMESTAMP, ?)
        "#,
    )
    .bind(&session.token)
    .bind(&session.user_id)
    .bind(session.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load session by cookie token
pub async fn load_session(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT token, user_id, expires_at FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Session {
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
    }))
}

/// Delete a session (logout)
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove sessions that expired before `now`; returns the number removed
pub async fn purge_expired_sessions(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await.unwrap();
        opus_common::db::init::create_users_table(&pool).await.unwrap();
        opus_common::db::init::create_oauth_tokens_table(&pool).await.unwrap();
        opus_common::db::init::create_sessions_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_find_or_create_user_is_stable() {
        let pool = test_pool().await;

        let first = find_or_create_user(&pool, "spotify:alice", Some("Alice")).await.unwrap();
        let second = find_or_create_user(&pool, "spotify:alice", Some("Alice B."))
            .await
            .unwrap();

        assert_eq!(first.guid, second.guid);
        assert_eq!(second.display_name.as_deref(), Some("Alice B."));
    }

    #[tokio::test]
    async fn test_tokens_replaced_wholesale() {
        let pool = test_pool().await;
        let user = find_or_create_user(&pool, "spotify:alice", None).await.unwrap();

        let now = Utc::now();
        save_tokens(
            &pool,
            &OAuthTokens {
                user_id: user.guid.clone(),
                access_token: "old-access".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_at: now + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        save_tokens(
            &pool,
            &OAuthTokens {
                user_id: user.guid.clone(),
                access_token: "new-access".to_string(),
                refresh_token: "refresh-2".to_string(),
                expires_at: now + Duration::hours(2),
            },
        )
        .await
        .unwrap();

        let loaded = load_tokens(&pool, &user.guid).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "new-access");
        assert_eq!(loaded.refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let pool = test_pool().await;
        let user = find_or_create_user(&pool, "spotify:alice", None).await.unwrap();

        let now = Utc::now();
        let session = Session {
            token: "session-token-1".to_string(),
            user_id: user.guid.clone(),
            expires_at: now + Duration::days(30),
        };
        save_session(&pool, &session).await.unwrap();

        let loaded = load_session(&pool, "session-token-1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, user.guid);
        assert!(!loaded.is_expired(now));

        delete_session(&pool, "session-token-1").await.unwrap();
        assert!(load_session(&pool, "session-token-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let pool = test_pool().await;
        let user = find_or_create_user(&pool, "spotify:alice", None).await.unwrap();

        let now = Utc::now();
        save_session(
            &pool,
            &Session {
                token: "stale".to_string(),
                user_id: user.guid.clone(),
                expires_at: now - Duration::hours(1),
            },
        )
        .await
        .unwrap();
        save_session(
            &pool,
            &Session {
                token: "fresh".to_string(),
                user_id: user.guid.clone(),
                expires_at: now + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        assert_eq!(purge_expired_sessions(&pool, now).await.unwrap(), 1);
        assert!(load_session(&pool, "stale").await.unwrap().is_none());
        assert!(load_session(&pool, "fresh").await.unwrap().is_some());
    }
}
