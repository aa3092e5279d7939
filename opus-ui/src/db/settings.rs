//! Settings table access (service bookkeeping key-value pairs)

use opus_common::Result;
use sqlx::{Row, SqlitePool};

/// Read one setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| row.get("value")))
}

/// Write one setting value (insert or overwrite)
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove one setting
pub async fn clear_setting(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get the stored inference model override, if any
pub async fn get_llm_model(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, "llm_model").await
}

/// Set or clear the inference model override
///
/// `None` removes the override so the configured default applies again.
pub async fn set_llm_model(pool: &SqlitePool, model: Option<&str>) -> Result<()> {
    match model {
        Some(model) => set_setting(pool, "llm_model", model).await,
        None => clear_setting(pool, "llm_model").await,
    }
}

/// Get the timestamp of the last liked-songs refresh
pub async fn get_liked_refreshed_at(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, "liked_refreshed_at").await
}

/// Record a liked-songs refresh
pub async fn set_liked_refreshed_at(pool: &SqlitePool, timestamp: &str) -> Result<()> {
    set_setting(pool, "liked_refreshed_at", timestamp).await
}
