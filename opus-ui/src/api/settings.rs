//! Admin settings endpoints
//!
//! Runtime-tunable service settings stored in the database, separate
//! from the startup configuration in opus.toml. Currently one knob: the
//! inference model override, applied per analysis request without a
//! restart. The response also reports service bookkeeping values.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::settings;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// Stored model override, null when the configured default applies
    pub llm_model: Option<String>,
    /// Model from configuration, used when no override is stored
    pub default_llm_model: String,
    /// Timestamp of the last liked-songs refresh, any user
    pub liked_refreshed_at: Option<String>,
}

async fn settings_response(state: &AppState) -> Result<SettingsResponse, ApiError> {
    Ok(SettingsResponse {
        llm_model: settings::get_llm_model(&state.db).await?,
        default_llm_model: state.config.llm_model.clone(),
        liked_refreshed_at: settings::get_liked_refreshed_at(&state.db).await?,
    })
}

/// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ApiError> {
    Ok(Json(settings_response(&state).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsBody {
    /// New model override; an empty string clears the override
    pub llm_model: Option<String>,
}

/// POST /api/admin/settings
///
/// Partial update. Absent fields are left unchanged.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<UpdateSettingsBody>,
) -> Result<Json<SettingsResponse>, ApiError> {
    if let Some(model) = body.llm_model {
        let trimmed = model.trim();
        if trimmed.is_empty() {
            settings::set_llm_model(&state.db, None).await?;
            info!("Inference model override cleared");
        } else {
            settings::set_llm_model(&state.db, Some(trimmed)).await?;
            info!(model = trimmed, "Inference model override set");
        }
    }

    Ok(Json(settings_response(&state).await?))
}
