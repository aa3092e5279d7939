//! OAuth sign-in, session middleware and admin gating
//!
//! Login redirects to the Spotify authorize page with a random CSRF
//! state; the callback exchanges the code, upserts the user, persists the
//! token pair and sets an HttpOnly session cookie backed by a sessions
//! row. The session middleware resolves the cookie to a user on every
//! protected request and refreshes the access token when it is within
//! five minutes of expiry.

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use opus_common::db::models::{OAuthTokens, Session, User};
use opus_common::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::users;
use crate::error::ApiError;
use crate::services::spotify::REFRESH_BUFFER_SECS;
use crate::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "opus_session";

/// Session lifetime
const SESSION_TTL_DAYS: i64 = 30;

/// Pending OAuth states expire after this long
const STATE_TTL_MINUTES: i64 = 10;

/// Authenticated requester, inserted into request extensions by the
/// session middleware
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user: User,
    /// Access token, already refreshed if it was near expiry
    pub access_token: String,
}

/// Hex-encoded 256-bit random token (sessions and OAuth state)
fn random_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// GET /auth/login - redirect to the Spotify authorize page
pub async fn login(State(state): State<AppState>) -> Response {
    let oauth_state = random_token();
    {
        let mut states = state.oauth_states.lock().unwrap_or_else(|e| e.into_inner());
        let cutoff = Utc::now() - Duration::minutes(STATE_TTL_MINUTES);
        states.retain(|_, created| *created > cutoff);
        states.insert(oauth_state.clone(), Utc::now());
    }

    Redirect::to(&state.spotify.login_url(&oauth_state)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/callback - exchange the authorization code for a session
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> std::result::Result<Response, ApiError> {
    if let Some(error) = params.error {
        warn!(error, "Spotify authorization was refused");
        return Ok(Redirect::to("/?error=login_refused").into_response());
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_string()))?;
    let oauth_state = params
        .state
        .ok_or_else(|| ApiError::BadRequest("missing OAuth state".to_string()))?;

    {
        let mut states = state.oauth_states.lock().unwrap_or_else(|e| e.into_inner());
        let cutoff = Utc::now() - Duration::minutes(STATE_TTL_MINUTES);
        match states.remove(&oauth_state) {
            Some(created) if created > cutoff => {}
            _ => {
                return Err(ApiError::Unauthorized(
                    "unknown or expired OAuth state".to_string(),
                ))
            }
        }
    }

    let tokens = state.spotify.exchange_code(&code).await?;
    let profile = state.spotify.current_user(&tokens.access_token).await?;

    let user = users::find_or_create_user(
        &state.db,
        &profile.id,
        profile.display_name.as_deref(),
    )
    .await?;

    let now = Utc::now();
    users::save_tokens(
        &state.db,
        &OAuthTokens {
            user_id: user.guid.clone(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.unwrap_or_default(),
            expires_at: now + Duration::seconds(tokens.expires_in),
        },
    )
    .await?;

    let session = Session {
        token: random_token(),
        user_id: user.guid.clone(),
        expires_at: now + Duration::days(SESSION_TTL_DAYS),
    };
    users::save_session(&state.db, &session).await?;

    info!(user = %profile.id, "User signed in");

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.token,
        SESSION_TTL_DAYS * 24 * 3600
    );
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Redirect::to("/")).into_response())
}

/// POST /auth/logout - drop the session row and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> std::result::Result<Response, ApiError> {
    if let Some(token) = session_token_from_headers(&headers) {
        users::delete_session(&state.db, &token).await?;
    }

    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Redirect::to("/")).into_response())
}

/// GET /api/me - the signed-in user
pub async fn me(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedUser>,
) -> Json<serde_json::Value> {
    let is_admin = is_admin_user(&state, &authed.user);
    Json(json!({
        "user_id": authed.user.guid,
        "spotify_user_id": authed.user.spotify_user_id,
        "display_name": authed.user.display_name,
        "is_admin": is_admin,
    }))
}

/// Extract the session token from the Cookie header
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let pair = pair.trim();
        if let Some(value) = pair.strip_prefix(SESSION_COOKIE) {
            if let Some(value) = value.strip_prefix('=') {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Load the requester's access token, refreshing it when it expires
/// within the five-minute buffer
pub async fn ensure_fresh_access_token(state: &AppState, user_id: &str) -> Result<String> {
    let tokens = users::load_tokens(&state.db, user_id)
        .await?
        .ok_or_else(|| Error::Unauthorized("no Spotify tokens for user".to_string()))?;

    let now = Utc::now();
    if !tokens.expires_within(now, REFRESH_BUFFER_SECS) {
        return Ok(tokens.access_token);
    }

    debug!(user_id, "Access token near expiry, refreshing");
    let refreshed = state.spotify.refresh_access_token(&tokens.refresh_token).await?;
    let new_tokens = OAuthTokens {
        user_id: user_id.to_string(),
        access_token: refreshed.access_token.clone(),
        // Spotify usually omits the refresh token on refresh; keep the old one
        refresh_token: refreshed.refresh_token.unwrap_or(tokens.refresh_token),
        expires_at: now + Duration::seconds(refreshed.expires_in),
    };
    users::save_tokens(&state.db, &new_tokens).await?;

    Ok(new_tokens.access_token)
}

/// Session middleware
///
/// Resolves the session cookie to a user and a fresh access token, and
/// inserts [`AuthedUser`] into request extensions. Requests without a
/// valid session fail immediately with 401.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = session_token_from_headers(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("not signed in".to_string()))?;

    let session = users::load_session(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown session".to_string()))?;

    if session.is_expired(Utc::now()) {
        users::delete_session(&state.db, &token).await?;
        return Err(ApiError::Unauthorized("session expired".to_string()));
    }

    let user = users::load_user(&state.db, &session.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown user".to_string()))?;

    let access_token = ensure_fresh_access_token(&state, &user.guid).await?;

    request
        .extensions_mut()
        .insert(AuthedUser { user, access_token });

    Ok(next.run(request).await)
}

/// True when this user is the configured admin
pub fn is_admin_user(state: &AppState, user: &User) -> bool {
    !state.config.admin_username.is_empty()
        && user.spotify_user_id == state.config.admin_username
}

/// Admin gate, layered inside the session middleware
///
/// A username check against the configured admin user, not a role
/// system. An empty `admin_username` disables every admin endpoint.
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let authed = request
        .extensions()
        .get::<AuthedUser>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("not signed in".to_string()))?;

    if !is_admin_user(&state, &authed.user) {
        return Err(ApiError::Forbidden("admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_token_parsed_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; opus_session=abc123; theme=dark"),
        );
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_or_empty_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert!(session_token_from_headers(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("opus_session="));
        assert!(session_token_from_headers(&headers).is_none());
    }

    #[test]
    fn test_random_tokens_are_unique_hex() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
