//! Shared database models
//!
//! Identity-layer rows used by the web service's auth middleware and the
//! Spotify client. Catalog entities (composers, works, movements) live in
//! the service's own db modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An application user, keyed by their Spotify account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub guid: String,
    pub spotify_user_id: String,
    pub display_name: Option<String>,
}

/// Browser session, stored server-side and referenced by cookie token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// OAuth token pair for one user
///
/// `expires_at` is absolute; callers compare against it with a safety
/// buffer rather than trusting the raw `expires_in` from the token
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// True when the access token expires within `buffer_secs` of `now`
    ///
    /// Refreshing ahead of actual expiry keeps a token from dying mid-way
    /// through a paged fetch.
    pub fn expires_within(&self, now: DateTime<Utc>, buffer_secs: i64) -> bool {
        self.expires_at - now <= chrono::Duration::seconds(buffer_secs)
    }
}
