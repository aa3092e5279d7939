//! Spotify Web API client
//!
//! OAuth authorization-code flow against the accounts endpoint plus the
//! Web API calls the catalog needs: profile, saved tracks, batch track
//! lookup, albums, artists, search, and the seek relay for the in-browser
//! playback SDK.
//!
//! # API Reference
//! - Accounts: https://accounts.spotify.com (authorize, api/token)
//! - Web API:  https://api.spotify.com/v1
//!
//! Rate limiting is a small fixed delay between successive page/batch
//! requests, nothing more.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use opus_common::config::OpusConfig;
use opus_common::{Error, Result};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Spotify accounts service base URL
const ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Spotify Web API base URL
const API_URL: &str = "https://api.spotify.com/v1";

/// Default timeout for Spotify API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fixed delay between successive page/batch requests
const PAGE_DELAY: Duration = Duration::from_millis(250);

/// Saved-tracks page size (Spotify maximum)
const SAVED_TRACKS_PAGE: usize = 50;

/// Batch track lookup chunk size (Spotify maximum)
const TRACK_BATCH: usize = 50;

/// Refresh the access token when it expires within this many seconds
pub const REFRESH_BUFFER_SECS: i64 = 300;

/// OAuth scopes requested at login
const SCOPES: &str = "user-library-read user-read-email user-read-private streaming \
                      user-read-playback-state user-modify-playback-state";

/// Spotify Web API client
///
/// One instance is shared across handlers; per-user access tokens are
/// passed into each call rather than held by the client.
pub struct SpotifyClient {
    http_client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    /// Last request time, for the fixed inter-request delay
    rate_limiter: Arc<Mutex<Option<Instant>>>,
}

/// Token endpoint response (code exchange and refresh)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    /// Absent on refresh responses that reuse the old refresh token
    pub refresh_token: Option<String>,
}

/// Current user profile
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

/// Generic paging envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub next: Option<String>,
}

/// One saved-tracks item
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrackItem {
    pub added_at: String,
    pub track: TrackObject,
}

/// Full track object
#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    /// None for local files, which have no Spotify id
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub disc_number: Option<i64>,
    #[serde(default)]
    pub track_number: Option<i64>,
    pub album: Option<AlbumObject>,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
}

/// Album object (simplified or full)
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub id: Option<String>,
    pub name: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

impl AlbumObject {
    /// URL of the first (largest) cover image, if any
    pub fn image_url(&self) -> Option<String> {
        self.images.first().map(|image| image.url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageObject {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub id: Option<String>,
    pub name: String,
}

/// Track inside an album listing (no album field)
#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedTrackObject {
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub disc_number: Option<i64>,
    #[serde(default)]
    pub track_number: Option<i64>,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
}

/// Full album with its track listing
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumWithTracks {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageObject>,
    pub tracks: Paging<SimplifiedTrackObject>,
}

impl AlbumWithTracks {
    pub fn image_url(&self) -> Option<String> {
        self.images.first().map(|image| image.url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TracksEnvelope {
    /// Slots are null for ids Spotify cannot resolve
    tracks: Vec<Option<TrackObject>>,
}

/// Search results (only requested object types are present)
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<Paging<TrackObject>>,
    pub artists: Option<Paging<ArtistObject>>,
    pub albums: Option<Paging<AlbumObject>>,
}

impl SpotifyClient {
    /// Create new Spotify client from service configuration
    pub fn new(config: &OpusConfig) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
            rate_limiter: Arc::new(Mutex::new(None)),
        }
    }

    /// Sleep so successive requests keep the fixed inter-request spacing
    async fn enforce_rate_limit(&self) {
        let mut last_request = self.rate_limiter.lock().await;

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < PAGE_DELAY {
                let sleep_duration = PAGE_DELAY - elapsed;
                debug!(
                    sleep_ms = sleep_duration.as_millis(),
                    "Rate limiting: sleeping before Spotify request"
                );
                sleep(sleep_duration).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Authorization URL the browser is redirected to at login
    pub fn login_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&scope={}&redirect_uri={}&state={}",
            ACCOUNTS_URL,
            urlencode(&self.client_id),
            urlencode(SCOPES),
            urlencode(&self.redirect_uri),
            urlencode(state)
        )
    }

    /// Basic auth header value for the accounts endpoint
    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", BASE64.encode(credentials))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = format!("{}/api/token", ACCOUNTS_URL);
        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, self.basic_auth())
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Spotify(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Spotify(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Spotify(format!("failed to parse token response: {}", e)))
    }

    /// Exchange an authorization code for a token pair
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        debug!("Exchanging authorization code for tokens");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    /// Obtain a fresh access token from a refresh token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("Refreshing Spotify access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, access_token: &str) -> Result<T> {
        self.enforce_rate_limit().await;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Spotify(format!("API request failed: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized("Spotify rejected the access token".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Spotify(format!("API returned {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Spotify(format!("failed to parse API response: {}", e)))
    }

    /// Current user's profile
    pub async fn current_user(&self, access_token: &str) -> Result<UserProfile> {
        self.get_json(&format!("{}/me", API_URL), access_token).await
    }

    /// All saved ("liked") tracks, fetched page by page
    ///
    /// Pages of 50 with a fixed delay between page fetches; local files
    /// (tracks with no Spotify id) are skipped.
    pub async fn fetch_all_saved_tracks(&self, access_token: &str) -> Result<Vec<SavedTrackItem>> {
        let mut all = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!(
                "{}/me/tracks?limit={}&offset={}",
                API_URL, SAVED_TRACKS_PAGE, offset
            );
            let page: Paging<SavedTrackItem> = self.get_json(&url, access_token).await?;
            let fetched = page.items.len();

            all.extend(page.items.into_iter().filter(|item| item.track.id.is_some()));

            debug!(offset, fetched, total = page.total, "Fetched saved-tracks page");

            offset += fetched;
            if page.next.is_none() || fetched == 0 {
                break;
            }
        }

        Ok(all)
    }

    /// Batch track lookup, chunked at the API limit of 50 ids
    pub async fn get_tracks(&self, access_token: &str, ids: &[String]) -> Result<Vec<TrackObject>> {
        let mut all = Vec::new();

        for chunk in ids.chunks(TRACK_BATCH) {
            let url = format!("{}/tracks?ids={}", API_URL, chunk.join(","));
            let envelope: TracksEnvelope = self.get_json(&url, access_token).await?;
            all.extend(envelope.tracks.into_iter().flatten());
        }

        Ok(all)
    }

    /// Album with its full track listing
    pub async fn get_album(&self, access_token: &str, album_id: &str) -> Result<AlbumWithTracks> {
        self.get_json(&format!("{}/albums/{}", API_URL, album_id), access_token)
            .await
    }

    /// Single artist lookup
    pub async fn get_artist(&self, access_token: &str, artist_id: &str) -> Result<ArtistObject> {
        self.get_json(&format!("{}/artists/{}", API_URL, artist_id), access_token)
            .await
    }

    /// Catalog search (`kinds` is the comma-separated type list, e.g.
    /// "track,artist")
    pub async fn search(
        &self,
        access_token: &str,
        query: &str,
        kinds: &str,
        limit: usize,
    ) -> Result<SearchResponse> {
        let url = format!(
            "{}/search?q={}&type={}&limit={}",
            API_URL,
            urlencode(query),
            urlencode(kinds),
            limit
        );
        self.get_json(&url, access_token).await
    }

    /// Relay a seek to the user's active playback device
    pub async fn seek(
        &self,
        access_token: &str,
        position_ms: u64,
        device_id: Option<&str>,
    ) -> Result<()> {
        let mut url = format!("{}/me/player/seek?position_ms={}", API_URL, position_ms);
        if let Some(device) = device_id {
            url.push_str(&format!("&device_id={}", urlencode(device)));
        }

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(access_token)
            .header(header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| Error::Spotify(format!("seek request failed: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized("Spotify rejected the access token".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Spotify(format!("seek returned {}: {}", status, body)));
        }

        Ok(())
    }
}

/// Percent-encode a query-string component
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
