//! LLM metadata inference client
//!
//! Converts a track title (plus artist names, optionally a whole-album
//! track list for cross-track context) into structured classical metadata
//! via a chat-completions endpoint. Every output field is independently
//! nullable: "unknown" is the absence of a value, never a sentinel.
//!
//! Batch contract: an album call must return exactly one result per input
//! track, in input order. A count mismatch is a hard failure, surfaced to
//! the caller without retry.

use opus_common::config::OpusConfig;
use opus_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Default timeout for inference requests (model calls are slow)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed delay between successive inference requests
const REQUEST_DELAY: Duration = Duration::from_millis(500);

/// Structured guess for one track
///
/// Each field is independently nullable when unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferredMetadata {
    /// Whether the track appears to be a classical recording at all
    pub is_classical: Option<bool>,
    /// Composer name ("Johann Sebastian Bach")
    pub composer: Option<String>,
    /// Formal work title ("Harpsichord Concerto No. 1 in D minor")
    pub work_title: Option<String>,
    /// Informal name ("Moonlight")
    pub nickname: Option<String>,
    /// Catalog scheme ("BWV", "Op", "K")
    pub catalog_system: Option<String>,
    /// Catalog index ("1052")
    pub catalog_number: Option<String>,
    /// 1-based movement number within the work
    pub movement_number: Option<i64>,
    /// Movement title ("Allegro")
    pub movement_title: Option<String>,
    /// Musical form ("concerto", "sonata")
    pub form: Option<String>,
    pub year_composed: Option<i64>,
}

impl InferredMetadata {
    /// All-null result, substituted by callers when a single-track
    /// inference fails so one bad track does not abort a batch
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct AlbumInferenceEnvelope {
    tracks: Vec<InferredMetadata>,
}

const SINGLE_TRACK_SYSTEM_PROMPT: &str = "\
You identify classical music metadata from Spotify track titles. \
Respond with a single JSON object with these keys, using null for anything \
you cannot determine: is_classical (boolean), composer (full name), \
work_title (formal title without catalog number or movement), nickname, \
catalog_system (e.g. \"BWV\", \"Op\", \"K\"), catalog_number (string), \
movement_number (integer, 1-based), movement_title, form (e.g. \
\"concerto\"), year_composed (integer).";

const ALBUM_SYSTEM_PROMPT: &str = "\
You identify classical music metadata from Spotify track titles. You are \
given every track of one album, in order; use the shared context to keep \
composer, work and catalog fields consistent across tracks. Respond with a \
single JSON object {\"tracks\": [...]} containing EXACTLY one entry per \
input track, in input order. Each entry has the keys: is_classical \
(boolean), composer, work_title, nickname, catalog_system, catalog_number, \
movement_number (integer, 1-based), movement_title, form, year_composed, \
using null for anything you cannot determine.";

/// Metadata inference client
///
/// One instance shared across handlers; endpoint and key are fixed at
/// startup. The model comes from configuration but callers may pass a
/// per-request override (the admin settings surface stores one in the
/// database).
pub struct InferenceClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Last request time, for the fixed inter-request delay
    rate_limiter: Arc<Mutex<Option<Instant>>>,
}

impl InferenceClient {
    /// Create new inference client from service configuration
    pub fn new(config: &OpusConfig) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            rate_limiter: Arc::new(Mutex::new(None)),
        }
    }

    /// Sleep so successive requests keep the fixed inter-request spacing
    async fn enforce_rate_limit(&self) {
        let mut last_request = self.rate_limiter.lock().await;

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < REQUEST_DELAY {
                let sleep_duration = REQUEST_DELAY - elapsed;
                debug!(
                    sleep_ms = sleep_duration.as_millis(),
                    "Rate limiting: sleeping before inference request"
                );
                sleep(sleep_duration).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    async fn complete(
        &self,
        system: &'static str,
        user: String,
        model_override: Option<&str>,
    ) -> Result<String> {
        self.enforce_rate_limit().await;

        let request = ChatRequest {
            model: model_override.unwrap_or(&self.model).to_string(),
            messages: vec![
                ChatMessage { role: "system", content: system.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("inference request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "inference endpoint returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("failed to parse inference response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Inference("inference response had no choices".to_string()))
    }

    /// Infer metadata for a single track
    ///
    /// Errors propagate; the caller decides whether to substitute
    /// [`InferredMetadata::empty`] to keep a batch going.
    pub async fn infer_track(
        &self,
        title: &str,
        artists: &[String],
        model_override: Option<&str>,
    ) -> Result<InferredMetadata> {
        debug!(title, "Inferring metadata for track");

        let user = if artists.is_empty() {
            format!("Track title: {}", title)
        } else {
            format!("Track title: {}\nArtists: {}", title, artists.join(", "))
        };

        let content = self
            .complete(SINGLE_TRACK_SYSTEM_PROMPT, user, model_override)
            .await?;
        parse_single(&content)
    }

    /// Infer metadata for every track of an album in one call
    ///
    /// Returns exactly one result per input title, in input order, or an
    /// error when the model returns a different count.
    pub async fn infer_album(
        &self,
        album_name: &str,
        titles: &[String],
        model_override: Option<&str>,
    ) -> Result<Vec<InferredMetadata>> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }
        debug!(album_name, tracks = titles.len(), "Inferring metadata for album");

        let mut user = format!("Album: {}\nTracks:\n", album_name);
        for (i, title) in titles.iter().enumerate() {
            user.push_str(&format!("{}. {}\n", i + 1, title));
        }

        let content = self.complete(ALBUM_SYSTEM_PROMPT, user, model_override).await?;
        parse_album(&content, titles.len())
    }
}

fn parse_single(content: &str) -> Result<InferredMetadata> {
    serde_json::from_str(content)
        .map_err(|e| Error::Inference(format!("failed to parse inferred metadata: {}", e)))
}

fn parse_album(content: &str, expected: usize) -> Result<Vec<InferredMetadata>> {
    let envelope: AlbumInferenceEnvelope = serde_json::from_str(content)
        .map_err(|e| Error::Inference(format!("failed to parse inferred metadata: {}", e)))?;

    if envelope.tracks.len() != expected {
        return Err(Error::Inference(format!(
            "album inference returned {} results for {} tracks",
            envelope.tracks.len(),
            expected
        )));
    }

    Ok(envelope.tracks)
}
