//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Service configuration loaded from `opus.toml` with environment overrides.
///
/// Resolution per key: environment variable (highest priority), then the
/// TOML file in the root folder, then the compiled default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpusConfig {
    /// Listen address for the HTTP server
    pub bind_address: String,
    /// Spotify application client id
    pub spotify_client_id: String,
    /// Spotify application client secret
    pub spotify_client_secret: String,
    /// OAuth redirect URI registered with the Spotify application
    pub spotify_redirect_uri: String,
    /// Base URL of the chat-completions endpoint used for metadata inference
    pub llm_base_url: String,
    /// API key for the inference provider
    pub llm_api_key: String,
    /// Model name passed to the inference provider
    pub llm_model: String,
    /// Spotify username granted access to the admin surface.
    /// Empty string disables the admin endpoints entirely.
    pub admin_username: String,
}

impl Default for OpusConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5750".to_string(),
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            spotify_redirect_uri: "http://127.0.0.1:5750/auth/callback".to_string(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: String::new(),
            llm_model: "gpt-4o-mini".to_string(),
            admin_username: String::new(),
        }
    }
}

impl OpusConfig {
    /// Load configuration from `<root>/opus.toml` (if present) and apply
    /// environment variable overrides.
    pub fn load(root_folder: &Path) -> Result<Self> {
        let config_path = root_folder.join("opus.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<OpusConfig>(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", config_path, e)))?
        } else {
            OpusConfig::default()
        };

        // Environment overrides (highest priority)
        if let Ok(v) = std::env::var("OPUS_BIND_ADDRESS") {
            config.bind_address = v;
        }
        if let Ok(v) = std::env::var("SPOTIFY_CLIENT_ID") {
            config.spotify_client_id = v;
        }
        if let Ok(v) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            config.spotify_client_secret = v;
        }
        if let Ok(v) = std::env::var("SPOTIFY_REDIRECT_URI") {
            config.spotify_redirect_uri = v;
        }
        if let Ok(v) = std::env::var("OPUS_LLM_BASE_URL") {
            config.llm_base_url = v;
        }
        if let Ok(v) = std::env::var("OPUS_LLM_API_KEY") {
            config.llm_api_key = v;
        }
        if let Ok(v) = std::env::var("OPUS_LLM_MODEL") {
            config.llm_model = v;
        }
        if let Ok(v) = std::env::var("OPUS_ADMIN_USERNAME") {
            config.admin_username = v;
        }

        Ok(config)
    }

    /// Validate that the fields required for sign-in are present.
    pub fn validate(&self) -> Result<()> {
        if self.spotify_client_id.is_empty() {
            return Err(Error::Config(
                "spotify_client_id is not set (opus.toml or SPOTIFY_CLIENT_ID)".to_string(),
            ));
        }
        if self.spotify_client_secret.is_empty() {
            return Err(Error::Config(
                "spotify_client_secret is not set (opus.toml or SPOTIFY_CLIENT_SECRET)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `OPUS_ROOT` environment variable
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("OPUS_ROOT") {
        return PathBuf::from(path);
    }

    // Priority 3: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/opus
        dirs::data_local_dir()
            .map(|d| d.join("opus"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/opus"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/opus
        dirs::data_dir()
            .map(|d| d.join("opus"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/opus"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\opus
        dirs::data_local_dir()
            .map(|d| d.join("opus"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\opus"))
    } else {
        PathBuf::from("./opus_data")
    }
}

/// Create the root folder if missing and return the database path inside it.
pub fn ensure_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join("opus.db"))
}
