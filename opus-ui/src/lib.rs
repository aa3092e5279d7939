//! opus-ui library - liked songs browser and classical catalog
//!
//! One service: Spotify OAuth sign-in, liked-songs browsing with
//! classification badges, LLM-assisted metadata inference, admin catalog
//! curation, and playback progress fan-out over SSE.

use axum::Router;
use chrono::{DateTime, Utc};
use opus_common::config::OpusConfig;
use opus_common::events::EventBus;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub mod api;
pub mod clock;
pub mod db;
pub mod error;
pub mod player;
pub mod services;

use clock::Clock;
use player::PlayerStateStore;
use services::inference::InferenceClient;
use services::liked_cache::LikedSongsCache;
use services::spotify::SpotifyClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<OpusConfig>,
    pub event_bus: EventBus,
    pub spotify: Arc<SpotifyClient>,
    pub inference: Arc<InferenceClient>,
    pub liked_cache: Arc<LikedSongsCache>,
    pub player: Arc<PlayerStateStore>,
    /// Pending OAuth CSRF states with their creation times
    pub oauth_states: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl AppState {
    /// Create new application state with system-clock stores
    pub fn new(db: SqlitePool, config: OpusConfig) -> Self {
        let event_bus = EventBus::new(256);
        let clock = Clock::system();
        Self {
            db,
            spotify: Arc::new(SpotifyClient::new(&config)),
            inference: Arc::new(InferenceClient::new(&config)),
            liked_cache: Arc::new(LikedSongsCache::new(clock.clone())),
            player: Arc::new(PlayerStateStore::new(clock, event_bus.clone())),
            config: Arc::new(config),
            event_bus,
            oauth_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Build application router
///
/// Three access tiers: public (pages, health, OAuth), session (liked
/// songs, playback, catalog browse), and admin (queue review, analysis,
/// catalog curation).
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post, put};

    // Admin routes under /api/admin: session middleware runs first,
    // then the admin gate
    let admin = Router::new()
        .route(
            "/api/admin/queue",
            get(api::queue::get_queue_page).post(api::queue::enqueue),
        )
        .route("/api/admin/queue/:track_id/status", post(api::queue::set_status))
        .route("/api/admin/analyze/track", post(api::analyze::analyze_track))
        .route("/api/admin/analyze/tracks", post(api::analyze::analyze_tracks))
        .route("/api/admin/analyze/album", post(api::analyze::analyze_album))
        .route("/api/admin/tracks/save", post(api::tracks::save_track))
        .route("/api/admin/tracks/:id/movements", delete(api::tracks::unlink_track))
        .route("/api/admin/works/check", post(api::works::check_works))
        .route(
            "/api/admin/works/check-movement",
            post(api::works::check_work_and_movement),
        )
        .route("/api/admin/works/:id", put(api::works::update_work))
        .route("/api/admin/works/:id/movements", post(api::works::create_movement))
        .route(
            "/api/admin/movements/:id",
            put(api::works::rename_movement).delete(api::works::delete_movement),
        )
        .route("/api/admin/composers", post(api::composers::create_composer))
        .route("/api/admin/composers/search", get(api::composers::search_artists))
        .route("/api/admin/composers/import", post(api::composers::import_composer))
        .route("/api/admin/composers/:id", put(api::composers::update_composer))
        .route(
            "/api/admin/settings",
            get(api::settings::get_settings).post(api::settings::update_settings),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::admin_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::session_middleware,
        ));

    // Session routes (any signed-in user)
    let session = Router::new()
        .route("/api/me", get(api::auth::me))
        .route("/auth/logout", post(api::auth::logout))
        .route("/api/liked", get(api::liked::get_liked_songs))
        .route("/api/liked/refresh", post(api::liked::refresh_liked_songs))
        .route(
            "/api/player/state",
            get(api::player::get_state).post(api::player::report_state),
        )
        .route("/api/player/events", get(api::player::event_stream))
        .route("/api/player/seek", post(api::player::seek))
        .route("/api/player/token", get(api::player::playback_token))
        .route("/api/works", get(api::works::list_works))
        .route("/api/works/:id", get(api::works::get_work))
        .route("/api/composers", get(api::composers::list_composers))
        .route("/api/composers/:id", get(api::composers::get_composer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::session_middleware,
        ));

    // Public routes (no session)
    let public = Router::new()
        .route("/", get(api::ui::serve_index))
        .route("/admin", get(api::ui::serve_admin))
        .route("/static/app.js", get(api::ui::serve_app_js))
        .route("/static/player.js", get(api::ui::serve_player_js))
        .route("/static/admin.js", get(api::ui::serve_admin_js))
        .route("/static/style.css", get(api::ui::serve_style_css))
        .route("/api/buildinfo", get(api::health::get_build_info))
        .route("/auth/login", get(api::auth::login))
        .route("/auth/callback", get(api::auth::callback))
        .merge(api::health_routes());

    Router::new()
        .merge(admin)
        .merge(session)
        .merge(public)
        .with_state(state)
}
