//! opus-ui - liked songs browser with classical catalog curation
//!
//! Signs users in with Spotify, lists their liked songs with classical
//! classifications, and hosts the admin workflow that turns LLM-inferred
//! metadata into composer/work/movement catalog rows.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use opus_common::config::{ensure_root_folder, resolve_root_folder, OpusConfig};
use opus_common::db::init_database;
use opus_ui::db::users;
use opus_ui::{build_router, AppState};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "opus-ui", about = "Liked songs browser and classical catalog")]
struct Cli {
    /// Root folder holding opus.db and opus.toml
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Opus UI (opus-ui) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();
    let root_folder = resolve_root_folder(cli.root_folder.as_deref());
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let config = OpusConfig::load(&root_folder)?;
    config.validate()?;
    if config.admin_username.is_empty() {
        warn!("admin_username is not set; admin endpoints are disabled");
    }

    let pool = init_database(&db_path).await?;

    // Drop sessions that expired while the service was down
    let purged = users::purge_expired_sessions(&pool, Utc::now()).await?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("opus-ui listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
