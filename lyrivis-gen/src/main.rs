//! lyrivis-gen - Lyric Image Generation Microservice
//!
//! Generates one AI image per lyric line of a track and serves job
//! progress through a polled status API. Lyric retrieval and the image
//! generation model are external collaborators reached over HTTP.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lyrivis_gen::services::{
    DedupCache, HttpImageGenerator, HttpLyricsProvider, ImageStore, Orchestrator,
    OrchestratorSettings,
};
use lyrivis_gen::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Step 1: Resolve root folder (CLI arg → env → TOML → OS default)
    let cli_root = std::env::args().nth(1);
    let root_folder =
        lyrivis_common::config::resolve_root_folder(cli_root.as_deref(), "LYRIVIS_ROOT")
            .map_err(|e| anyhow::anyhow!("Failed to resolve root folder: {}", e))?;
    lyrivis_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 2: Load service TOML and initialize tracing from it
    let config = lyrivis_common::config::load_toml_config(&root_folder, "lyrivis-gen")
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting lyrivis-gen (Lyric Image Generation) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", root_folder.display());

    // Step 3: Open or create database
    let db_path = lyrivis_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = lyrivis_gen::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 4: Wire up services
    let store = ImageStore::new(&root_folder);
    store
        .ensure_dir()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create image store: {}", e))?;

    let generator = Arc::new(HttpImageGenerator::new(
        config.generator_endpoint.clone(),
        config.generator_api_key.clone(),
    ));
    let lyrics = Arc::new(HttpLyricsProvider::new(config.lyrics_base_url.clone()));
    let orchestrator = Orchestrator::new(
        DedupCache::new(db_pool.clone()),
        store,
        generator,
        OrchestratorSettings::from_config(&config),
    );

    let state = AppState::new(db_pool, orchestrator, lyrics);
    let app = lyrivis_gen::build_router(state);

    // Step 5: Serve
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
