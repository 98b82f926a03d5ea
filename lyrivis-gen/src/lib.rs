//! lyrivis-gen library interface
//!
//! Exposes the router, state, and services for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{LyricsProvider, Orchestrator};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Job orchestrator; owner of all generation jobs
    pub orchestrator: Arc<Orchestrator>,
    /// Lyric retrieval collaborator
    pub lyrics: Arc<dyn LyricsProvider>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        orchestrator: Arc<Orchestrator>,
        lyrics: Arc<dyn LyricsProvider>,
    ) -> Self {
        Self {
            db,
            orchestrator,
            lyrics,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::health_routes())
        .with_state(state)
}
