//! Generation API handlers
//!
//! POST /generate/:track_id starts a job and returns its id immediately;
//! GET /generate/status/:generation_id is the poll contract through which
//! all further progress is observed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::JobSnapshot,
    AppState,
};

/// POST /generate/:track_id response
#[derive(Debug, Serialize)]
pub struct StartGenerationResponse {
    pub generation_id: Uuid,
}

/// POST /generate/:track_id
///
/// Resolve the track's lyric lines and start a generation job. Returns
/// 202 Accepted with the job id; the body continues as a detached task
/// owned by the job registry, regardless of client disconnection. A
/// track without lyrics is 422, any other lyric-fetch failure is 500.
pub async fn start_generation(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> ApiResult<(StatusCode, Json<StartGenerationResponse>)> {
    let track_id = track_id.trim();
    if track_id.is_empty() {
        return Err(ApiError::BadRequest("Track id must not be empty".to_string()));
    }

    let lines = state.lyrics.lines(track_id).await.map_err(|e| match e {
        lyrivis_common::Error::NotFound(msg) => ApiError::Unprocessable(msg),
        other => ApiError::Internal(other.to_string()),
    })?;
    if lines.is_empty() {
        return Err(ApiError::Unprocessable(format!(
            "Track {} has no lyric lines",
            track_id
        )));
    }

    let generation_id = state
        .orchestrator
        .clone()
        .submit(lines)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(
        track_id = %track_id,
        generation_id = %generation_id,
        "Generation job accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(StartGenerationResponse { generation_id }),
    ))
}

/// GET /generate/status/:generation_id
///
/// Poll a job. Shape of the snapshot depends on status; 404 once the job
/// has been deleted (never existed, already delivered DONE, or reclaimed
/// by timeout). Every successful poll resets the inactivity timer.
pub async fn generation_status(
    State(state): State<AppState>,
    Path(generation_id): Path<Uuid>,
) -> ApiResult<Json<JobSnapshot>> {
    match state.orchestrator.clone().poll(generation_id).await {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(ApiError::NotFound(format!(
            "Generation job not found: {}",
            generation_id
        ))),
    }
}

/// Build generation routes
pub fn generate_routes() -> Router<AppState> {
    Router::new()
        .route("/generate/:track_id", post(start_generation))
        .route("/generate/status/:generation_id", get(generation_status))
}
