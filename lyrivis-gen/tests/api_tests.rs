//! Integration tests for the lyrivis-gen HTTP API
//!
//! Router-level tests with in-memory collaborators; requests are driven
//! through `tower::ServiceExt::oneshot` without binding a socket.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use lyrivis_common::{Error, Result};
use lyrivis_gen::models::LyricLine;
use lyrivis_gen::services::{
    DedupCache, ImageGenerator, ImageStore, LyricsProvider, Orchestrator, OrchestratorSettings,
};
use lyrivis_gen::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

/// Lyrics fake: one known track, one lyric-less track, one flaky track
struct FakeLyrics;

#[async_trait]
impl LyricsProvider for FakeLyrics {
    async fn lines(&self, track_id: &str) -> Result<Vec<LyricLine>> {
        match track_id {
            "known-track" => Ok(vec![
                LyricLine {
                    start_time_ms: 0,
                    words: "alpha".to_string(),
                },
                LyricLine {
                    start_time_ms: 1000,
                    words: "beta".to_string(),
                },
            ]),
            "flaky" => Err(Error::Upstream("lyrics backend down".to_string())),
            other => Err(Error::NotFound(format!("No lyrics for track {}", other))),
        }
    }
}

/// Generator fake: instant single image per prompt
struct InstantGenerator;

#[async_trait]
impl ImageGenerator for InstantGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<Vec<u8>>> {
        Ok(vec![format!("png:{}", prompt).into_bytes()])
    }
}

async fn setup_app() -> (TempDir, Router) {
    let temp = TempDir::new().unwrap();
    let pool = lyrivis_gen::db::init_database_pool(&temp.path().join("lyrivis.db"))
        .await
        .unwrap();
    let store = ImageStore::new(temp.path());
    store.ensure_dir().await.unwrap();

    let orchestrator = Orchestrator::new(
        DedupCache::new(pool.clone()),
        store,
        Arc::new(InstantGenerator),
        OrchestratorSettings::default(),
    );
    let state = AppState::new(pool, orchestrator, Arc::new(FakeLyrics));
    (temp, build_router(state))
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("should read body");
    serde_json::from_slice(&bytes).expect("should parse JSON")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "lyrivis-gen");
}

#[tokio::test]
async fn generate_then_poll_to_done() {
    let (_temp, app) = setup_app().await;

    // Start a generation for a track with lyrics
    let response = app
        .clone()
        .oneshot(request("POST", "/generate/known-track"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = extract_json(response.into_body()).await;
    let generation_id = json["generation_id"].as_str().unwrap().to_string();
    uuid::Uuid::parse_str(&generation_id).expect("generation_id should be a uuid");

    // Poll until DONE
    let status_uri = format!("/generate/status/{}", generation_id);
    let mut lyrics = None;
    for _ in 0..500 {
        let response = app.clone().oneshot(request("GET", &status_uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = extract_json(response.into_body()).await;
        match snapshot["status"].as_str().unwrap() {
            "DONE" => {
                lyrics = Some(snapshot["lyrics"].clone());
                break;
            }
            "WAITING" => assert!(snapshot["queue_position"].as_u64().unwrap() >= 2),
            "IN_PROGRESS" => {
                assert!(snapshot["done"].as_u64().unwrap() <= snapshot["total"].as_u64().unwrap())
            }
            other => panic!("unexpected status {}", other),
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let lyrics = lyrics.expect("job should complete");
    let entries = lyrics.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["start_time_ms"], 0);
    assert_eq!(entries[0]["words"], "alpha");
    assert_eq!(entries[1]["start_time_ms"], 1000);
    assert_eq!(entries[1]["words"], "beta");
    assert!(entries[0]["image_uri"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    // DONE is delivered at most once: the next poll is 404
    let response = app.clone().oneshot(request("GET", &status_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn track_without_lyrics_is_unprocessable() {
    let (_temp, app) = setup_app().await;

    let response = app
        .oneshot(request("POST", "/generate/unknown-track"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "UNPROCESSABLE");
}

#[tokio::test]
async fn transient_lyrics_failure_is_internal_error() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(request("POST", "/generate/flaky")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn blank_track_id_is_rejected() {
    let (_temp, app) = setup_app().await;

    let response = app.oneshot(request("POST", "/generate/%20%20")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_generation_id_is_not_found() {
    let (_temp, app) = setup_app().await;

    let uri = format!("/generate/status/{}", uuid::Uuid::new_v4());
    let response = app.oneshot(request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_generation_id_is_rejected() {
    let (_temp, app) = setup_app().await;

    let response = app
        .oneshot(request("GET", "/generate/status/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
