//! End-to-end smoke tests over the HTTP surface.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use panowalk_api::{create_api_router, AppState};
use panowalk_cache::{Cache, GeofenceIndex};
use panowalk_core::{Link, PanoId, PanoMetadata, Settings};
use panowalk_engine::{SessionEngine, TaskStore};
use panowalk_preload::{
    MetadataSource, Pacing, PreloadError, PreloadResult, Preloader, RetryPolicy, TilesSource,
};

struct NullTiles;

#[async_trait::async_trait]
impl TilesSource for NullTiles {
    async fn fetch_tile(
        &self,
        _pano_id: &PanoId,
        _zoom: u8,
        _x: u32,
        _y: u32,
    ) -> PreloadResult<Vec<u8>> {
        Err(PreloadError::Status(503))
    }
}

struct NullMetadata;

#[async_trait::async_trait]
impl MetadataSource for NullMetadata {
    async fn fetch_metadata(&self, _pano_id: &PanoId) -> PreloadResult<PanoMetadata> {
        Err(PreloadError::Status(503))
    }
}

fn pano_jpeg() -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 32, image::Rgb([60, 80, 100]));
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), 90);
    img.write_with_encoder(encoder).unwrap();
    bytes
}

fn app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::with_base_dir(dir.path());
    settings.render_output_size = (64, 48);
    let settings = Arc::new(settings);

    let cache = Arc::new(Cache::open(settings.cache_db_path(), settings.panoramas_dir()).unwrap());
    let jpeg = pano_jpeg();
    for (id, lat, lng, links) in [
        ("P0", 35.0, 139.0, vec![("P1", 90.0), ("P2", 180.0)]),
        ("P1", 35.0, 139.001, vec![("P0", 270.0)]),
        ("P2", 34.999, 139.0, vec![("P0", 0.0)]),
    ] {
        cache
            .put_meta(&PanoMetadata {
                pano_id: PanoId::new(id),
                lat,
                lng,
                capture_date: None,
                center_heading: 0.0,
                links: links
                    .into_iter()
                    .map(|(t, h)| Link {
                        pano_id: PanoId::new(t),
                        heading: h,
                        distance_meters: None,
                        is_virtual: false,
                    })
                    .collect(),
                fetched_at: Utc::now(),
                source: "fixture".to_string(),
            })
            .unwrap();
        cache
            .put_image(&PanoId::new(id), settings.panorama_zoom_level, &jpeg)
            .unwrap();
    }

    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(
        settings.geofence_config_path(),
        r#"{"g1": ["P0", "P1", "P2"]}"#,
    )
    .unwrap();
    std::fs::create_dir_all(settings.tasks_dir()).unwrap();
    std::fs::write(
        settings.tasks_dir().join("nav_T1.json"),
        r#"{"task_type": "navigation_to_poi", "geofence": "g1", "spawn_point": "P0",
            "spawn_heading": 0.0, "description": "Walk to the corner.",
            "target_pano_ids": ["P1"]}"#,
    )
    .unwrap();

    let geofences = Arc::new(GeofenceIndex::load(settings.geofence_config_path()).unwrap());
    let tasks = Arc::new(TaskStore::new(settings.tasks_dir()));
    let engine = Arc::new(
        SessionEngine::new(
            Arc::clone(&cache),
            Arc::clone(&geofences),
            Arc::clone(&tasks),
            Arc::clone(&settings),
        )
        .unwrap(),
    );
    let preloader = Arc::new(Preloader::new(
        Arc::clone(&cache),
        Arc::new(NullTiles),
        Arc::new(NullMetadata),
        RetryPolicy::new(1, 2.0),
        Pacing::none(),
        2,
    ));
    let registry = preloader.registry();

    let state = AppState {
        engine,
        cache,
        geofences,
        preloader,
        registry,
        settings,
    };
    (dir, create_api_router(state))
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test(flavor = "multi_thread")]
async fn full_session_over_http() {
    let (_dir, app) = app();

    // Create a session.
    let (status, body) = request(
        &app,
        "POST",
        "/api/session/create",
        Some(json!({"agent_id": "agent_1", "task_id": "nav_T1", "mode": "agent"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["session_id"].as_str().unwrap().to_string();
    let moves = body["observation"]["available_moves"].as_array().unwrap();
    assert_eq!(moves.len(), 2);
    assert_eq!(moves[0]["id"], 1);
    assert_eq!(moves[0]["direction"], "right");
    assert_eq!(moves[1]["direction"], "back");

    // The rendered frame is fetchable.
    let image_url = body["observation"]["current_image"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(Request::builder().uri(&image_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "image/jpeg"
    );

    // Move along the first edge.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/session/{}/action", session_id),
        Some(json!({"type": "move", "move_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["done"], false);
    assert_eq!(body["observation"]["heading"], 90.0);

    // Invalid move id: success false, state untouched.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/session/{}/action", session_id),
        Some(json!({"type": "move", "move_id": 99})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_kind"], "action_invalid");

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/session/{}/state", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step_count"], 1);
    assert_eq!(body["status"], "running");

    // Stop with an answer; summary comes back on end and in the log list.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/session/{}/action", session_id),
        Some(json!({"type": "stop", "answer": "yes"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["done"], true);
    assert_eq!(body["done_reason"], "stopped");

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/session/{}/end", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["submitted_answer"], "yes");
    assert_eq!(body["reached_target"], true);

    // Replay log has start + move + stop.
    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/sessions/{}/log", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["event"], "session_start");

    // Actions after termination are rejected.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/session/{}/action", session_id),
        Some(json!({"type": "move", "move_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_kind"], "session_terminated");
}

#[tokio::test(flavor = "multi_thread")]
async fn task_and_geofence_endpoints() {
    let (_dir, app) = app();

    let (status, body) = request(&app, "GET", "/api/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"][0]["task_id"], "nav_T1");

    let (status, body) = request(&app, "GET", "/api/tasks/nav_T1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spawn_point"], "P0");
    assert_eq!(body["geofence"], "g1");

    let (status, body) = request(&app, "GET", "/api/tasks/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "not_found");

    let (status, body) = request(&app, "GET", "/api/geofences", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["geofences"][0]["name"], "g1");
    assert_eq!(body["geofences"][0]["pano_count"], 3);

    // Everything is already cached, so preload completes with no upstream
    // calls even though the sources always fail.
    let (status, _body) = request(
        &app,
        "POST",
        "/api/geofences/g1/preload",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Give the spawned job a moment to drain the (empty) queue.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let (status, body) = request(&app, "GET", "/api/geofences/g1/preload/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["percentage"], 100.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_action_type_is_action_invalid() {
    let (_dir, app) = app();
    let (_, body) = request(
        &app,
        "POST",
        "/api/session/create",
        Some(json!({"agent_id": "a", "task_id": "nav_T1"})),
    )
    .await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/session/{}/action", session_id),
        Some(json!({"type": "teleport"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_kind"], "action_invalid");
}

#[tokio::test(flavor = "multi_thread")]
async fn player_progress_reflects_attempts() {
    let (_dir, app) = app();

    let (_, body) = request(
        &app,
        "POST",
        "/api/session/create",
        Some(json!({"agent_id": "player_9", "task_id": "nav_T1", "mode": "human"})),
    )
    .await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = request(&app, "GET", "/api/players/player_9/progress", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_tasks"], 1);
    assert_eq!(body["not_started"], 1);

    request(
        &app,
        "POST",
        &format!("/api/session/{}/end", session_id),
        None,
    )
    .await;

    let (_, body) = request(&app, "GET", "/api/players/player_9/progress", None).await;
    assert_eq!(body["tasks"][0]["status"], "stopped");
    assert_eq!(body["tasks"][0]["attempts"], 1);
}
