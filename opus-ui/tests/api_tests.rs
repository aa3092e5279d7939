//! Integration tests for opus-ui API endpoints
//!
//! Tests cover:
//! - Health and build info endpoints (no auth required)
//! - Session cookie authentication and the admin gate
//! - Match queue paging and status transitions
//! - Batch analysis request validation
//! - Track save workflow end to end, including unlinking
//! - Work and movement curation endpoints
//! - Catalog existence probes
//! - Composer management
//! - Admin settings (inference model override)
//!
//! Requests that would reach Spotify or the inference provider are not
//! exercised here; seeded OAuth tokens stay fresh for the whole test so
//! the session middleware never attempts a refresh.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use opus_common::config::OpusConfig;
use opus_common::db::models::{OAuthTokens, Session, User};
use opus_ui::db::users;
use opus_ui::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method

const ADMIN_SPOTIFY_ID: &str = "opus-admin";
const ADMIN_COOKIE: &str = "admin-session-token";
const LISTENER_SPOTIFY_ID: &str = "opus-listener";
const LISTENER_COOKIE: &str = "listener-session-token";

/// Test helper: Create in-memory database with full schema
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Should create in-memory database");
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    opus_common::db::init::init_schema(&pool)
        .await
        .expect("Should initialize schema");
    pool
}

/// Test helper: Create app with test state (admin user configured)
fn setup_app(db: SqlitePool) -> axum::Router {
    let config = OpusConfig {
        admin_username: ADMIN_SPOTIFY_ID.to_string(),
        ..OpusConfig::default()
    };
    build_router(AppState::new(db, config))
}

/// Test helper: Seed a signed-in user with a session and fresh tokens
///
/// Token expiry sits one hour out so the session middleware never calls
/// the Spotify token endpoint during a test.
async fn seed_session(pool: &SqlitePool, spotify_user_id: &str, cookie_token: &str) -> User {
    let user = users::find_or_create_user(pool, spotify_user_id, Some("Test User"))
        .await
        .unwrap();
    let now = Utc::now();
    users::save_tokens(
        pool,
        &OAuthTokens {
            user_id: user.guid.clone(),
            access_token: format!("access-{}", spotify_user_id),
            refresh_token: format!("refresh-{}", spotify_user_id),
            expires_at: now + Duration::hours(1),
        },
    )
    .await
    .unwrap();
    users::save_session(
        pool,
        &Session {
            token: cookie_token.to_string(),
            user_id: user.guid.clone(),
            expires_at: now + Duration::days(30),
        },
    )
    .await
    .unwrap();
    user
}

/// Test helper: Create unauthenticated request
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create request carrying a session cookie
fn authed_request(method: &str, uri: &str, cookie_token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", format!("opus_session={}", cookie_token))
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create JSON request carrying a session cookie
fn authed_json_request(method: &str, uri: &str, cookie_token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", format!("opus_session={}", cookie_token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Test helper: Save-track request body for one Bach concerto movement
fn save_body(track_id: &str, track_number: i64, track_name: &str) -> Value {
    json!({
        "track": {
            "id": track_id,
            "name": track_name,
            "disc_number": 1,
            "track_number": track_number,
            "duration_ms": 440_000
        },
        "album": {
            "id": "album-bwv1052",
            "name": "Bach: Harpsichord Concertos",
            "release_date": "1981"
        },
        "artists": [
            { "id": "artist-bach", "name": "Johann Sebastian Bach" },
            { "id": "artist-gould", "name": "Glenn Gould" }
        ],
        "metadata": {
            "is_classical": true,
            "composer": "Johann Sebastian Bach",
            "work_title": "Harpsichord Concerto No. 1 in D minor",
            "catalog_system": "BWV",
            "catalog_number": "1052",
            "movement_number": track_number
        }
    })
}

// =============================================================================
// Health and Static Endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "opus-ui");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_endpoint_no_auth_required() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("GET", "/api/buildinfo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["version"].is_string());
    assert!(body["build_profile"].is_string());
}

#[tokio::test]
async fn test_index_page_serves_html() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("GET", "/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.starts_with("text/html"));
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_api_requires_session_cookie() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("GET", "/api/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_session_token_rejected() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(authed_request("GET", "/api/me", "no-such-session"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reports_identity_and_admin_flag() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    seed_session(&db, LISTENER_SPOTIFY_ID, LISTENER_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/me", ADMIN_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["spotify_user_id"], ADMIN_SPOTIFY_ID);
    assert_eq!(body["is_admin"], true);

    let response = app
        .oneshot(authed_request("GET", "/api/me", LISTENER_COOKIE))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let db = setup_test_db().await;
    seed_session(&db, LISTENER_SPOTIFY_ID, LISTENER_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_request("POST", "/auth/logout", LISTENER_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed_request("GET", "/api/me", LISTENER_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_endpoints_require_session() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("GET", "/api/admin/queue"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_endpoints_forbidden_for_listener() {
    let db = setup_test_db().await;
    seed_session(&db, LISTENER_SPOTIFY_ID, LISTENER_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .oneshot(authed_request("GET", "/api/admin/queue", LISTENER_COOKIE))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

// =============================================================================
// Match Queue
// =============================================================================

#[tokio::test]
async fn test_enqueue_and_page_queue() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    // Mirror row so the page renders details without a Spotify lookup
    sqlx::query("INSERT INTO spotify_tracks (id, name) VALUES (?, ?)")
        .bind("track-queued")
        .bind("Erbarme dich, mein Gott")
        .execute(&db)
        .await
        .unwrap();
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue",
            ADMIN_COOKIE,
            json!({ "track_id": "track-queued" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["enqueued"], true);

    // Second enqueue of the same track is a no-op
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue",
            ADMIN_COOKIE,
            json!({ "track_id": "track-queued" }),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["enqueued"], false);

    let response = app
        .oneshot(authed_request("GET", "/api/admin/queue?page=0", ADMIN_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pending_total"], 1);
    assert_eq!(body["page"], 0);
    assert_eq!(body["page_size"], 20);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["entries"][0]["track_id"], "track-queued");
    assert_eq!(body["entries"][0]["status"], "pending");
    assert_eq!(body["entries"][0]["track"]["name"], "Erbarme dich, mein Gott");
}

#[tokio::test]
async fn test_mark_queue_entry_failed() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    app.clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue",
            ADMIN_COOKIE,
            json!({ "track_id": "track-hopeless" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue/track-hopeless/status",
            ADMIN_COOKIE,
            json!({ "status": "failed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["track_id"], "track-hopeless");
    assert!(body["processed_at"].is_string());

    // Resolved entries leave the pending page
    let response = app
        .oneshot(authed_request("GET", "/api/admin/queue?page=0", ADMIN_COOKIE))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pending_total"], 0);
    assert_eq!(body["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_queue_status_rejects_pending() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    app.clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue",
            ADMIN_COOKIE,
            json!({ "track_id": "track-queued" }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue/track-queued/status",
            ADMIN_COOKIE,
            json!({ "status": "pending" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_queue_status_unknown_track_not_found() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue/track-never-queued/status",
            ADMIN_COOKIE,
            json!({ "status": "failed" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Batch Analysis Validation
// =============================================================================

#[tokio::test]
async fn test_analyze_tracks_rejects_empty_batch() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/analyze/tracks",
            ADMIN_COOKIE,
            json!({ "tracks": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_tracks_rejects_oversized_batch() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let tracks: Vec<_> = (0..51)
        .map(|i| json!({ "title": format!("Track {}", i) }))
        .collect();
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/analyze/tracks",
            ADMIN_COOKIE,
            json!({ "tracks": tracks }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Save Workflow
// =============================================================================

#[tokio::test]
async fn test_save_track_end_to_end() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    seed_session(&db, LISTENER_SPOTIFY_ID, LISTENER_COOKIE).await;
    let app = setup_app(db);

    // Queue the track the way a liked-songs refresh would
    app.clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/queue",
            ADMIN_COOKIE,
            json!({ "track_id": "track-save-1" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = extract_json(response.into_body()).await;
    assert_eq!(first["work"]["title"], "Harpsichord Concerto No. 1 in D minor");
    assert_eq!(first["work"]["catalog_system"], "BWV");
    assert_eq!(first["movement"]["number"], 1);
    assert_eq!(first["composer"]["name"], "Johann Sebastian Bach");

    // Saving marks the queue entry matched
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/admin/queue?page=0", ADMIN_COOKIE))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pending_total"], 0);

    // Identical save resolves to the same rows
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();
    let second = extract_json(response.into_body()).await;
    assert_eq!(second["work"]["guid"], first["work"]["guid"]);
    assert_eq!(second["movement"]["guid"], first["movement"]["guid"]);

    // The catalog is visible to any signed-in listener
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/works", LISTENER_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let works = extract_json(response.into_body()).await;
    assert_eq!(works.as_array().unwrap().len(), 1);
    assert_eq!(works[0]["composer_name"], "Johann Sebastian Bach");

    let work_id = first["work"]["guid"].as_str().unwrap().to_string();
    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/api/works/{}", work_id),
            LISTENER_COOKIE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = extract_json(response.into_body()).await;
    assert_eq!(detail["movements"].as_array().unwrap().len(), 1);
    assert_eq!(detail["movements"][0]["tracks"].as_array().unwrap().len(), 1);
    assert_eq!(detail["movements"][0]["tracks"][0]["id"], "track-save-1");
    assert_eq!(detail["recordings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unlink_track_removes_link() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    app.clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            "/api/admin/tracks/track-save-1/movements",
            ADMIN_COOKIE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["track_id"], "track-save-1");
    assert_eq!(body["removed_links"], 1);

    // Second unlink finds nothing
    let response = app
        .oneshot(authed_request(
            "DELETE",
            "/api/admin/tracks/track-save-1/movements",
            ADMIN_COOKIE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Work and Movement Curation
// =============================================================================

#[tokio::test]
async fn test_movement_delete_guarded_while_linked() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();
    let outcome = extract_json(response.into_body()).await;
    let movement_id = outcome["movement"]["guid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/admin/movements/{}", movement_id),
            ADMIN_COOKIE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");

    // After unlinking the track the delete goes through
    app.clone()
        .oneshot(authed_request(
            "DELETE",
            "/api/admin/tracks/track-save-1/movements",
            ADMIN_COOKIE,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/admin/movements/{}", movement_id),
            ADMIN_COOKIE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "deleted");
}

#[tokio::test]
async fn test_create_and_rename_movement() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();
    let outcome = extract_json(response.into_body()).await;
    let work_id = outcome["work"]["guid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/admin/works/{}/movements", work_id),
            ADMIN_COOKIE,
            json!({ "number": 2, "title": "Adagio" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let movement = extract_json(response.into_body()).await;
    assert_eq!(movement["number"], 2);
    assert_eq!(movement["title"], "Adagio");

    let movement_id = movement["guid"].as_str().unwrap().to_string();
    let response = app
        .oneshot(authed_json_request(
            "PUT",
            &format!("/api/admin/movements/{}", movement_id),
            ADMIN_COOKIE,
            json!({ "title": "II. Adagio" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let renamed = extract_json(response.into_body()).await;
    assert_eq!(renamed["title"], "II. Adagio");
    assert_eq!(renamed["number"], 2);
}

#[tokio::test]
async fn test_update_work_fields() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();
    let outcome = extract_json(response.into_body()).await;
    let work_id = outcome["work"]["guid"].as_str().unwrap().to_string();

    let response = app
        .oneshot(authed_json_request(
            "PUT",
            &format!("/api/admin/works/{}", work_id),
            ADMIN_COOKIE,
            json!({
                "title": "Keyboard Concerto No. 1 in D minor",
                "catalog_system": "BWV",
                "catalog_number": "1052",
                "year_composed": 1738,
                "form": "concerto"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let work = extract_json(response.into_body()).await;
    assert_eq!(work["title"], "Keyboard Concerto No. 1 in D minor");
    assert_eq!(work["year_composed"], 1738);
    assert_eq!(work["guid"], outcome["work"]["guid"]);
}

// =============================================================================
// Catalog Probes
// =============================================================================

#[tokio::test]
async fn test_check_works_batch() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    app.clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/works/check",
            ADMIN_COOKIE,
            json!({
                "pairs": [
                    { "catalog_system": "BWV", "catalog_number": "1052" },
                    { "catalog_system": "BWV", "catalog_number": "9999" }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = extract_json(response.into_body()).await;
    assert_eq!(results.as_array().unwrap().len(), 2);
    assert_eq!(results[0]["exists"], true);
    assert_eq!(results[1]["exists"], false);
}

#[tokio::test]
async fn test_check_work_and_movement() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/tracks/save",
            ADMIN_COOKIE,
            save_body("track-save-1", 1, "Concerto No. 1 in D minor, BWV 1052: I. Allegro"),
        ))
        .await
        .unwrap();
    let outcome = extract_json(response.into_body()).await;
    let composer_id = outcome["composer"]["guid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/works/check-movement",
            ADMIN_COOKIE,
            json!({
                "composer_id": composer_id,
                "catalog_system": "BWV",
                "catalog_number": "1052",
                "movement_number": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["work_exists"], true);
    assert_eq!(body["movement_exists"], true);
    assert_eq!(body["work_id"], outcome["work"]["guid"]);

    // Same work, movement not yet catalogued
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/works/check-movement",
            ADMIN_COOKIE,
            json!({
                "composer_id": composer_id,
                "catalog_system": "BWV",
                "catalog_number": "1052",
                "movement_number": 5
            }),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["work_exists"], true);
    assert_eq!(body["movement_exists"], false);
}

// =============================================================================
// Composers
// =============================================================================

#[tokio::test]
async fn test_create_and_list_composers() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    seed_session(&db, LISTENER_SPOTIFY_ID, LISTENER_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/composers",
            ADMIN_COOKIE,
            json!({
                "name": "Antonio Vivaldi",
                "birth_year": 1678,
                "death_year": 1741
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let composer = extract_json(response.into_body()).await;
    assert_eq!(composer["name"], "Antonio Vivaldi");
    let composer_id = composer["guid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/composers", LISTENER_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let composers = extract_json(response.into_body()).await;
    assert_eq!(composers.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/api/composers/{}", composer_id),
            LISTENER_COOKIE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = extract_json(response.into_body()).await;
    assert_eq!(detail["name"], "Antonio Vivaldi");
    assert_eq!(detail["works"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_artist_search_rejects_blank_query() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .oneshot(authed_request(
            "GET",
            "/api/admin/composers/search?q=%20",
            ADMIN_COOKIE,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Admin Settings
// =============================================================================

#[tokio::test]
async fn test_settings_model_override_roundtrip() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    // No override stored initially; the configured default is reported
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/admin/settings", ADMIN_COOKIE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["llm_model"].is_null());
    assert!(body["default_llm_model"].is_string());

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/settings",
            ADMIN_COOKIE,
            json!({ "llm_model": "gpt-4o" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["llm_model"], "gpt-4o");

    // Empty string clears the override
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/settings",
            ADMIN_COOKIE,
            json!({ "llm_model": "" }),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert!(body["llm_model"].is_null());
}

#[tokio::test]
async fn test_composer_artist_link_conflict() {
    let db = setup_test_db().await;
    seed_session(&db, ADMIN_SPOTIFY_ID, ADMIN_COOKIE).await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/composers",
            ADMIN_COOKIE,
            json!({ "name": "Antonio Vivaldi", "spotify_artist_id": "artist-vivaldi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A second composer cannot claim the same Spotify artist
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/composers",
            ADMIN_COOKIE,
            json!({ "name": "A. Vivaldi", "spotify_artist_id": "artist-vivaldi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
