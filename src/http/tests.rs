//! Tests for the HTTP API server.

use super::*;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tower::ServiceExt;

use crate::janitor::{JanitorRun, JanitorState, JanitorStatus, RetentionPolicy};
use crate::store::{TimerRecord, derive_id};

const USER: &str = "admin";
const PASS: &str = "s3cret";

struct TestApp {
    router: Router,
    store: RecordStore,
    janitor: Arc<Janitor>,
}

/// Create a test router over an in-memory store.
fn create_test_app() -> TestApp {
    app_over(RecordStore::open_in_memory().unwrap())
}

/// Create a test router over a database file that tests can alter directly.
fn create_file_test_app() -> (tempfile::TempDir, TestApp) {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = RecordStore::open(tmp.path().join("database.db")).unwrap();
    (tmp, app_over(store))
}

/// Runs `sql` through a second connection to the app's database file.
fn alter_database(app: &TestApp, sql: &str) {
    rusqlite::Connection::open(app.store.path().unwrap())
        .unwrap()
        .execute_batch(sql)
        .unwrap();
}

fn app_over(store: RecordStore) -> TestApp {
    let janitor = Arc::new(Janitor::new(
        store.clone(),
        RetentionPolicy::days(30),
        "0 0 4 */15 * *",
    ));
    let state = AppState::new(
        TimerService::new(store.clone()),
        Arc::clone(&janitor),
        Credentials::new(USER, PASS),
    );

    TestApp {
        router: router(state),
        store,
        janitor,
    }
}

fn basic_auth(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

struct Sent {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Sent {
    fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn message(&self) -> String {
        self.json::<MessageResponse>().message
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Sent {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Sent {
        status,
        headers,
        body,
    }
}

fn authed(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic_auth(USER, PASS))
}

async fn post_timer(app: &TestApp, body: &str) -> Sent {
    send(
        app,
        authed(Method::POST, "/timestamps")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn get_seconds(app: &TestApp, name_segment: &str) -> Sent {
    send(
        app,
        authed(Method::GET, &format!("/timestamps/{name_segment}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn get_record(app: &TestApp, name_segment: &str) -> Sent {
    send(
        app,
        authed(Method::GET, &format!("/timestamps/{name_segment}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn delete(app: &TestApp, id: &str) -> Sent {
    send(
        app,
        authed(Method::DELETE, &format!("/timestamps/{id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

// =========================================================================
// System Endpoint Tests
// =========================================================================

#[tokio::test]
async fn test_health_endpoint_without_auth() {
    let app = create_test_app();
    app.store.upsert("alarm", 1, chrono::Utc::now()).unwrap();

    let resp = send(
        &app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    let health: HealthResponse = resp.json();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.timers, Some(1));
    assert!(!health.version.is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint_without_auth() {
    let app = create_test_app();

    let resp = send(
        &app,
        Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(
        resp.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
}

#[tokio::test]
async fn test_request_id_header() {
    let app = create_test_app();

    let resp = send(
        &app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    let id = resp.headers[HEADER_REQUEST_ID].to_str().unwrap();
    assert!(id.starts_with("req_"));
}

// =========================================================================
// Authentication Tests
// =========================================================================

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let app = create_test_app();

    let resp = send(
        &app,
        Request::builder()
            .uri("/timestamps")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers[header::WWW_AUTHENTICATE],
        "Basic realm=\"Restricted\""
    );
    assert_eq!(resp.text(), "Unauthorized\n");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = create_test_app();

    let resp = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/timestamps")
            .header(header::AUTHORIZATION, basic_auth(USER, "wrong"))
            .body(Body::from(r#"{"name":"alarm","seconds":10}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_wrong_username_rejected() {
    let app = create_test_app();

    let resp = send(
        &app,
        Request::builder()
            .uri("/janitor")
            .header(header::AUTHORIZATION, basic_auth("root", PASS))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_basic_scheme_rejected() {
    let app = create_test_app();

    let resp = send(
        &app,
        Request::builder()
            .uri("/timestamps")
            .header(header::AUTHORIZATION, "Bearer token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// =========================================================================
// Timer Tests
// =========================================================================

#[tokio::test]
async fn test_set_and_get_timer() {
    let app = create_test_app();

    let resp = post_timer(&app, r#"{"name":"alarm","seconds":10}"#).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Timestamp saved successfully");

    let resp = get_seconds(&app, "alarm").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers[header::CONTENT_TYPE], "text/html");
    assert_eq!(resp.text(), "10\n");
}

#[tokio::test]
async fn test_get_timer_as_json() {
    let app = create_test_app();
    post_timer(&app, r#"{"name":"alarm","seconds":10}"#).await;

    let resp = get_record(&app, "alarm").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(
        resp.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );

    let record: TimerRecord = resp.json();
    assert_eq!(record.id, derive_id("alarm"));
    assert_eq!(record.name, "alarm");
    assert_eq!(record.seconds, 10);

    let raw: serde_json::Value = resp.json();
    assert!(raw.get("timestamp").is_some());
}

#[tokio::test]
async fn test_overwrite_timer() {
    let app = create_test_app();
    post_timer(&app, r#"{"name":"alarm","seconds":10}"#).await;
    post_timer(&app, r#"{"name":"alarm","seconds":25}"#).await;

    assert_eq!(get_seconds(&app, "alarm").await.text(), "25\n");
    assert_eq!(app.store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_negative_seconds_clamped() {
    let app = create_test_app();

    let resp = post_timer(&app, r#"{"name":"x","seconds":-5}"#).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(get_seconds(&app, "x").await.text(), "0\n");
}

#[tokio::test]
async fn test_fractional_seconds_truncated() {
    let app = create_test_app();
    post_timer(&app, r#"{"name":"x","seconds":10.9}"#).await;
    assert_eq!(get_seconds(&app, "x").await.text(), "10\n");
}

#[tokio::test]
async fn test_missing_fields_default() {
    let app = create_test_app();

    let resp = post_timer(&app, "{}").await;
    assert_eq!(resp.status, StatusCode::OK);

    let record = app.store.get_by_name("").unwrap().unwrap();
    assert_eq!(record.seconds, 0);
}

#[tokio::test]
async fn test_malformed_body_is_decoding_error() {
    let app = create_test_app();

    for body in ["", "not json", r#"{"name":"a","seconds":"ten"}"#] {
        let resp = post_timer(&app, body).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR, "body: {body}");
        assert_eq!(resp.message(), "Error in decoding timestamp");
    }
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_null_body_saves_default_timer() {
    let app = create_test_app();

    let resp = post_timer(&app, "null").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Timestamp saved successfully");

    let record = app.store.get_by_name("").unwrap().unwrap();
    assert_eq!(record.seconds, 0);
}

#[tokio::test]
async fn test_data_after_first_value_is_ignored() {
    let app = create_test_app();

    let resp = post_timer(&app, r#"{"name":"a","seconds":4} {"name":"b"} junk"#).await;
    assert_eq!(resp.status, StatusCode::OK);

    assert_eq!(app.store.get_by_name("a").unwrap().unwrap().seconds, 4);
    assert!(app.store.get_by_name("b").unwrap().is_none());
}

#[tokio::test]
async fn test_failed_overwrite_reports_update_error() {
    let (_tmp, app) = create_file_test_app();
    post_timer(&app, r#"{"name":"alarm","seconds":1}"#).await;
    alter_database(
        &app,
        "CREATE TRIGGER no_update BEFORE UPDATE ON timestamps \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    );

    let resp = post_timer(&app, r#"{"name":"alarm","seconds":2}"#).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.message(), "Error in updating timestamp");
    assert_eq!(app.store.get_by_name("alarm").unwrap().unwrap().seconds, 1);
}

#[tokio::test]
async fn test_failed_create_reports_insert_error() {
    let (_tmp, app) = create_file_test_app();
    alter_database(
        &app,
        "CREATE TRIGGER no_insert BEFORE INSERT ON timestamps \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    );

    let resp = post_timer(&app, r#"{"name":"alarm","seconds":2}"#).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.message(), "Error in inserting timestamp");
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_plus_in_path_means_space() {
    let app = create_test_app();
    post_timer(&app, r#"{"name":"my alarm","seconds":3}"#).await;

    assert_eq!(get_seconds(&app, "my+alarm").await.text(), "3\n");
    assert_eq!(get_seconds(&app, "my%20alarm").await.text(), "3\n");
}

#[tokio::test]
async fn test_unknown_timer_not_found() {
    let app = create_test_app();

    for resp in [
        get_seconds(&app, "never-written").await,
        get_record(&app, "never-written").await,
    ] {
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.message(), "Timestamp not found");
    }
}

#[tokio::test]
async fn test_list_timers() {
    let app = create_test_app();

    let resp = send(
        &app,
        authed(Method::GET, "/timestamps")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json::<Vec<TimerRecord>>().is_empty());

    post_timer(&app, r#"{"name":"bravo","seconds":2}"#).await;
    post_timer(&app, r#"{"name":"alpha","seconds":1}"#).await;

    let resp = send(
        &app,
        authed(Method::GET, "/timestamps")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let names: Vec<String> = resp
        .json::<Vec<TimerRecord>>()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, ["alpha", "bravo"]);
}

#[tokio::test]
async fn test_delete_timer() {
    let app = create_test_app();
    post_timer(&app, r#"{"name":"alarm","seconds":10}"#).await;

    let resp = delete(&app, &derive_id("alarm").to_string()).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Timestamp deleted successfully");

    assert_eq!(get_seconds(&app, "alarm").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_negative_id() {
    let app = create_test_app();
    post_timer(&app, r#"{"name":"","seconds":1}"#).await;

    let resp = delete(&app, "-5831236029470105178").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_delete_unknown_id_not_found() {
    let app = create_test_app();

    let resp = delete(&app, "12345").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.message(), "Timestamp not found");
}

#[tokio::test]
async fn test_delete_unparsable_id() {
    let app = create_test_app();

    let resp = delete(&app, "alarm").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.message(), "Error in decoding timestamp");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = create_test_app();
    let name = "x".repeat(MAX_BODY_SIZE_BYTES + 1);

    let resp = post_timer(&app, &format!(r#"{{"name":"{name}","seconds":1}}"#)).await;
    assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.store.count().unwrap(), 0);
}

// =========================================================================
// Janitor Tests
// =========================================================================

#[tokio::test]
async fn test_janitor_status() {
    let app = create_test_app();

    let resp = send(
        &app,
        authed(Method::GET, "/janitor")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    let status: JanitorStatus = resp.json();
    assert_eq!(status.state, JanitorState::Idle);
    assert_eq!(status.retention_secs, 30 * 86_400);
    assert_eq!(status.pass_count, 0);
}

#[tokio::test]
async fn test_janitor_manual_run() {
    let app = create_test_app();
    let stale = chrono::DateTime::from_timestamp(0, 0).unwrap();
    app.store.upsert("ancient", 1, stale).unwrap();
    post_timer(&app, r#"{"name":"fresh","seconds":1}"#).await;

    let resp = send(
        &app,
        authed(Method::POST, "/janitor/run")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    let run: JanitorRun = resp.json();
    assert!(run.success);
    assert!(run.manual);
    assert_eq!(run.evicted, 1);
    assert!(app.store.get_by_name("ancient").unwrap().is_none());
    assert!(app.store.get_by_name("fresh").unwrap().is_some());
}

#[tokio::test]
async fn test_janitor_run_conflicts_while_running() {
    let app = create_test_app();
    let _guard = app.janitor.try_begin().unwrap();

    let resp = send(
        &app,
        authed(Method::POST, "/janitor/run")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.message(), "Janitor pass already running");
}

#[tokio::test]
async fn test_janitor_failure_hides_storage_details() {
    let (_tmp, app) = create_file_test_app();
    alter_database(&app, "DROP TABLE timestamps;");

    let resp = send(
        &app,
        authed(Method::POST, "/janitor/run")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let run: JanitorRun = resp.json();
    assert!(!run.success);
    assert_eq!(run.error.as_deref(), Some(crate::janitor::PASS_FAILED_MESSAGE));
    assert!(!resp.text().contains("no such table"));

    let resp = send(
        &app,
        authed(Method::GET, "/janitor")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let status: JanitorStatus = resp.json();
    assert_eq!(status.state, JanitorState::Idle);
    assert_eq!(status.failure_count, 1);
    assert!(!resp.text().contains("no such table"));
}
