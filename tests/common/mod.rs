#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use rookery::db::{Database, Profile, Role};
use rookery::jwt::JwtConfig;
use rookery::livekit::VideoConfig;
use rookery::{ServerConfig, create_app};
use tower::ServiceExt;
use url::Url;

pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-0123456789abcdef";

/// JWT config matching the test app's secret. Most tests forge access
/// cookies with this instead of logging in, since scrypt is slow; tests
/// that exercise the credential path go through the signup endpoint.
pub fn jwt() -> JwtConfig {
    JwtConfig::new(TEST_JWT_SECRET)
}

pub struct TestAppOptions {
    pub gate_enabled: bool,
    pub video: Option<VideoConfig>,
    pub allow_adhoc_rooms: bool,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            gate_enabled: true,
            video: None,
            allow_adhoc_rooms: true,
        }
    }
}

pub async fn create_test_app_with(options: TestAppOptions) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        secure_cookies: false,
        gate_enabled: options.gate_enabled,
        video: options.video,
        allow_adhoc_rooms: options.allow_adhoc_rooms,
        rate_limit: None,
    };
    (create_app(&config), db)
}

pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with(TestAppOptions::default()).await
}

pub fn video_config(url: &str) -> VideoConfig {
    VideoConfig {
        api_key: "test-api-key".to_string(),
        api_secret: "test-api-secret".to_string(),
        url: Url::parse(url).expect("Invalid video URL"),
    }
}

/// Create an approved member profile directly in the database.
pub async fn seed_member(db: &Database, uuid: &str, username: &str) -> Profile {
    let id = db
        .profiles()
        .create(uuid, username, username, "unusable-hash")
        .await
        .expect("Failed to create profile");
    db.profiles().approve(id).await.expect("Failed to approve");
    db.profiles()
        .get_by_id(id)
        .await
        .expect("Failed to load profile")
        .expect("Profile missing")
}

/// Create an unapproved member profile.
pub async fn seed_pending(db: &Database, uuid: &str, username: &str) -> Profile {
    let id = db
        .profiles()
        .create(uuid, username, username, "unusable-hash")
        .await
        .expect("Failed to create profile");
    db.profiles()
        .get_by_id(id)
        .await
        .expect("Failed to load profile")
        .expect("Profile missing")
}

/// Create an approved admin profile.
pub async fn seed_admin(db: &Database, uuid: &str, username: &str) -> Profile {
    let id = db
        .profiles()
        .create_admin(uuid, username, username, "unusable-hash")
        .await
        .expect("Failed to create admin");
    db.profiles()
        .get_by_id(id)
        .await
        .expect("Failed to load profile")
        .expect("Profile missing")
}

/// Forge an access-token cookie header value for a profile.
pub fn access_cookie(profile: &Profile) -> String {
    let access = jwt()
        .generate_access_token(&profile.uuid, &profile.username, profile.role)
        .expect("Failed to generate access token");
    format!("access_token={}", access.token)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_as(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("cookie", cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", cookie)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn request_no_auth(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Run a request against a clone of the app.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("Request failed")
}

/// Helper: create a thread via the API, returning its UUID.
pub async fn create_thread(app: &Router, cookie: &str, title: &str) -> String {
    let response = send(
        app,
        json_request("POST", "/api/threads", cookie, serde_json::json!({ "title": title })),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let body = body_json(response).await;
    body["uuid"].as_str().expect("Missing thread uuid").to_string()
}

/// Helper: check a role value in DB.
pub async fn profile_role(db: &Database, uuid: &str) -> Role {
    db.profiles()
        .get_by_uuid(uuid)
        .await
        .expect("Failed to load profile")
        .expect("Profile missing")
        .role
}
