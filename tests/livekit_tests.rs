mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A stand-in for the LiveKit room service: counts DeleteRoom calls and
/// can be flipped into a failure mode.
struct FakeRoomService {
    calls: AtomicUsize,
    fail: AtomicBool,
}

async fn spawn_fake_room_service() -> (Arc<FakeRoomService>, String) {
    let service = Arc::new(FakeRoomService {
        calls: AtomicUsize::new(0),
        fail: AtomicBool::new(false),
    });

    let state = service.clone();
    let router = axum::Router::new()
        .route(
            "/twirp/livekit.RoomService/DeleteRoom",
            axum::routing::post(
                |axum::extract::State(state): axum::extract::State<Arc<FakeRoomService>>| async move {
                    state.calls.fetch_add(1, Ordering::SeqCst);
                    if state.fail.load(Ordering::SeqCst) {
                        (StatusCode::INTERNAL_SERVER_ERROR, "{}")
                    } else {
                        (StatusCode::OK, "{}")
                    }
                },
            ),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake room service");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (service, format!("http://{}", addr))
}

fn decode_grant(token: &str) -> serde_json::Value {
    let mut validation = jsonwebtoken::Validation::default();
    validation.validate_nbf = false;
    let data = jsonwebtoken::decode::<serde_json::Value>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(b"test-api-secret"),
        &validation,
    )
    .expect("Grant should decode with the API secret");
    data.claims
}

// --- Token endpoint ---

#[tokio::test]
async fn test_token_requires_room_and_username_params() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    for uri in [
        "/api/livekit/token",
        "/api/livekit/token?room=some-room",
        "/api/livekit/token?username=Alice",
    ] {
        let response = send(&app, get_as(uri, &cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
    }
}

#[tokio::test]
async fn test_token_requires_auth() {
    let (app, _db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;

    let response = send(&app, get("/api/livekit/token?room=some-room&username=Alice")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_500_when_video_unconfigured() {
    let (app, db) = create_test_app().await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    let response = send(
        &app,
        get_as("/api/livekit/token?room=some-room&username=Alice", &cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_token_member_gets_grant_for_exact_room() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    let thread_uuid = create_thread(&app, &cookie, "Standup").await;
    let room = format!("thread-{}-1724900000000", thread_uuid);

    let response = send(
        &app,
        get_as(
            &format!("/api/livekit/token?room={}&username=Alice%20A", room),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let claims = decode_grant(body["token"].as_str().expect("Missing token"));

    // Room in the grant is byte-for-byte the requested room
    assert_eq!(claims["video"]["room"], room.as_str());
    assert_eq!(claims["video"]["roomJoin"], true);
    assert_eq!(claims["video"]["canPublish"], true);
    assert_eq!(claims["video"]["canSubscribe"], true);
    // Identity comes from the account, not the query parameter
    assert_eq!(claims["sub"], "alice");
    assert_eq!(claims["name"], "Alice A");
    assert_eq!(claims["iss"], "test-api-key");
    assert!(claims["exp"].as_u64().unwrap() > claims["nbf"].as_u64().unwrap());
}

#[tokio::test]
async fn test_token_forbidden_for_non_member() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let creator = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let outsider = seed_member(&db, "00000000-0000-0000-0000-000000000002", "bob").await;

    let thread_uuid = create_thread(&app, &access_cookie(&creator), "Standup").await;
    let room = format!("thread-{}-1724900000000", thread_uuid);

    let response = send(
        &app,
        get_as(
            &format!("/api/livekit/token?room={}&username=Bob", room),
            &access_cookie(&outsider),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_admin_bypasses_membership() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let creator = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let admin = seed_admin(&db, "00000000-0000-0000-0000-000000000002", "root").await;

    let thread_uuid = create_thread(&app, &access_cookie(&creator), "Standup").await;
    let room = format!("thread-{}-1724900000000", thread_uuid);

    let response = send(
        &app,
        get_as(
            &format!("/api/livekit/token?room={}&username=Root", room),
            &access_cookie(&admin),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_forbidden_for_unknown_thread() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;

    // Valid thread-room shape, but no such thread exists
    let room = "thread-11111111-2222-3333-4444-555555555555-1724900000000";
    let response = send(
        &app,
        get_as(
            &format!("/api/livekit/token?room={}&username=Alice", room),
            &access_cookie(&profile),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_adhoc_room_allowed_by_default() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;

    let response = send(
        &app,
        get_as(
            "/api/livekit/token?room=watercooler&username=Alice",
            &access_cookie(&profile),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let claims = decode_grant(body["token"].as_str().unwrap());
    assert_eq!(claims["video"]["room"], "watercooler");
}

#[tokio::test]
async fn test_token_adhoc_room_refused_when_disabled() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        allow_adhoc_rooms: false,
        ..Default::default()
    })
    .await;
    let member = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let admin = seed_admin(&db, "00000000-0000-0000-0000-000000000002", "root").await;

    let response = send(
        &app,
        get_as(
            "/api/livekit/token?room=watercooler&username=Alice",
            &access_cookie(&member),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admins can still join ad-hoc rooms
    let response = send(
        &app,
        get_as(
            "/api/livekit/token?room=watercooler&username=Root",
            &access_cookie(&admin),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_reissue_is_independent() {
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config("ws://localhost:7880")),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    // Two grants for the same (room, identity): both decode and carry the
    // same scope, issuance has no server-side state
    for _ in 0..2 {
        let response = send(
            &app,
            get_as("/api/livekit/token?room=watercooler&username=Alice", &cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let claims = decode_grant(body["token"].as_str().unwrap());
        assert_eq!(claims["video"]["room"], "watercooler");
        assert_eq!(claims["sub"], "alice");
    }
}

// --- End-room endpoint ---

/// Seed a thread with an active meeting, returning (thread_uuid, room_name).
async fn seed_active_meeting(app: &axum::Router, creator_cookie: &str) -> (String, String) {
    let thread_uuid = create_thread(app, creator_cookie, "Standup").await;
    let response = send(
        app,
        json_request(
            "POST",
            &format!("/api/threads/{}/meetings", thread_uuid),
            creator_cookie,
            json!({ "title": "Daily" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let meeting_uuid = body_json(response).await["uuid"].as_str().unwrap().to_string();

    let response = send(
        app,
        json_request(
            "POST",
            &format!("/api/meetings/{}/start", meeting_uuid),
            creator_cookie,
            json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let room = body_json(response).await["room_name"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(room.starts_with(&format!("thread-{}-", thread_uuid)));

    (thread_uuid, room)
}

#[tokio::test]
async fn test_end_room_requires_room_field() {
    let (service, url) = spawn_fake_room_service().await;
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/livekit/end-room",
            &access_cookie(&profile),
            json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_end_room_requires_auth() {
    let (service, url) = spawn_fake_room_service().await;
    let (app, _db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;

    let response = send(
        &app,
        request_no_auth("POST", "/api/livekit/end-room", json!({ "room": "x" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_end_room_unknown_room_is_404() {
    let (service, url) = spawn_fake_room_service().await;
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/livekit/end-room",
            &access_cookie(&profile),
            json!({ "room": "no-such-room" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_end_room_forbidden_without_remote_call() {
    let (service, url) = spawn_fake_room_service().await;
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;
    let creator = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let other = seed_member(&db, "00000000-0000-0000-0000-000000000002", "bob").await;
    let creator_cookie = access_cookie(&creator);

    let (thread_uuid, room) = seed_active_meeting(&app, &creator_cookie).await;

    // Member of the thread but not the meeting creator
    let other_cookie = access_cookie(&other);
    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/api/threads/{}/join", thread_uuid),
            &other_cookie,
            json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/livekit/end-room",
            &other_cookie,
            json!({ "room": room }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        service.calls.load(Ordering::SeqCst),
        0,
        "authorization failure must never reach the room service"
    );
}

#[tokio::test]
async fn test_end_room_creator_succeeds_and_calls_remote() {
    let (service, url) = spawn_fake_room_service().await;
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;
    let creator = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&creator);

    let (_thread_uuid, room) = seed_active_meeting(&app, &cookie).await;

    let response = send(
        &app,
        json_request("POST", "/api/livekit/end-room", &cookie, json!({ "room": room })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_end_room_succeeds_despite_remote_failure() {
    let (service, url) = spawn_fake_room_service().await;
    service.fail.store(true, Ordering::SeqCst);

    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;
    let creator = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&creator);

    let (_thread_uuid, room) = seed_active_meeting(&app, &cookie).await;

    let response = send(
        &app,
        json_request("POST", "/api/livekit/end-room", &cookie, json!({ "room": room })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_end_room_admin_can_end_any_room() {
    let (service, url) = spawn_fake_room_service().await;
    let (app, db) = create_test_app_with(TestAppOptions {
        video: Some(video_config(&url)),
        ..Default::default()
    })
    .await;
    let creator = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let admin = seed_admin(&db, "00000000-0000-0000-0000-000000000002", "root").await;

    let (_thread_uuid, room) = seed_active_meeting(&app, &access_cookie(&creator)).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/livekit/end-room",
            &access_cookie(&admin),
            json!({ "room": room }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
}
