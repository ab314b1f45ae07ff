mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

async fn create_meeting(app: &axum::Router, cookie: &str, thread: &str) -> String {
    let response = send(
        app,
        json_request(
            "POST",
            &format!("/api/threads/{}/meetings", thread),
            cookie,
            json!({ "title": "Daily" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["uuid"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_meeting_starts_scheduled_without_room() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&alice);

    let thread = create_thread(&app, &cookie, "Standup").await;
    create_meeting(&app, &cookie, &thread).await;

    let response = send(
        &app,
        get_as(&format!("/api/threads/{}/meetings", thread), &cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let meetings = body_json(response).await;
    assert_eq!(meetings[0]["status"], "scheduled");
    assert_eq!(meetings[0]["room_name"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_create_with_start_is_immediately_active() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&alice);

    let thread = create_thread(&app, &cookie, "Standup").await;
    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/api/threads/{}/meetings", thread),
            &cookie,
            json!({ "title": "Quick call", "start": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "active");
    let room = body["room_name"].as_str().unwrap();
    assert!(room.starts_with(&format!("thread-{}-", thread)));
}

#[tokio::test]
async fn test_start_assigns_thread_scoped_room_name() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&alice);

    let thread = create_thread(&app, &cookie, "Standup").await;
    let meeting = create_meeting(&app, &cookie, &thread).await;

    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/start", meeting), &cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "active");
    let room = body["room_name"].as_str().unwrap();
    assert!(room.starts_with(&format!("thread-{}-", thread)));
    // The suffix is a millisecond timestamp
    let suffix = room.rsplit('-').next().unwrap();
    assert!(suffix.parse::<u64>().is_ok());
}

#[tokio::test]
async fn test_start_twice_conflicts() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&alice);

    let thread = create_thread(&app, &cookie, "Standup").await;
    let meeting = create_meeting(&app, &cookie, &thread).await;

    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/start", meeting), &cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/start", meeting), &cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_end_is_creator_or_admin_and_terminal() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let bob = seed_member(&db, "00000000-0000-0000-0000-000000000002", "bob").await;
    let alice_cookie = access_cookie(&alice);
    let bob_cookie = access_cookie(&bob);

    let thread = create_thread(&app, &alice_cookie, "Standup").await;
    let meeting = create_meeting(&app, &alice_cookie, &thread).await;

    send(
        &app,
        json_request("POST", &format!("/api/threads/{}/join", thread), &bob_cookie, json!({})),
    )
    .await;
    send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/start", meeting), &alice_cookie, json!({})),
    )
    .await;

    // A member who is not the creator cannot end it
    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/end", meeting), &bob_cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/end", meeting), &alice_cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // ended is terminal
    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/end", meeting), &alice_cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/start", meeting), &alice_cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_active_meeting_cannot_be_deleted() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&alice);

    let thread = create_thread(&app, &cookie, "Standup").await;
    let meeting = create_meeting(&app, &cookie, &thread).await;

    send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/start", meeting), &cookie, json!({})),
    )
    .await;

    let response = send(
        &app,
        json_request("DELETE", &format!("/api/meetings/{}", meeting), &cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    send(
        &app,
        json_request("POST", &format!("/api/meetings/{}/end", meeting), &cookie, json!({})),
    )
    .await;

    let response = send(
        &app,
        json_request("DELETE", &format!("/api/meetings/{}", meeting), &cookie, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_meetings_require_membership() {
    let (app, db) = create_test_app().await;
    let alice = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let bob = seed_member(&db, "00000000-0000-0000-0000-000000000002", "bob").await;

    let thread = create_thread(&app, &access_cookie(&alice), "Standup").await;

    let response = send(
        &app,
        get_as(&format!("/api/threads/{}/meetings", thread), &access_cookie(&bob)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
