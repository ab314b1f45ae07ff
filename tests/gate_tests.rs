mod common;

use axum::http::StatusCode;
use common::*;

fn location(response: &axum::http::Response<axum::body::Body>) -> &str {
    response
        .headers()
        .get("location")
        .expect("Missing location header")
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_anonymous_is_redirected_to_login() {
    let (app, _db) = create_test_app().await;

    for path in ["/threads", "/profile", "/admin", "/pending-approval"] {
        let response = send(&app, get(path)).await;
        assert_eq!(
            response.status(),
            StatusCode::TEMPORARY_REDIRECT,
            "path {path}"
        );
        assert_eq!(location(&response), "/login", "path {path}");
    }
}

#[tokio::test]
async fn test_anonymous_can_reach_auth_pages() {
    let (app, _db) = create_test_app().await;

    for path in ["/login", "/signup"] {
        let response = send(&app, get(path)).await;
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn test_authenticated_is_bounced_off_auth_pages() {
    let (app, db) = create_test_app().await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    for path in ["/login", "/signup"] {
        let response = send(&app, get_as(path, &cookie)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/threads", "path {path}");
    }
}

#[tokio::test]
async fn test_unapproved_is_held_at_pending() {
    let (app, db) = create_test_app().await;
    let profile = seed_pending(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    let response = send(&app, get_as("/threads", &cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/pending-approval");

    // The pending page itself renders
    let response = send(&app, get_as("/pending-approval", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_approval_takes_effect_on_next_navigation() {
    let (app, db) = create_test_app().await;
    let profile = seed_pending(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    let response = send(&app, get_as("/threads", &cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    // Approve without reissuing any token; the gate re-reads the profile
    db.profiles().approve(profile.id).await.unwrap();

    let response = send(&app, get_as("/threads", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_non_admin_is_bounced_off_admin_pages() {
    let (app, db) = create_test_app().await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    let response = send(&app, get_as("/admin", &cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/threads");
}

#[tokio::test]
async fn test_admin_reaches_admin_pages() {
    let (app, db) = create_test_app().await;
    let admin = seed_admin(&db, "00000000-0000-0000-0000-000000000002", "root").await;
    let cookie = access_cookie(&admin);

    let response = send(&app, get_as("/admin", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unapproved_admin_goes_to_pending_not_admin() {
    let (app, db) = create_test_app().await;
    let admin = seed_admin(&db, "00000000-0000-0000-0000-000000000002", "root").await;
    let cookie = access_cookie(&admin);
    // Revoke approval but keep the admin role
    db.profiles().set_approved(admin.id, false).await.unwrap();

    let response = send(&app, get_as("/admin", &cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/pending-approval");
}

#[tokio::test]
async fn test_deleted_profile_is_treated_as_anonymous() {
    let (app, db) = create_test_app().await;
    let profile = seed_member(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    db.profiles().delete(profile.id).await.unwrap();

    let response = send(&app, get_as("/threads", &cookie)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_gate_disabled_opens_every_page() {
    let (app, _db) = create_test_app_with(TestAppOptions {
        gate_enabled: false,
        ..Default::default()
    })
    .await;

    for path in ["/threads", "/admin", "/profile", "/login"] {
        let response = send(&app, get(path)).await;
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn test_api_requests_are_not_gated() {
    let (app, db) = create_test_app().await;
    let profile = seed_pending(&db, "00000000-0000-0000-0000-000000000001", "alice").await;
    let cookie = access_cookie(&profile);

    // Unapproved users can still call the session API (no redirect)
    let response = send(&app, get_as("/api/session/me", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
