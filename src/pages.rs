//! Server-rendered page shells.
//!
//! These are deliberately minimal: the interesting behavior is the gate
//! chain layered in front of them, which redirects anonymous, unapproved
//! and non-admin visitors before any of these handlers run.

use axum::response::Html;

fn shell(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title} · Rookery</title></head>\n<body>\n<main id=\"app\" data-page=\"{body}\"><h1>{title}</h1></main>\n</body>\n</html>\n"
    ))
}

pub async fn login_page() -> Html<String> {
    shell("Sign in", "login")
}

pub async fn signup_page() -> Html<String> {
    shell("Create account", "signup")
}

pub async fn pending_page() -> Html<String> {
    shell("Awaiting approval", "pending-approval")
}

pub async fn threads_page() -> Html<String> {
    shell("Threads", "threads")
}

pub async fn thread_page() -> Html<String> {
    // The client reads the thread UUID from the URL; interpolating the
    // raw path segment into markup here would be an injection hazard.
    shell("Thread", "thread")
}

pub async fn admin_page() -> Html<String> {
    shell("Administration", "admin")
}

pub async fn profile_page() -> Html<String> {
    shell("Your profile", "profile")
}
