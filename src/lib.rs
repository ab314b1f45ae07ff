pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod events;
pub mod jwt;
pub mod livekit;
pub mod names;
pub mod pages;
pub mod rate_limit;

use api::create_api_router;
use auth::add_access_token_cookie;
use auth::gate::{self, GateState};
use axum::{Router, middleware, response::Redirect, routing::get};
use db::Database;
use events::EventHub;
use jwt::JwtConfig;
use livekit::VideoConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing session tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (true in production with HTTPS)
    pub secure_cookies: bool,
    /// Whether the gate chain redirects page navigations. Disabled only
    /// for credential-less local development.
    pub gate_enabled: bool,
    /// LiveKit credentials; None runs the server without a video backend
    pub video: Option<VideoConfig>,
    /// Whether rooms outside the `thread-` namespace may be joined
    pub allow_adhoc_rooms: bool,
    /// Rate limits for credential endpoints; None disables limiting
    pub rate_limit: Option<Arc<RateLimitConfig>>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let hub = EventHub::new();

    let api_router = create_api_router(
        config.db.clone(),
        jwt.clone(),
        config.secure_cookies,
        hub,
        config.video.clone(),
        config.allow_adhoc_rooms,
        config.rate_limit.clone(),
    )
    .layer(middleware::from_fn(add_access_token_cookie));

    let gate_state = GateState {
        db: config.db.clone(),
        jwt,
        secure_cookies: config.secure_cookies,
        enabled: config.gate_enabled,
    };

    // Page navigations go through the gate chain; API requests do not.
    let page_routes = Router::new()
        .route(gate::LOGIN_PATH, get(pages::login_page))
        .route(gate::SIGNUP_PATH, get(pages::signup_page))
        .route(gate::PENDING_PATH, get(pages::pending_page))
        .route(gate::APP_PATH, get(pages::threads_page))
        .route("/threads/{uuid}", get(pages::thread_page))
        .route(gate::ADMIN_PREFIX, get(pages::admin_page))
        .route("/profile", get(pages::profile_page))
        .layer(middleware::from_fn_with_state(gate_state, gate::gate))
        .layer(middleware::from_fn(add_access_token_cookie));

    Router::new()
        .route("/", get(Redirect::temporary(gate::APP_PATH)))
        .nest("/api", api_router)
        .merge(page_routes)
}

/// Run cleanup tasks and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. Blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
