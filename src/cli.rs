//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::api::hash_password;
use crate::db::Database;
use crate::livekit::VideoConfig;
use crate::names::generate_name;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use scrypt::password_hash::rand_core::{OsRng, RngCore};
use std::sync::Arc;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Rookery", about = "Team threads, tasks and meetings")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7340")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "rookery.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Create an approved admin account on startup and print its one-time password
    #[arg(long)]
    pub create_admin: bool,

    /// Disable the page gate chain (credential-less local development only)
    #[arg(long)]
    pub no_gate: bool,

    /// Refuse video rooms outside the thread namespace
    #[arg(long)]
    pub no_adhoc_rooms: bool,

    /// Set the Secure flag on session cookies (required behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// LiveKit server URL (e.g., "wss://livekit.example.com")
    #[arg(long, env = "LIVEKIT_URL")]
    pub livekit_url: Option<String>,

    /// LiveKit API key
    #[arg(long, env = "LIVEKIT_API_KEY")]
    pub livekit_api_key: Option<String>,

    /// LiveKit API secret
    #[arg(long, env = "LIVEKIT_API_SECRET", hide_env_values = true)]
    pub livekit_api_secret: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Assemble the LiveKit configuration from the CLI/environment.
/// `Ok(None)` means the server runs without a video backend; a partial
/// set of credentials is an error.
pub fn load_video_config(args: &Args) -> Result<Option<VideoConfig>, ()> {
    match (
        args.livekit_url.as_deref(),
        args.livekit_api_key.as_deref(),
        args.livekit_api_secret.as_deref(),
    ) {
        (None, None, None) => {
            info!("No LiveKit credentials; video endpoints will answer 500");
            Ok(None)
        }
        (Some(url), Some(key), Some(secret)) => {
            let url = Url::parse(url).map_err(|e| {
                error!(url = %url, error = %e, "Invalid LiveKit URL");
            })?;
            Ok(Some(VideoConfig {
                api_key: key.to_string(),
                api_secret: secret.to_string(),
                url,
            }))
        }
        _ => {
            error!("LIVEKIT_URL, LIVEKIT_API_KEY and LIVEKIT_API_SECRET must be set together");
            Err(())
        }
    }
}

const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const GENERATED_PASSWORD_LENGTH: usize = 24;

/// Generate a random password from a 64-character set (no modulo bias).
fn generate_password() -> String {
    let mut bytes = [0u8; GENERATED_PASSWORD_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| PASSWORD_CHARSET[(b % 64) as usize] as char)
        .collect()
}

/// Handle the --create-admin flag: create an approved admin account with
/// a generated username and print its one-time password.
pub async fn handle_create_admin(db: &Database) {
    match db.profiles().has_admin().await {
        Ok(true) => {
            println!();
            println!("An admin account already exists; not creating another.");
            println!();
        }
        Ok(false) => {
            let uuid = Uuid::new_v4().to_string();
            let username = generate_name();
            let password = generate_password();

            let Ok(hash) = hash_password(password.clone()).await else {
                error!("Failed to hash admin password");
                std::process::exit(1);
            };

            match db
                .profiles()
                .create_admin(&uuid, &username, &username, &hash)
                .await
            {
                Ok(_) => {
                    println!();
                    println!("Admin account created: {}", username);
                    println!("One-time password: {}", password);
                    println!("Sign in and change it from the profile page.");
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin account");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
    video: Option<VideoConfig>,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies: args.secure_cookies,
        gate_enabled: !args.no_gate,
        video,
        allow_adhoc_rooms: !args.no_adhoc_rooms,
        rate_limit: Some(Arc::new(RateLimitConfig::new())),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
