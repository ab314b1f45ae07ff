//! LiveKit integration: access grant signing, the room-name convention,
//! and the server-to-server room teardown call.
//!
//! Grants are LiveKit-format JWTs signed with the API secret. Teardown
//! uses the Twirp `RoomService/DeleteRoom` endpoint with a short-lived
//! admin grant.

use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;
use uuid::Uuid;

/// How long a participant grant stays valid.
const GRANT_TTL_SECS: u64 = 6 * 60 * 60;

/// How long the admin grant for a Twirp call stays valid.
const ADMIN_GRANT_TTL_SECS: u64 = 10 * 60;

/// Room name prefix for thread-scoped meetings.
const THREAD_ROOM_PREFIX: &str = "thread-";

/// LiveKit server credentials and endpoint.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub api_key: String,
    pub api_secret: String,
    /// The LiveKit websocket URL (ws:// or wss://)
    pub url: Url,
}

impl VideoConfig {
    /// The HTTP host for Twirp API calls, derived from the ws URL.
    pub fn http_host(&self) -> String {
        let s = self.url.as_str();
        if let Some(rest) = s.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = s.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else {
            s.to_string()
        }
        .trim_end_matches('/')
        .to_string()
    }
}

/// What a room name says about who may join it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomScope {
    /// `thread-<uuid>-<millis>`: restricted to members of that thread.
    Thread(Uuid),
    /// Any other shape: an ad-hoc room, open to any authenticated user
    /// when the server policy allows it.
    Adhoc,
}

impl RoomScope {
    /// Classify a room name by the `thread-<uuid>-...` convention.
    pub fn parse(room: &str) -> Self {
        let Some(rest) = room.strip_prefix(THREAD_ROOM_PREFIX) else {
            return RoomScope::Adhoc;
        };
        // The thread id is the 36-char hyphenated UUID right after the prefix
        match rest.get(..36).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => RoomScope::Thread(id),
            None => RoomScope::Adhoc,
        }
    }
}

/// Build a thread-scoped room name: `thread-<uuid>-<millis>`.
pub fn thread_room_name(thread_uuid: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}{}-{}", THREAD_ROOM_PREFIX, thread_uuid, millis)
}

/// Video grant embedded in a LiveKit access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,
}

/// Claims of a LiveKit access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantClaims {
    /// API key
    pub iss: String,
    /// Participant identity
    pub sub: String,
    /// Participant display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nbf: u64,
    pub exp: u64,
    pub video: VideoGrant,
}

/// Errors from grant signing or the teardown call.
#[derive(Debug)]
pub enum VideoError {
    Encoding(jsonwebtoken::errors::Error),
    Request(reqwest::Error),
    /// The Twirp endpoint answered with a non-success status
    RemoteStatus(u16),
}

impl std::fmt::Display for VideoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoError::Encoding(e) => write!(f, "Failed to sign grant: {}", e),
            VideoError::Request(e) => write!(f, "Room service request failed: {}", e),
            VideoError::RemoteStatus(status) => {
                write!(f, "Room service returned status {}", status)
            }
        }
    }
}

impl std::error::Error for VideoError {}

/// Sign a join grant for one participant in one room, publish and
/// subscribe both enabled. Issuance is stateless; two grants for the same
/// (room, identity) pair are independently valid.
pub fn mint_join_token(
    config: &VideoConfig,
    room: &str,
    identity: &str,
    display_name: &str,
) -> Result<String, VideoError> {
    let now = unix_now();
    let claims = GrantClaims {
        iss: config.api_key.clone(),
        sub: identity.to_string(),
        name: Some(display_name.to_string()),
        nbf: now,
        exp: now + GRANT_TTL_SECS,
        video: VideoGrant {
            room: Some(room.to_string()),
            room_join: Some(true),
            room_admin: None,
            can_publish: Some(true),
            can_subscribe: Some(true),
        },
    };

    sign(config, &claims)
}

/// Sign a short-lived admin grant for server-to-server calls on a room.
fn mint_admin_token(config: &VideoConfig, room: &str) -> Result<String, VideoError> {
    let now = unix_now();
    let claims = GrantClaims {
        iss: config.api_key.clone(),
        sub: "rookery-server".to_string(),
        name: None,
        nbf: now,
        exp: now + ADMIN_GRANT_TTL_SECS,
        video: VideoGrant {
            room: Some(room.to_string()),
            room_join: None,
            room_admin: Some(true),
            can_publish: None,
            can_subscribe: None,
        },
    };

    sign(config, &claims)
}

fn sign(config: &VideoConfig, claims: &GrantClaims) -> Result<String, VideoError> {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.api_secret.as_bytes()),
    )
    .map_err(VideoError::Encoding)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Client for the LiveKit room service.
#[derive(Clone)]
pub struct RoomClient {
    http: reqwest::Client,
    config: VideoConfig,
}

#[derive(Serialize)]
struct DeleteRoomRequest<'a> {
    room: &'a str,
}

impl RoomClient {
    pub fn new(config: VideoConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Delete a room on the SFU via Twirp.
    pub async fn delete_room(&self, room: &str) -> Result<(), VideoError> {
        let token = mint_admin_token(&self.config, room)?;
        let url = format!(
            "{}/twirp/livekit.RoomService/DeleteRoom",
            self.config.http_host()
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&DeleteRoomRequest { room })
            .send()
            .await
            .map_err(VideoError::Request)?;

        if !response.status().is_success() {
            return Err(VideoError::RemoteStatus(response.status().as_u16()));
        }

        Ok(())
    }
}
