//! Shared wire model for the lockstep control channel.
//!
//! This crate owns the JSON representation used by `server`, the `lockstep`
//! sync core, and `cli`. Every message is a JSON object with a `type`
//! discriminator; both directions are closed enums so a new message kind is a
//! compile-time addition rather than a silently ignored key.
//!
//! Timestamps on the wire are milliseconds since the Unix epoch on the
//! server's clock ("shared time"). Positions inside media are seconds.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Media name sent with `play` when the commander omits one.
pub const DEFAULT_VIDEO: &str = "video-vertical";

/// Lead time, in milliseconds, between a `play` broadcast and its target instant.
pub const DEFAULT_PLAY_DELAY_MS: i64 = 5000;

/// `type` values understood by the server. Anything else is echoed back.
pub const CLIENT_MESSAGE_TYPES: &[&str] = &["identify", "getClients", "play", "pause", "stop", "reload", "setSource"];

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the decode helpers.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text was not JSON at all.
    #[error("Invalid JSON")]
    InvalidJson(#[source] serde_json::Error),
    /// The `type` was recognised but the fields did not match it.
    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Role claimed by a connection in an `identify` message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Control surface; never receives playback broadcasts.
    Commander,
    /// Any other value, including a missing role.
    #[default]
    #[serde(other)]
    Player,
}

/// Commands sent by clients to the coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Identify {
        #[serde(default)]
        role: Role,
    },
    GetClients,
    #[serde(rename_all = "camelCase")]
    Play {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video: Option<String>,
        /// Explicit shared-clock instant. The server picks one when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_time: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<i64>,
    },
    Pause,
    Stop,
    Reload,
    SetSource {
        source: String,
    },
}

impl ClientMessage {
    /// Wire `type` string of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Identify { .. } => "identify",
            Self::GetClients => "getClients",
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Reload => "reload",
            Self::SetSource { .. } => "setSource",
        }
    }
}

/// Result of decoding inbound client text.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Command(ClientMessage),
    /// Valid JSON with an unrecognised (or missing) `type`. Echoed to the sender.
    Unknown(Value),
}

/// Decode one text frame from a client.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidJson`] when the text is not JSON, and
/// [`DecodeError::Malformed`] when a known `type` carries bad fields.
pub fn decode_client_message(text: &str) -> Result<Inbound, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;

    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    if !CLIENT_MESSAGE_TYPES.contains(&kind) {
        return Ok(Inbound::Unknown(value));
    }

    let kind = kind.to_owned();
    serde_json::from_value(value)
        .map(Inbound::Command)
        .map_err(|source| DecodeError::Malformed { kind, source })
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// One entry of the registry view pushed to commanders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: u64,
    /// RFC 3339 timestamp of the connection.
    pub connected_at: String,
    pub is_commander: bool,
}

/// Messages sent by the coordinator to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Welcome { message: String, client_id: u64 },
    Source { source: String },
    #[serde(rename_all = "camelCase")]
    Play { video: String, target_time: i64, delay: i64 },
    Pause,
    Stop,
    Reload,
    ClientsUpdate { clients: Vec<ClientInfo>, total: usize },
    Echo { data: Value },
    Error { message: String },
}

impl ServerMessage {
    /// Build a `clientsUpdate` with `total` derived from the list.
    #[must_use]
    pub fn clients_update(clients: Vec<ClientInfo>) -> Self {
        let total = clients.len();
        Self::ClientsUpdate { clients, total }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Wire `type` string of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Source { .. } => "source",
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Reload => "reload",
            Self::ClientsUpdate { .. } => "clientsUpdate",
            Self::Echo { .. } => "echo",
            Self::Error { .. } => "error",
        }
    }
}

/// Decode one text frame from the server.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidJson`] for non-JSON text and
/// [`DecodeError::Malformed`] for unknown or ill-formed messages.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_owned();
    serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
}

// =============================================================================
// TIMESYNC
// =============================================================================

/// Body of `POST /timesync`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesyncRequest {
    pub id: u64,
}

/// Reply to [`TimesyncRequest`]; `result` is the server's epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesyncResponse {
    pub id: u64,
    pub result: i64,
}

// =============================================================================
// MEDIA CATALOG
// =============================================================================

/// A playable file as exposed by the catalog HTTP interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub file_name: String,
    pub url: String,
}

/// Payload of one catalog media-type lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaData {
    Files(Vec<MediaFile>),
    /// Album subfolders keyed by folder name.
    Album(BTreeMap<String, Vec<MediaFile>>),
    Thumb(MediaFile),
}

/// Body of `GET /api/media/projects/{project}/{mediaType}[/{subfolder}]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListResponse {
    pub project_name: String,
    pub media_type: String,
    pub data: MediaData,
}

/// Body of `GET /api/media/projects`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<String>,
    pub count: usize,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
