use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Event names pushed on session streams.
pub mod events {
    pub const HANDSHAKE: &str = "handshake";
    pub const PLAYER: &str = "player";
    pub const GAME_STATE: &str = "game_state";
    pub const PLAYERS: &str = "players";
    pub const SYSTEM_STATUS: &str = "system_status";
}

#[derive(Clone, Debug, PartialEq)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Name of the event, empty for unnamed messages.
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event sent on a session stream.
pub struct Handshake {
    /// `player` or `admin`.
    pub stream: String,
    pub session: Uuid,
    /// Whether the backend is running without a storage connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}
