//! Push feed wire messages.

use serde::Deserialize;

/// One JSON frame from a push feed. Unknown fields are ignored so the server
/// can grow the payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    pub status: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Interpreted message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    /// Keep-alive; acknowledged, no cache effect.
    Heartbeat,
    /// Work began somewhere in the feed's category.
    Started,
    /// A specific entity finished changing.
    Completed,
    Unknown,
}

impl PushMessage {
    /// Status matching is case-insensitive; `ping` is an alias for
    /// `heartbeat`.
    pub fn status(&self) -> PushStatus {
        match self.status.to_ascii_lowercase().as_str() {
            "heartbeat" | "ping" => PushStatus::Heartbeat,
            "started" => PushStatus::Started,
            "completed" => PushStatus::Completed,
            _ => PushStatus::Unknown,
        }
    }
}
