//! Chat events exchanged between the relay and its participants.

use serde::{Deserialize, Serialize};

/// Sender tag used for relay announcements (joins, leaves).
pub const SYSTEM_SENDER: &str = "SYSTEM";

/// One chat message unit as delivered by the relay.
///
/// On the wire this is `{"sender": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatEvent {
    /// Participant name, or [`SYSTEM_SENDER`].
    pub sender: String,
    /// Message text.
    #[serde(rename = "message")]
    pub body: String,
}

impl ChatEvent {
    /// Create a chat event from a participant.
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }

    /// Create a relay announcement.
    pub fn system(body: impl Into<String>) -> Self {
        Self::new(SYSTEM_SENDER, body)
    }

    /// Announcement sent when a participant joins.
    pub fn joined(name: &str) -> Self {
        Self::system(format!("{name} has joined the chat."))
    }

    /// Announcement sent when a participant leaves.
    pub fn left(name: &str) -> Self {
        Self::system(format!("{name} has left the chat."))
    }

    /// Check whether this event was produced by the relay itself.
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}
