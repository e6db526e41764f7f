//! Shared types and constants for the Switchboard voice bridge.
//!
//! This crate provides the foundational types used across all Switchboard
//! crates: transcript turn records, call lifecycle statuses as reported by
//! the telephony provider, and conversation channel tags.
//!
//! No crate in the workspace depends on anything *except* `switchboard-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnRole {
    /// The human on the phone.
    Caller,
    /// The assistant's reply.
    Assistant,
    /// Lifecycle annotations (call started, call placed, farewell).
    System,
}

impl TurnRole {
    /// Returns the string label stored in the transcript log.
    pub fn label(self) -> &'static str {
        match self {
            Self::Caller => "CALLER",
            Self::Assistant => "ASSISTANT",
            Self::System => "SYSTEM",
        }
    }

    /// Attempts to convert a stored label back to a `TurnRole`.
    ///
    /// Returns `None` for unrecognized labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "CALLER" => Some(Self::Caller),
            "ASSISTANT" => Some(Self::Assistant),
            "SYSTEM" => Some(Self::System),
            _ => None,
        }
    }
}

/// The surface a conversation turn arrived on.
///
/// The bridge only ever produces `Voice` turns, but the transcript log is
/// shared with the chat-message front end, so the tag is carried on every
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// A phone call through the telephony provider.
    Voice,
    /// The chat-message front end.
    Chat,
}

impl Channel {
    /// Returns the string label stored in the transcript log.
    pub fn label(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Chat => "chat",
        }
    }

    /// Attempts to convert a stored label back to a `Channel`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "voice" => Some(Self::Voice),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }
}

/// An immutable transcript entry. Past entries are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Who produced the turn.
    pub role: TurnRole,
    /// Free-text content of the turn.
    pub content: String,
    /// The surface the turn arrived on.
    pub channel: Channel,
    /// When the turn was recorded.
    pub created_at: DateTime<Utc>,
}

/// Call lifecycle status as reported by the provider's status callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
}

impl CallStatus {
    /// Parses the provider's status string (e.g. `"no-answer"`).
    ///
    /// Returns `None` for unrecognized statuses so a new provider-side status
    /// degrades to a no-op rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "initiated" => Some(Self::Initiated),
            "ringing" => Some(Self::Ringing),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "busy" => Some(Self::Busy),
            "failed" => Some(Self::Failed),
            "no-answer" => Some(Self::NoAnswer),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Whether this status means the call is over and its state can be torn
    /// down.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Busy | Self::Failed | Self::NoAnswer | Self::Canceled
        )
    }
}
