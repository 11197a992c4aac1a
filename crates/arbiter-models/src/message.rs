//! Conversation log entries.
//!
//! The log is one canonical sequence annotated with the logical speaker.
//! Display labels come from [`Speaker::label`], never from message text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ordinal::Ordinal;

/// Logical author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ordinal", rename_all = "snake_case")]
pub enum Speaker {
    /// The human operator.
    Human,
    /// The manager session.
    Arbiter,
    /// A worker session, identified by its ordinal.
    Orchestrator(Ordinal),
    /// The router itself, for notices no agent wrote.
    System,
}

impl Speaker {
    /// Label shown next to the message in the UI.
    pub fn label(&self) -> String {
        match self {
            Speaker::Human => "You".to_string(),
            Speaker::Arbiter => "Arbiter".to_string(),
            Speaker::Orchestrator(ordinal) => format!("Orchestrator {}", ordinal),
            Speaker::System => "System".to_string(),
        }
    }
}

/// How a message travelled through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Routed to another participant.
    #[default]
    Dialogue,
    /// Shown to the UI but never fed back into the Arbiter.
    DisplayOnly,
    /// Arbiter's private notes, kept for audit.
    Musing,
    /// Router-generated notice (fatal errors, teardown).
    Notice,
}

/// An immutable entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a dialogue message stamped with the current time.
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self::with_kind(speaker, text, MessageKind::Dialogue)
    }

    /// Creates a message of the given kind stamped with the current time.
    pub fn with_kind(speaker: Speaker, text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            speaker,
            text: text.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_labels() {
        assert_eq!(Speaker::Human.label(), "You");
        assert_eq!(Speaker::Arbiter.label(), "Arbiter");
        let third = Ordinal::new(3).unwrap();
        assert_eq!(Speaker::Orchestrator(third).label(), "Orchestrator III");
        assert_eq!(Speaker::System.label(), "System");
    }

    #[test]
    fn test_speaker_serialization() {
        let speaker = Speaker::Orchestrator(Ordinal::FIRST);
        let json = serde_json::to_value(speaker).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "orchestrator", "ordinal": 1}));
        let json = serde_json::to_value(Speaker::System).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "system"}));
    }

    #[test]
    fn test_message_defaults_to_dialogue() {
        let message = Message::new(Speaker::Human, "hello");
        assert_eq!(message.kind, MessageKind::Dialogue);
        assert_eq!(message.text, "hello");
    }
}
