//! Events emitted by agent sessions while a turn runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::MessageId;
use crate::intent::{OrchestratorReply, RoutingIntent};

/// Usage telemetry for one logical turn.
///
/// `message_id` is the deduplication key: transport fragments of the same
/// turn share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSample {
    pub message_id: MessageId,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_create: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl ContextSample {
    /// Creates an all-zero sample for the given message.
    pub fn new(message_id: impl Into<MessageId>) -> Self {
        Self {
            message_id: message_id.into(),
            cache_read: 0,
            cache_create: 0,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn with_cache(mut self, cache_read: u64, cache_create: u64) -> Self {
        self.cache_read = cache_read;
        self.cache_create = cache_create;
        self
    }

    pub fn with_io(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    /// Cache read plus cache creation tokens.
    pub fn combined_cache(&self) -> u64 {
        self.cache_read.saturating_add(self.cache_create)
    }

    /// True when every counter is zero.
    pub fn is_zero(&self) -> bool {
        self.combined_cache() == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// A tool invocation observed inside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUseEvent {
    pub name: String,
}

/// One decoded event from a session's turn stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Visible text of the turn (may be empty for telemetry fragments).
    #[serde(default)]
    pub text: String,
    /// Raw structured output, validated by the router.
    #[serde(default)]
    pub intent: Option<Value>,
    #[serde(default)]
    pub usage: Option<ContextSample>,
    #[serde(default)]
    pub tool_use: Option<ToolUseEvent>,
}

impl TurnEvent {
    /// Event carrying only visible text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Arbiter event carrying a routing intent.
    pub fn routed(intent: &RoutingIntent) -> Self {
        Self {
            text: intent.text().unwrap_or_default().to_string(),
            intent: serde_json::to_value(intent).ok(),
            ..Default::default()
        }
    }

    /// Orchestrator event carrying a reply.
    pub fn reply(reply: &OrchestratorReply) -> Self {
        Self {
            text: reply.text.clone(),
            intent: serde_json::to_value(reply).ok(),
            ..Default::default()
        }
    }

    /// Event reporting a tool invocation.
    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            tool_use: Some(ToolUseEvent { name: name.into() }),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: ContextSample) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample() {
        let sample = ContextSample::new("msg_1");
        assert!(sample.is_zero());
        assert!(!sample.with_io(1, 0).is_zero());
    }

    #[test]
    fn test_combined_cache() {
        let sample = ContextSample::new("msg_1").with_cache(30_000, 2_000);
        assert_eq!(sample.combined_cache(), 32_000);
    }

    #[test]
    fn test_routed_event_carries_intent_json() {
        let event = TurnEvent::routed(&RoutingIntent::AddressHuman {
            text: "Speak.".into(),
        });
        assert_eq!(event.text, "Speak.");
        let decoded = RoutingIntent::decode(event.intent.as_ref().unwrap()).unwrap();
        assert_eq!(decoded.name(), "address_human");
    }

    #[test]
    fn test_sample_deserializes_with_missing_counters() {
        let sample: ContextSample =
            serde_json::from_str(r#"{"message_id": "msg_9", "cache_read": 12}"#).unwrap();
        assert_eq!(sample.cache_read, 12);
        assert_eq!(sample.output_tokens, 0);
    }
}
