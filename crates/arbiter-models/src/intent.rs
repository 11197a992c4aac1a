//! Structured routing decisions.
//!
//! Agent turns carry a machine-checked JSON object instead of free-text
//! speaker tags. The Arbiter emits a [`RoutingIntent`] tagged by `"intent"`;
//! Orchestrators emit an [`OrchestratorReply`]. Both are validated here
//! before the router looks at them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Validation failures for structured turn output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("structured output must be a JSON object")]
    NotAnObject,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field {field} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field {0} must not be empty")]
    EmptyField(&'static str),

    #[error("unknown intent: {0}")]
    UnknownIntent(String),
}

/// Routing decision produced once per Arbiter turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum RoutingIntent {
    /// Speak to the human.
    AddressHuman { text: String },
    /// Speak to the active Orchestrator.
    AddressOrchestrator { text: String },
    /// Bring up a new Orchestrator, optionally with an explicit briefing.
    SummonOrchestrator {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        briefing: Option<String>,
    },
    /// Tear down the live Orchestrator and return to the human.
    ReleaseOrchestrators,
    /// Private notes, logged and never forwarded.
    Musings { text: String },
}

impl RoutingIntent {
    /// Wire name of this intent.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddressHuman { .. } => "address_human",
            Self::AddressOrchestrator { .. } => "address_orchestrator",
            Self::SummonOrchestrator { .. } => "summon_orchestrator",
            Self::ReleaseOrchestrators => "release_orchestrators",
            Self::Musings { .. } => "musings",
        }
    }

    /// Text carried by the intent itself, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::AddressHuman { text }
            | Self::AddressOrchestrator { text }
            | Self::Musings { text } => Some(text),
            Self::SummonOrchestrator { briefing } => briefing.as_deref(),
            Self::ReleaseOrchestrators => None,
        }
    }

    /// Decodes and validates an Arbiter's structured output.
    pub fn decode(value: &Value) -> Result<Self, IntentError> {
        let obj = value.as_object().ok_or(IntentError::NotAnObject)?;
        let tag = required_str(obj, "intent")?;

        match tag {
            "address_human" => Ok(Self::AddressHuman {
                text: non_empty_text(obj)?,
            }),
            "address_orchestrator" => Ok(Self::AddressOrchestrator {
                text: non_empty_text(obj)?,
            }),
            "summon_orchestrator" => {
                let briefing = match obj.get("briefing") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) if s.trim().is_empty() => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(_) => {
                        return Err(IntentError::WrongType {
                            field: "briefing",
                            expected: "a string",
                        })
                    }
                };
                Ok(Self::SummonOrchestrator { briefing })
            }
            "release_orchestrators" => Ok(Self::ReleaseOrchestrators),
            "musings" => Ok(Self::Musings {
                text: required_str(obj, "text")?.to_string(),
            }),
            other => Err(IntentError::UnknownIntent(other.to_string())),
        }
    }

    /// JSON schema handed to the agent engine as the Arbiter's output format.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["intent"],
            "properties": {
                "intent": {
                    "type": "string",
                    "enum": [
                        "address_human",
                        "address_orchestrator",
                        "summon_orchestrator",
                        "release_orchestrators",
                        "musings"
                    ]
                },
                "text": { "type": "string" },
                "briefing": { "type": "string" }
            },
            "additionalProperties": false
        })
    }
}

/// Structured output of an Orchestrator turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorReply {
    pub text: String,
    /// `true` forwards the text to the Arbiter; `false` keeps it display-only.
    pub expects_response: bool,
}

impl OrchestratorReply {
    /// Reply that is forwarded to the Arbiter.
    pub fn forwarded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expects_response: true,
        }
    }

    /// Reply that is only shown in the UI.
    pub fn display_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expects_response: false,
        }
    }

    /// Decodes and validates an Orchestrator's structured output.
    pub fn decode(value: &Value) -> Result<Self, IntentError> {
        let obj = value.as_object().ok_or(IntentError::NotAnObject)?;
        let text = non_empty_text(obj)?;
        let expects_response = match obj.get("expects_response") {
            Some(Value::Bool(b)) => *b,
            None => return Err(IntentError::MissingField("expects_response")),
            Some(_) => {
                return Err(IntentError::WrongType {
                    field: "expects_response",
                    expected: "a boolean",
                })
            }
        };
        Ok(Self {
            text,
            expects_response,
        })
    }

    /// JSON schema handed to the agent engine as the Orchestrator's output format.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["text", "expects_response"],
            "properties": {
                "text": { "type": "string" },
                "expects_response": { "type": "boolean" }
            },
            "additionalProperties": false
        })
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, IntentError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        None | Some(Value::Null) => Err(IntentError::MissingField(field)),
        Some(_) => Err(IntentError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn non_empty_text(obj: &Map<String, Value>) -> Result<String, IntentError> {
    let text = required_str(obj, "text")?;
    if text.trim().is_empty() {
        return Err(IntentError::EmptyField("text"));
    }
    Ok(text.to_string())
}
