//! UI-facing event sink.
//!
//! Callbacks are fire-and-forget: the router never looks at a return
//! value and never waits on the UI.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use arbiter_models::Ordinal;

/// Severity of a debug log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of the router's debug log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugEntry {
    pub level: DebugLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DebugEntry {
    pub fn new(level: DebugLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Sink for externally observable router changes.
///
/// Every method has a no-op default so UIs implement only what they show.
pub trait EventCallbacks: Send + Sync {
    fn on_human_message(&self, _text: &str) {}
    fn on_arbiter_message(&self, _text: &str) {}
    fn on_orchestrator_message(&self, _ordinal: Ordinal, _text: &str, _display_only: bool) {}
    fn on_context_update(&self, _arbiter_percent: f64, _orchestrator_percent: Option<f64>) {}
    fn on_tool_use(&self, _name: &str, _count: u32) {}
    fn on_orchestrator_spawn(&self, _ordinal: Ordinal) {}
    fn on_orchestrator_disconnect(&self) {}
    fn on_debug_log(&self, _entry: &DebugEntry) {}
    /// Terse notice shown to the human when routing halts.
    fn on_fatal_error(&self, _notice: &str) {}
}

/// Callbacks that drop every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl EventCallbacks for NoopCallbacks {}

/// Enum form of each callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    HumanMessage {
        text: String,
    },
    ArbiterMessage {
        text: String,
    },
    OrchestratorMessage {
        ordinal: Ordinal,
        text: String,
        display_only: bool,
    },
    ContextUpdate {
        arbiter_percent: f64,
        orchestrator_percent: Option<f64>,
    },
    ToolUse {
        name: String,
        count: u32,
    },
    OrchestratorSpawn {
        ordinal: Ordinal,
    },
    OrchestratorDisconnect,
    DebugLog(DebugEntry),
    FatalError {
        notice: String,
    },
}

impl UiEvent {
    /// Invokes the matching callback.
    pub fn deliver(&self, callbacks: &dyn EventCallbacks) {
        match self {
            UiEvent::HumanMessage { text } => callbacks.on_human_message(text),
            UiEvent::ArbiterMessage { text } => callbacks.on_arbiter_message(text),
            UiEvent::OrchestratorMessage {
                ordinal,
                text,
                display_only,
            } => callbacks.on_orchestrator_message(*ordinal, text, *display_only),
            UiEvent::ContextUpdate {
                arbiter_percent,
                orchestrator_percent,
            } => callbacks.on_context_update(*arbiter_percent, *orchestrator_percent),
            UiEvent::ToolUse { name, count } => callbacks.on_tool_use(name, *count),
            UiEvent::OrchestratorSpawn { ordinal } => callbacks.on_orchestrator_spawn(*ordinal),
            UiEvent::OrchestratorDisconnect => callbacks.on_orchestrator_disconnect(),
            UiEvent::DebugLog(entry) => callbacks.on_debug_log(entry),
            UiEvent::FatalError { notice } => callbacks.on_fatal_error(notice),
        }
    }
}

/// Fans events out to any number of UI subscribers over a broadcast channel.
///
/// Sends never block; events are dropped while nobody is subscribed and
/// lagging subscribers lose the oldest events.
pub struct ChannelCallbacks {
    tx: broadcast::Sender<UiEvent>,
}

impl ChannelCallbacks {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for ChannelCallbacks {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventCallbacks for ChannelCallbacks {
    fn on_human_message(&self, text: &str) {
        self.send(UiEvent::HumanMessage { text: text.into() });
    }

    fn on_arbiter_message(&self, text: &str) {
        self.send(UiEvent::ArbiterMessage { text: text.into() });
    }

    fn on_orchestrator_message(&self, ordinal: Ordinal, text: &str, display_only: bool) {
        self.send(UiEvent::OrchestratorMessage {
            ordinal,
            text: text.into(),
            display_only,
        });
    }

    fn on_context_update(&self, arbiter_percent: f64, orchestrator_percent: Option<f64>) {
        self.send(UiEvent::ContextUpdate {
            arbiter_percent,
            orchestrator_percent,
        });
    }

    fn on_tool_use(&self, name: &str, count: u32) {
        self.send(UiEvent::ToolUse {
            name: name.into(),
            count,
        });
    }

    fn on_orchestrator_spawn(&self, ordinal: Ordinal) {
        self.send(UiEvent::OrchestratorSpawn { ordinal });
    }

    fn on_orchestrator_disconnect(&self) {
        self.send(UiEvent::OrchestratorDisconnect);
    }

    fn on_debug_log(&self, entry: &DebugEntry) {
        self.send(UiEvent::DebugLog(entry.clone()));
    }

    fn on_fatal_error(&self, notice: &str) {
        self.send(UiEvent::FatalError {
            notice: notice.into(),
        });
    }
}
