//! The routing reducer.
//!
//! [`Router`] owns [`SessionState`] and is the only thing that mutates it.
//! Each input is handled in one synchronous step that commits the new
//! state and returns the [`Effect`]s to carry out, so every routing
//! decision reads a consistent lifecycle state. No I/O happens here.

use tracing::{debug, error, info, warn};

use arbiter_adapters::AdapterError;
use arbiter_context::{ContextWarning, PollMark};
use arbiter_models::{
    ContextSample, LifecycleState, Message, MessageKind, Ordinal, OrchestratorReply,
    PersistedSession, RoutingIntent, SessionId, Speaker, TurnEvent,
};

use crate::callbacks::{DebugEntry, DebugLevel, UiEvent};
use crate::config::{RouterConfig, ViolationPolicy};
use crate::effect::{Effect, Target};
use crate::error::{ProtocolError, Result, RouterError};
use crate::state::{new_tracker, LiveOrchestrator, SessionState};

/// Pure state machine for the Arbiter/Orchestrator hierarchy.
pub struct Router {
    state: SessionState,
    config: RouterConfig,
    failure: Option<(Target, AdapterError)>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            state: SessionState::new(&config),
            config,
            failure: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Restores ordinal counters and session ids from a resume record.
    pub fn restore(&mut self, record: &PersistedSession) {
        self.state.restore(record);
    }

    /// Records the Arbiter's underlying session once it has started.
    pub fn arbiter_started(&mut self, session_id: SessionId) {
        self.state.set_arbiter_session(session_id);
    }

    /// The transport failure that halted routing, taken once.
    pub fn take_failure(&mut self) -> Option<(Target, AdapterError)> {
        self.failure.take()
    }

    /// A message typed by the human, addressed to the Arbiter.
    pub fn human_message(&mut self, text: &str) -> Result<Vec<Effect>> {
        if let Some(notice) = self.state.halted() {
            return Err(RouterError::Halted(notice.to_string()));
        }
        self.state.append(Message::new(Speaker::Human, text));
        Ok(vec![
            Effect::Emit(UiEvent::HumanMessage { text: text.into() }),
            Effect::forward(Target::Arbiter, text),
        ])
    }

    /// One decoded event from the Arbiter's turn stream.
    pub fn arbiter_turn(&mut self, event: &TurnEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.state.is_halted() {
            return fx;
        }

        if let Some(usage) = &event.usage {
            self.fold_arbiter_usage(usage, &mut fx);
        }
        if let Some(tool) = &event.tool_use {
            self.debug_log(DebugLevel::Debug, format!("Arbiter used {}", tool.name), &mut fx);
        }

        let intent = match &event.intent {
            Some(value) => match RoutingIntent::decode(value) {
                Ok(intent) => intent,
                Err(error) => {
                    let err = ProtocolError::MalformedIntent {
                        speaker: Speaker::Arbiter,
                        error,
                    };
                    self.protocol_error(err, &mut fx);
                    return fx;
                }
            },
            None => {
                if !event.text.trim().is_empty() {
                    let err = ProtocolError::UnroutedText {
                        speaker: Speaker::Arbiter,
                    };
                    self.protocol_error(err, &mut fx);
                }
                return fx;
            }
        };

        let visible = intent.text().unwrap_or(event.text.as_str());
        if !visible.trim().is_empty() {
            let kind = match intent {
                RoutingIntent::Musings { .. } => MessageKind::Musing,
                _ => MessageKind::Dialogue,
            };
            self.state
                .append(Message::with_kind(Speaker::Arbiter, visible, kind));
        }

        match intent {
            RoutingIntent::AddressHuman { text } => {
                fx.push(Effect::Emit(UiEvent::ArbiterMessage { text }));
            }
            RoutingIntent::AddressOrchestrator { text } => self.address_orchestrator(text, &mut fx),
            RoutingIntent::SummonOrchestrator { briefing } => {
                let briefing = briefing.or_else(|| {
                    let text = event.text.trim();
                    (!text.is_empty()).then(|| text.to_string())
                });
                self.summon(briefing, &mut fx);
            }
            RoutingIntent::ReleaseOrchestrators => self.release(&mut fx),
            RoutingIntent::Musings { .. } => {
                self.debug_log(DebugLevel::Debug, "Arbiter musing recorded", &mut fx);
            }
        }
        fx
    }

    /// One decoded event from an Orchestrator's turn stream.
    ///
    /// Events from anything but the current live record are stale and dropped.
    pub fn orchestrator_turn(&mut self, ordinal: Ordinal, event: &TurnEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.state.is_halted() {
            return fx;
        }

        let arbiter_percent = self.state.arbiter_percent();
        let Some(live) = self.state.live_mut(ordinal) else {
            self.debug_log(
                DebugLevel::Debug,
                format!("stale event from Orchestrator {ordinal} ignored"),
                &mut fx,
            );
            return fx;
        };
        let lifecycle = live.lifecycle();
        if lifecycle == LifecycleState::Spawning {
            self.debug_log(
                DebugLevel::Warn,
                format!("event from Orchestrator {ordinal} before it became active"),
                &mut fx,
            );
            return fx;
        }

        let mut warnings = Vec::new();
        if let Some(usage) = &event.usage {
            if live.tracker.update(usage) {
                let percent = live.tracker.get_percent();
                live.record.context_percent = percent;
                warnings = live.tracker.take_warnings();
                fx.push(Effect::Emit(UiEvent::ContextUpdate {
                    arbiter_percent,
                    orchestrator_percent: Some(percent),
                }));
            }
        }
        if let Some(tool) = &event.tool_use {
            let count = live.record.record_tool_use(tool.name.clone());
            fx.push(Effect::Emit(UiEvent::ToolUse {
                name: tool.name.clone(),
                count,
            }));
        }
        self.context_warnings(Target::Orchestrator(ordinal), warnings, &mut fx);

        let speaker = Speaker::Orchestrator(ordinal);
        let reply = match &event.intent {
            Some(value) => match OrchestratorReply::decode(value) {
                Ok(reply) => reply,
                Err(error) => {
                    self.protocol_error(ProtocolError::MalformedIntent { speaker, error }, &mut fx);
                    return fx;
                }
            },
            None => {
                if !event.text.trim().is_empty() {
                    self.protocol_error(ProtocolError::UnroutedText { speaker }, &mut fx);
                }
                return fx;
            }
        };

        let display_only = !reply.expects_response || lifecycle == LifecycleState::Draining;
        let kind = if display_only {
            MessageKind::DisplayOnly
        } else {
            MessageKind::Dialogue
        };
        self.state
            .append(Message::with_kind(speaker, reply.text.clone(), kind));
        fx.push(Effect::Emit(UiEvent::OrchestratorMessage {
            ordinal,
            text: reply.text.clone(),
            display_only,
        }));
        if !display_only {
            fx.push(Effect::forward(Target::Arbiter, reply.text));
        }
        fx
    }

    /// Outcome of a `StartOrchestrator` effect.
    pub fn spawn_resolved(
        &mut self,
        ordinal: Ordinal,
        attempt: u32,
        result: std::result::Result<SessionId, AdapterError>,
    ) -> Vec<Effect> {
        let mut fx = Vec::new();
        let pending = self
            .state
            .live_mut(ordinal)
            .is_some_and(|live| live.lifecycle() == LifecycleState::Spawning);

        if !pending || self.state.is_halted() {
            if result.is_ok() {
                fx.push(Effect::CloseOrchestrator { ordinal });
            }
            self.debug_log(
                DebugLevel::Debug,
                format!("spawn result for Orchestrator {ordinal} is stale"),
                &mut fx,
            );
            return fx;
        }

        let session_id = match result {
            Ok(session_id) => session_id,
            Err(err) if attempt <= self.config.transport_retries => {
                self.debug_log(
                    DebugLevel::Warn,
                    format!("starting Orchestrator {ordinal} failed ({err}), retrying"),
                    &mut fx,
                );
                fx.push(Effect::StartOrchestrator {
                    ordinal,
                    attempt: attempt + 1,
                });
                return fx;
            }
            Err(err) => {
                self.fatal(Target::Orchestrator(ordinal), err, &mut fx);
                return fx;
            }
        };

        if let Some(live) = self.state.live_mut(ordinal) {
            live.record.session_id = Some(session_id);
        }
        if let Err(err) = self.state.transition(LifecycleState::Active) {
            self.violation(err, &mut fx);
            return fx;
        }

        fx.push(Effect::Emit(UiEvent::OrchestratorSpawn { ordinal }));
        fx.push(Effect::Emit(UiEvent::ContextUpdate {
            arbiter_percent: self.state.arbiter_percent(),
            orchestrator_percent: self.state.orchestrator_percent(),
        }));
        self.debug_log(DebugLevel::Info, format!("Orchestrator {ordinal} is active"), &mut fx);

        // A later summon already waits behind this record.
        let superseded = !self.state.pending_summons.is_empty();
        let Some(live) = self.state.live_mut(ordinal) else {
            return fx;
        };
        if live.release_on_activate || superseded {
            live.briefing = None;
            self.begin_drain(&mut fx);
        } else if let Some(briefing) = live.briefing.take() {
            live.in_flight += 1;
            fx.push(Effect::forward(Target::Orchestrator(ordinal), briefing));
        }
        fx
    }

    /// A forwarded turn's stream ended normally.
    pub fn turn_finished(&mut self, target: Target) -> Vec<Effect> {
        let mut fx = Vec::new();
        let Target::Orchestrator(ordinal) = target else {
            return fx;
        };
        let Some(live) = self.state.live_mut(ordinal) else {
            return fx;
        };
        live.in_flight = live.in_flight.saturating_sub(1);
        if live.lifecycle() == LifecycleState::Draining && live.in_flight == 0 {
            self.finish_disposal(&mut fx);
        }
        fx
    }

    /// A forward failed to send or its stream broke mid-turn.
    ///
    /// Retried with the same text to the same target while the retry
    /// budget lasts; after that routing halts.
    pub fn transport_failed(
        &mut self,
        target: Target,
        text: &str,
        attempt: u32,
        err: AdapterError,
    ) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.state.is_halted() {
            return fx;
        }
        let retry = attempt <= self.config.transport_retries;

        if let Target::Orchestrator(ordinal) = target {
            let Some(live) = self.state.live_mut(ordinal) else {
                self.debug_log(
                    DebugLevel::Debug,
                    format!("transport failure from stale Orchestrator {ordinal} ignored"),
                    &mut fx,
                );
                return fx;
            };
            live.in_flight = live.in_flight.saturating_sub(1);
            if live.lifecycle() == LifecycleState::Draining {
                let drained = live.in_flight == 0;
                self.debug_log(
                    DebugLevel::Warn,
                    format!("turn to draining Orchestrator {ordinal} lost: {err}"),
                    &mut fx,
                );
                if drained {
                    self.finish_disposal(&mut fx);
                }
                return fx;
            }
            if retry {
                live.in_flight += 1;
            }
        }

        if retry {
            self.debug_log(
                DebugLevel::Warn,
                format!("transport failure talking to {target} ({err}), retrying"),
                &mut fx,
            );
            fx.push(Effect::Forward {
                target,
                text: text.to_string(),
                attempt: attempt + 1,
            });
        } else {
            self.fatal(target, err, &mut fx);
        }
        fx
    }

    /// Snapshot a probe of `target` is measured against, taken at launch.
    ///
    /// `None` when `target` is not the live record.
    pub fn poll_mark(&self, target: Target) -> Option<PollMark> {
        match target {
            Target::Arbiter => Some(self.state.arbiter_tracker().mark_poll()),
            Target::Orchestrator(ordinal) => self
                .state
                .orchestrator
                .as_ref()
                .filter(|live| live.ordinal() == ordinal)
                .map(|live| live.tracker.mark_poll()),
        }
    }

    /// Result of an out-of-band context probe launched at `mark`.
    pub fn context_polled(
        &mut self,
        target: Target,
        mark: PollMark,
        result: std::result::Result<u64, AdapterError>,
    ) -> Vec<Effect> {
        let mut fx = Vec::new();
        let tokens = match result {
            Ok(tokens) => tokens,
            Err(err) => {
                let warning = ContextWarning::ProbeFailed(format!("{target}: {err}"));
                self.debug_log(DebugLevel::Warn, warning.to_string(), &mut fx);
                return fx;
            }
        };

        let warnings = match target {
            Target::Arbiter => {
                let tracker = self.state.arbiter_tracker_mut();
                if !tracker.apply_poll(tokens, mark) {
                    self.debug_log(
                        DebugLevel::Debug,
                        format!("superseded context measurement of {target} dropped"),
                        &mut fx,
                    );
                    return fx;
                }
                let percent = tracker.get_percent();
                let warnings = tracker.take_warnings();
                self.state.set_arbiter_percent(percent);
                warnings
            }
            Target::Orchestrator(ordinal) => {
                let Some(live) = self.state.live_mut(ordinal) else {
                    return fx;
                };
                if !live.tracker.apply_poll(tokens, mark) {
                    self.debug_log(
                        DebugLevel::Debug,
                        format!("superseded context measurement of {target} dropped"),
                        &mut fx,
                    );
                    return fx;
                }
                live.record.context_percent = live.tracker.get_percent();
                live.tracker.take_warnings()
            }
        };
        fx.push(Effect::Emit(UiEvent::ContextUpdate {
            arbiter_percent: self.state.arbiter_percent(),
            orchestrator_percent: self.state.orchestrator_percent(),
        }));
        self.context_warnings(target, warnings, &mut fx);
        fx
    }

    /// Operator escape path: dispose the live record without draining.
    ///
    /// Queued summons are dropped as well.
    pub fn dispose_now(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.state.pending_summons.clear();
        if self.state.orchestrator.is_none() {
            self.debug_log(DebugLevel::Debug, "no live Orchestrator to dispose", &mut fx);
            return fx;
        }
        self.dispose_live(&mut fx);
        fx
    }

    fn address_orchestrator(&mut self, text: String, fx: &mut Vec<Effect>) {
        let state = self.state.lifecycle();
        match self.state.orchestrator.as_mut() {
            Some(live) if live.lifecycle() == LifecycleState::Active => {
                let ordinal = live.ordinal();
                live.in_flight += 1;
                fx.push(Effect::forward(Target::Orchestrator(ordinal), text));
                self.debug_log(DebugLevel::Info, format!("Arbiter -> Orchestrator {ordinal}"), fx);
            }
            _ => {
                let err = ProtocolError::NoActiveOrchestrator {
                    intent: "address_orchestrator",
                    state,
                };
                self.protocol_error(err, fx);
            }
        }
    }

    fn summon(&mut self, briefing: Option<String>, fx: &mut Vec<Effect>) {
        let Some(live) = self.state.orchestrator.as_mut() else {
            self.begin_spawn(briefing, fx);
            return;
        };

        let current = live.ordinal();
        let lifecycle = live.lifecycle();
        if lifecycle == LifecycleState::Spawning {
            live.release_on_activate = true;
        }
        self.state.pending_summons.push_back(briefing);
        self.debug_log(
            DebugLevel::Info,
            format!("summon queued until Orchestrator {current} is disposed"),
            fx,
        );
        if lifecycle == LifecycleState::Active {
            self.begin_drain(fx);
        }
    }

    fn release(&mut self, fx: &mut Vec<Effect>) {
        self.state.pending_summons.clear();
        let Some(live) = self.state.orchestrator.as_mut() else {
            self.protocol_error(ProtocolError::NothingToRelease, fx);
            return;
        };
        match live.lifecycle() {
            LifecycleState::Spawning => live.release_on_activate = true,
            LifecycleState::Active => self.begin_drain(fx),
            _ => {}
        }
    }

    fn begin_spawn(&mut self, briefing: Option<String>, fx: &mut Vec<Effect>) {
        if let Some(live) = &self.state.orchestrator {
            let err = RouterError::LifecycleViolation(format!(
                "spawn requested while Orchestrator {} is {}",
                live.ordinal(),
                live.lifecycle()
            ));
            self.violation(err, fx);
            return;
        }

        let ordinal = self.state.next_ordinal();
        let tracker = new_tracker(&self.config);
        let installed = self
            .state
            .install_orchestrator(LiveOrchestrator::new(ordinal, tracker, briefing))
            .and_then(|()| self.state.transition(LifecycleState::Spawning));
        if let Err(err) = installed {
            self.violation(err, fx);
            return;
        }

        fx.push(Effect::StartOrchestrator {
            ordinal,
            attempt: 1,
        });
        self.debug_log(DebugLevel::Info, format!("summoning Orchestrator {ordinal}"), fx);
    }

    fn begin_drain(&mut self, fx: &mut Vec<Effect>) {
        if let Err(err) = self.state.transition(LifecycleState::Draining) {
            self.violation(err, fx);
            return;
        }
        let Some(live) = &self.state.orchestrator else {
            return;
        };
        let (ordinal, in_flight) = (live.ordinal(), live.in_flight);
        self.debug_log(
            DebugLevel::Info,
            format!("Orchestrator {ordinal} draining ({in_flight} turns in flight)"),
            fx,
        );
        if in_flight == 0 {
            self.finish_disposal(fx);
        }
    }

    /// Disposes a drained record, then starts the next queued summon.
    fn finish_disposal(&mut self, fx: &mut Vec<Effect>) {
        if !self.dispose_live(fx) {
            return;
        }
        if let Some(briefing) = self.state.pending_summons.pop_front() {
            self.begin_spawn(briefing, fx);
        }
    }

    fn dispose_live(&mut self, fx: &mut Vec<Effect>) -> bool {
        let live = match self.state.dispose() {
            Ok(live) => live,
            Err(err) => {
                self.violation(err, fx);
                return false;
            }
        };
        let ordinal = live.ordinal();
        fx.push(Effect::CloseOrchestrator { ordinal });
        fx.push(Effect::Emit(UiEvent::OrchestratorDisconnect));
        fx.push(Effect::Emit(UiEvent::ContextUpdate {
            arbiter_percent: self.state.arbiter_percent(),
            orchestrator_percent: None,
        }));
        self.debug_log(DebugLevel::Info, format!("Orchestrator {ordinal} disposed"), fx);
        true
    }

    fn fatal(&mut self, target: Target, err: AdapterError, fx: &mut Vec<Effect>) {
        let notice = format!("Lost contact with {target} ({err}). Routing has stopped.");
        error!(%target, error = %err, "transport failed after retry, halting");

        self.state
            .append(Message::with_kind(Speaker::System, notice.clone(), MessageKind::Notice));

        if let Target::Orchestrator(ordinal) = target {
            if self.state.live_mut(ordinal).is_some() {
                self.dispose_live(fx);
            }
        }

        self.state.set_halted(notice.clone());
        self.failure = Some((target, err));
        fx.push(Effect::Emit(UiEvent::FatalError { notice }));
    }

    fn fold_arbiter_usage(&mut self, usage: &ContextSample, fx: &mut Vec<Effect>) {
        let tracker = self.state.arbiter_tracker_mut();
        if !tracker.update(usage) {
            return;
        }
        let percent = tracker.get_percent();
        let warnings = tracker.take_warnings();
        self.state.set_arbiter_percent(percent);
        fx.push(Effect::Emit(UiEvent::ContextUpdate {
            arbiter_percent: percent,
            orchestrator_percent: self.state.orchestrator_percent(),
        }));
        self.context_warnings(Target::Arbiter, warnings, fx);
    }

    fn context_warnings(&self, target: Target, warnings: Vec<ContextWarning>, fx: &mut Vec<Effect>) {
        for warning in warnings {
            self.debug_log(DebugLevel::Warn, format!("{target}: {warning}"), fx);
        }
    }

    fn protocol_error(&self, err: ProtocolError, fx: &mut Vec<Effect>) {
        self.debug_log(DebugLevel::Warn, err.to_string(), fx);
    }

    fn violation(&self, err: RouterError, fx: &mut Vec<Effect>) {
        match self.config.violation_policy {
            ViolationPolicy::Panic => panic!("{err}"),
            ViolationPolicy::Ignore => {
                self.debug_log(DebugLevel::Error, format!("{err}; request ignored"), fx);
            }
        }
    }

    fn debug_log(&self, level: DebugLevel, message: impl Into<String>, fx: &mut Vec<Effect>) {
        let entry = DebugEntry::new(level, message);
        match level {
            DebugLevel::Debug => debug!("{}", entry.message),
            DebugLevel::Info => info!("{}", entry.message),
            DebugLevel::Warn => warn!("{}", entry.message),
            DebugLevel::Error => error!("{}", entry.message),
        }
        fx.push(Effect::Emit(UiEvent::DebugLog(entry)));
    }
}
