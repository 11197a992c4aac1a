//! Canonical mutable state of a routing session.

use std::collections::VecDeque;

use arbiter_context::ContextTracker;
use arbiter_models::{
    LifecycleState, Message, Ordinal, OrchestratorRecord, PersistedSession, SessionId,
};

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};

/// Where the human-facing conversation is currently pointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// No active Orchestrator; the Arbiter talks to the human.
    Human,
    /// The Arbiter is working with the given Orchestrator.
    Orchestrator(Ordinal),
}

/// The single live Orchestrator with its router-side bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct LiveOrchestrator {
    pub(crate) record: OrchestratorRecord,
    pub(crate) tracker: ContextTracker,
    /// Forwarded once the record becomes active.
    pub(crate) briefing: Option<String>,
    /// Turns sent to the session whose stream has not finished.
    pub(crate) in_flight: u32,
    /// Drain as soon as the spawn resolves.
    pub(crate) release_on_activate: bool,
}

impl LiveOrchestrator {
    pub(crate) fn new(ordinal: Ordinal, tracker: ContextTracker, briefing: Option<String>) -> Self {
        Self {
            record: OrchestratorRecord::new(ordinal),
            tracker,
            briefing,
            in_flight: 0,
            release_on_activate: false,
        }
    }

    pub(crate) fn ordinal(&self) -> Ordinal {
        self.record.ordinal
    }

    pub(crate) fn lifecycle(&self) -> LifecycleState {
        self.record.lifecycle
    }
}

/// Aggregate root owned by the router.
///
/// The conversation log is append-only and `orchestrator` is present
/// exactly while its record is spawning, active or draining.
#[derive(Debug, Clone)]
pub struct SessionState {
    log: Vec<Message>,
    arbiter_tracker: ContextTracker,
    arbiter_percent: f64,
    arbiter_session: Option<SessionId>,
    pub(crate) orchestrator: Option<LiveOrchestrator>,
    last_ordinal: Option<Ordinal>,
    last_orchestrator_session: Option<SessionId>,
    pub(crate) pending_summons: VecDeque<Option<String>>,
    halted: Option<String>,
}

impl SessionState {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            log: Vec::new(),
            arbiter_tracker: new_tracker(config),
            arbiter_percent: 0.0,
            arbiter_session: None,
            orchestrator: None,
            last_ordinal: None,
            last_orchestrator_session: None,
            pending_summons: VecDeque::new(),
            halted: None,
        }
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn arbiter_percent(&self) -> f64 {
        self.arbiter_percent
    }

    pub fn arbiter_session_id(&self) -> Option<&SessionId> {
        self.arbiter_session.as_ref()
    }

    /// Record of the live Orchestrator, if any.
    pub fn orchestrator(&self) -> Option<&OrchestratorRecord> {
        self.orchestrator.as_ref().map(|live| &live.record)
    }

    /// Lifecycle of the current record; `Disposed` once one has come and gone.
    pub fn lifecycle(&self) -> LifecycleState {
        match (&self.orchestrator, self.last_ordinal) {
            (Some(live), _) => live.lifecycle(),
            (None, Some(_)) => LifecycleState::Disposed,
            (None, None) => LifecycleState::None,
        }
    }

    pub fn mode(&self) -> RoutingMode {
        match &self.orchestrator {
            Some(live) if live.lifecycle() == LifecycleState::Active => {
                RoutingMode::Orchestrator(live.ordinal())
            }
            _ => RoutingMode::Human,
        }
    }

    /// Highest ordinal handed out so far.
    pub fn last_ordinal(&self) -> Option<Ordinal> {
        self.last_ordinal
    }

    /// Number of summons waiting for the current record to be disposed.
    pub fn pending_summons(&self) -> usize {
        self.pending_summons.len()
    }

    /// Notice recorded when routing froze.
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Flat resume record.
    pub fn snapshot(&self) -> PersistedSession {
        PersistedSession::new(
            self.arbiter_session.clone(),
            self.last_orchestrator_session.clone(),
            self.last_ordinal.map_or(0, Ordinal::get),
        )
    }

    /// Restores counters and session ids from a resume record.
    pub fn restore(&mut self, record: &PersistedSession) {
        self.arbiter_session = record.arbiter_session_id.clone();
        self.last_orchestrator_session = record.last_orchestrator_session_id.clone();
        self.last_ordinal = Ordinal::new(record.orchestrator_ordinal);
    }

    pub(crate) fn append(&mut self, message: Message) {
        self.log.push(message);
    }

    pub(crate) fn set_arbiter_session(&mut self, session_id: SessionId) {
        self.arbiter_session = Some(session_id);
    }

    pub(crate) fn arbiter_tracker(&self) -> &ContextTracker {
        &self.arbiter_tracker
    }

    pub(crate) fn arbiter_tracker_mut(&mut self) -> &mut ContextTracker {
        &mut self.arbiter_tracker
    }

    pub(crate) fn set_arbiter_percent(&mut self, percent: f64) {
        self.arbiter_percent = percent;
    }

    pub(crate) fn set_halted(&mut self, notice: String) {
        self.halted = Some(notice);
    }

    /// Live record matching `ordinal`.
    pub(crate) fn live_mut(&mut self, ordinal: Ordinal) -> Option<&mut LiveOrchestrator> {
        self.orchestrator
            .as_mut()
            .filter(|live| live.ordinal() == ordinal)
    }

    /// Percentage of the live record, for context updates.
    pub(crate) fn orchestrator_percent(&self) -> Option<f64> {
        self.orchestrator
            .as_ref()
            .map(|live| live.record.context_percent)
    }

    /// Hands out the next ordinal. Never reuses a value.
    pub(crate) fn next_ordinal(&mut self) -> Ordinal {
        let ordinal = self.last_ordinal.map_or(Ordinal::FIRST, Ordinal::next);
        self.last_ordinal = Some(ordinal);
        ordinal
    }

    pub(crate) fn install_orchestrator(&mut self, live: LiveOrchestrator) -> Result<()> {
        if let Some(existing) = &self.orchestrator {
            return Err(RouterError::LifecycleViolation(format!(
                "Orchestrator {} is still {} while installing Orchestrator {}",
                existing.ordinal(),
                existing.lifecycle(),
                live.ordinal()
            )));
        }
        self.orchestrator = Some(live);
        Ok(())
    }

    /// Moves the live record to `next`.
    pub(crate) fn transition(&mut self, next: LifecycleState) -> Result<()> {
        let live = self.orchestrator.as_mut().ok_or_else(|| {
            RouterError::LifecycleViolation(format!("no live record to move to {next}"))
        })?;
        let current = live.lifecycle();
        if !current.can_transition_to(next) {
            return Err(RouterError::LifecycleViolation(format!(
                "Orchestrator {} cannot move from {current} to {next}",
                live.ordinal()
            )));
        }
        live.record.lifecycle = next;
        if let (LifecycleState::Active, Some(session_id)) = (next, &live.record.session_id) {
            self.last_orchestrator_session = Some(session_id.clone());
        }
        Ok(())
    }

    /// Marks the live record disposed and discards it.
    pub(crate) fn dispose(&mut self) -> Result<LiveOrchestrator> {
        self.transition(LifecycleState::Disposed)?;
        self.orchestrator.take().ok_or_else(|| {
            RouterError::LifecycleViolation("record vanished during disposal".into())
        })
    }
}

/// Fresh tracker for a new session, using the configured estimator.
pub(crate) fn new_tracker(config: &RouterConfig) -> ContextTracker {
    let mut tracker = ContextTracker::with_estimator(config.context, config.estimator);
    if let Some(tokens) = config.context_baseline {
        tracker.capture_baseline(tokens);
    }
    tracker
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(&RouterConfig::default())
    }

    fn live(state: &mut SessionState) -> Ordinal {
        let ordinal = state.next_ordinal();
        let tracker = ContextTracker::default();
        state
            .install_orchestrator(LiveOrchestrator::new(ordinal, tracker, None))
            .unwrap();
        ordinal
    }

    #[test]
    fn test_fresh_state() {
        let state = state();
        assert_eq!(state.lifecycle(), LifecycleState::None);
        assert_eq!(state.mode(), RoutingMode::Human);
        assert!(state.orchestrator().is_none());
        assert!(state.log().is_empty());
        assert_eq!(state.snapshot().orchestrator_ordinal, 0);
    }

    #[test]
    fn test_ordinals_never_repeat() {
        let mut state = state();
        assert_eq!(state.next_ordinal().get(), 1);
        assert_eq!(state.next_ordinal().get(), 2);
        assert_eq!(state.last_ordinal().map(Ordinal::get), Some(2));
    }

    #[test]
    fn test_second_install_is_a_violation() {
        let mut state = state();
        live(&mut state);
        let err = state
            .install_orchestrator(LiveOrchestrator::new(
                Ordinal::FIRST.next(),
                ContextTracker::default(),
                None,
            ))
            .unwrap_err();
        assert!(matches!(err, RouterError::LifecycleViolation(_)));
        assert_eq!(state.orchestrator().map(|r| r.ordinal), Some(Ordinal::FIRST));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut state = state();
        let ordinal = live(&mut state);

        state.transition(LifecycleState::Spawning).unwrap();
        assert_eq!(state.mode(), RoutingMode::Human);

        state.orchestrator.as_mut().unwrap().record.session_id = Some(SessionId::from_string("s-1"));
        state.transition(LifecycleState::Active).unwrap();
        assert_eq!(state.mode(), RoutingMode::Orchestrator(ordinal));

        state.transition(LifecycleState::Draining).unwrap();
        assert_eq!(state.mode(), RoutingMode::Human);

        let disposed = state.dispose().unwrap();
        assert_eq!(disposed.record.lifecycle, LifecycleState::Disposed);
        assert!(state.orchestrator().is_none());
        assert_eq!(state.lifecycle(), LifecycleState::Disposed);
        assert_eq!(
            state.snapshot().last_orchestrator_session_id,
            Some(SessionId::from_string("s-1"))
        );
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut state = state();
        live(&mut state);
        let err = state.transition(LifecycleState::Draining).unwrap_err();
        assert!(matches!(err, RouterError::LifecycleViolation(_)));
        assert_eq!(state.lifecycle(), LifecycleState::None);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut state = state();
        state.set_arbiter_session(SessionId::from_string("arb"));
        state.next_ordinal();
        state.next_ordinal();

        let record = state.snapshot();
        let mut restored = SessionState::new(&RouterConfig::default());
        restored.restore(&record);

        assert_eq!(restored.arbiter_session_id(), Some(&SessionId::from_string("arb")));
        assert_eq!(restored.next_ordinal().get(), 3);
    }
}
