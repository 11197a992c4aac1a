//! Async driver for the [`Router`].
//!
//! The engine owns the adapter handles and the inbound event channel.
//! Session streams, spawn requests and probes run as tasks that report
//! back through one unbounded channel; the engine feeds each message to
//! the router and executes the resulting effects before taking the next.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use arbiter_adapters::{AdapterError, SessionAdapter, SessionHandle};
use arbiter_context::PollMark;
use arbiter_models::{LifecycleState, Ordinal, PersistedSession, TurnEvent};
use arbiter_persistence::SessionStore;

use crate::callbacks::EventCallbacks;
use crate::config::RouterConfig;
use crate::effect::{Effect, Target};
use crate::error::{Result, RouterError};
use crate::probe::spawn_probe;
use crate::router::Router;
use crate::state::SessionState;

/// Messages from background tasks to the engine.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// One event of a running turn, in stream order.
    Turn { source: Target, event: TurnEvent },
    /// The turn's stream ended normally.
    TurnFinished { source: Target },
    /// The turn's stream broke.
    StreamFailed {
        source: Target,
        text: String,
        attempt: u32,
        error: AdapterError,
    },
    SpawnResolved {
        ordinal: Ordinal,
        attempt: u32,
        result: std::result::Result<SessionHandle, AdapterError>,
    },
    ContextPolled {
        source: Target,
        mark: PollMark,
        result: std::result::Result<u64, AdapterError>,
    },
}

impl Inbound {
    /// Whether this is the last message a background task sends.
    fn is_terminal(&self) -> bool {
        !matches!(self, Inbound::Turn { .. })
    }
}

/// Drives a [`Router`] against a live [`SessionAdapter`].
pub struct RoutingEngine {
    router: Router,
    adapter: Arc<dyn SessionAdapter>,
    callbacks: Arc<dyn EventCallbacks>,
    /// Arbiter session, once started.
    arbiter: Option<SessionHandle>,
    /// Orchestrator sessions keyed by ordinal.
    orchestrators: HashMap<Ordinal, SessionHandle>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    /// Background tasks that have not sent their terminal message.
    outstanding: usize,
    store: Option<SessionStore>,
}

impl RoutingEngine {
    pub fn new(
        adapter: Arc<dyn SessionAdapter>,
        callbacks: Arc<dyn EventCallbacks>,
        config: RouterConfig,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            router: Router::new(config),
            adapter,
            callbacks,
            arbiter: None,
            orchestrators: HashMap::new(),
            inbound_tx,
            inbound_rx,
            outstanding: 0,
            store: None,
        }
    }

    /// Saves the resume record to `store` on shutdown.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Restores counters from a saved record and reattaches the Arbiter
    /// session on the next [`start`](Self::start).
    pub fn resume(&mut self, record: &PersistedSession) {
        self.router.restore(record);
        info!(
            arbiter = ?record.arbiter_session_id,
            ordinal = record.orchestrator_ordinal,
            "resuming session"
        );
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> &SessionState {
        self.router.state()
    }

    /// True when no background task is still running.
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0
    }

    /// Starts (or reattaches to) the Arbiter session.
    pub async fn start(&mut self) -> Result<()> {
        let config = self
            .router
            .config()
            .arbiter_session
            .clone()
            .with_resume(self.state().arbiter_session_id().cloned());
        let retries = self.router.config().transport_retries;

        let mut attempt = 1;
        let handle = loop {
            match self.adapter.start(&config).await {
                Ok(handle) => break handle,
                Err(e) if attempt <= retries => {
                    warn!(attempt, error = %e, "starting Arbiter session failed, retrying");
                    attempt += 1;
                }
                Err(source) => {
                    return Err(RouterError::Transport {
                        target: Target::Arbiter,
                        source,
                    })
                }
            }
        };

        info!(session = %handle.session_id, adapter = %self.adapter.info().id, "Arbiter session started");
        self.router.arbiter_started(handle.session_id.clone());
        self.arbiter = Some(handle.clone());

        if self.router.config().probe_on_start {
            self.probe(handle, Target::Arbiter);
        }
        Ok(())
    }

    /// Appends a human message and forwards it to the Arbiter.
    pub async fn handle_human_message(&mut self, text: &str) -> Result<()> {
        let effects = self.router.human_message(text)?;
        self.apply(effects).await
    }

    /// Routes one decoded Arbiter event.
    pub async fn handle_arbiter_turn(&mut self, event: &TurnEvent) -> Result<()> {
        let effects = self.router.arbiter_turn(event);
        self.apply(effects).await
    }

    /// Routes one decoded Orchestrator event.
    pub async fn handle_orchestrator_turn(&mut self, ordinal: Ordinal, event: &TurnEvent) -> Result<()> {
        let effects = self.router.orchestrator_turn(ordinal, event);
        self.apply(effects).await
    }

    /// Waits for the next background message and processes it.
    ///
    /// Returns `false` without waiting when nothing is outstanding.
    pub async fn step(&mut self) -> Result<bool> {
        if self.is_idle() {
            return Ok(false);
        }
        match self.inbound_rx.recv().await {
            Some(inbound) => {
                self.process(inbound).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Processes background messages until every task has finished.
    pub async fn settle(&mut self) -> Result<()> {
        while self.step().await? {}
        Ok(())
    }

    /// Probes the Arbiter and the active Orchestrator, if any.
    pub fn poll_context(&mut self) {
        if let Some(handle) = self.arbiter.clone() {
            self.probe(handle, Target::Arbiter);
        }
        if let Some(record) = self.state().orchestrator() {
            let ordinal = record.ordinal;
            self.probe_orchestrator(ordinal);
        }
    }

    /// Disposes the live Orchestrator immediately, skipping the drain.
    pub async fn dispose_now(&mut self) -> Result<()> {
        let effects = self.router.dispose_now();
        self.apply(effects).await
    }

    /// Saves the resume record and returns it.
    ///
    /// Sessions are left open so external tooling can reattach to them.
    pub async fn shutdown(&mut self) -> Result<PersistedSession> {
        let record = self.state().snapshot();
        if let Some(store) = &self.store {
            store.save(&record)?;
        }
        info!(ordinal = record.orchestrator_ordinal, "routing session saved");
        Ok(record)
    }

    /// Runs until the human input channel closes or routing halts.
    ///
    /// The resume record is saved on the way out either way.
    pub async fn run(mut self, mut human_rx: mpsc::Receiver<String>) -> Result<PersistedSession> {
        if self.arbiter.is_none() {
            self.start().await?;
        }
        let mut ticker = self.router.config().poll_interval.map(poll_ticker);

        let outcome = loop {
            let result = tokio::select! {
                maybe = human_rx.recv() => match maybe {
                    Some(text) => self.handle_human_message(&text).await,
                    None => break Ok(()),
                },
                Some(inbound) = self.inbound_rx.recv() => self.process(inbound).await,
                _ = tick(&mut ticker) => {
                    self.poll_context();
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!(error = %e, "routing stopped");
                break Err(e);
            }
        };

        let record = self.shutdown().await?;
        outcome.map(|()| record)
    }

    async fn process(&mut self, inbound: Inbound) -> Result<()> {
        if inbound.is_terminal() {
            self.outstanding = self.outstanding.saturating_sub(1);
        }

        let effects = match inbound {
            Inbound::Turn {
                source: Target::Arbiter,
                event,
            } => self.router.arbiter_turn(&event),
            Inbound::Turn {
                source: Target::Orchestrator(ordinal),
                event,
            } => self.router.orchestrator_turn(ordinal, &event),
            Inbound::TurnFinished { source } => self.router.turn_finished(source),
            Inbound::StreamFailed {
                source,
                text,
                attempt,
                error,
            } => self.router.transport_failed(source, &text, attempt, error),
            Inbound::SpawnResolved {
                ordinal,
                attempt,
                result,
            } => {
                let result = result.map(|handle| {
                    let session_id = handle.session_id.clone();
                    self.orchestrators.insert(ordinal, handle);
                    session_id
                });
                let effects = self.router.spawn_resolved(ordinal, attempt, result);
                // Measured before the briefing goes out, as a fresh-session baseline.
                if self.router.config().probe_on_start {
                    self.probe_orchestrator(ordinal);
                }
                effects
            }
            Inbound::ContextPolled {
                source,
                mark,
                result,
            } => self.router.context_polled(source, mark, result),
        };
        self.apply(effects).await
    }

    /// Executes effects in order, including any produced while doing so.
    async fn apply(&mut self, effects: Vec<Effect>) -> Result<()> {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Emit(event) => event.deliver(self.callbacks.as_ref()),
                Effect::Forward {
                    target,
                    text,
                    attempt,
                } => {
                    if let Err(e) = self.forward(target, &text, attempt).await {
                        queue.extend(self.router.transport_failed(target, &text, attempt, e));
                    }
                }
                Effect::StartOrchestrator { ordinal, attempt } => self.start_orchestrator(ordinal, attempt),
                Effect::CloseOrchestrator { ordinal } => self.close_orchestrator(ordinal).await,
            }
        }

        match self.router.take_failure() {
            Some((target, source)) => Err(RouterError::Transport { target, source }),
            None => Ok(()),
        }
    }

    /// Sends a user turn and pumps its stream into the inbound channel.
    async fn forward(&mut self, target: Target, text: &str, attempt: u32) -> std::result::Result<(), AdapterError> {
        let handle = match target {
            Target::Arbiter => self.arbiter.as_ref(),
            Target::Orchestrator(ordinal) => self.orchestrators.get(&ordinal),
        }
        .ok_or_else(|| AdapterError::Unreachable(format!("{target} has no session")))?;

        debug!(%target, attempt, session = %handle.session_id, "forwarding turn");
        let mut stream = self.adapter.send(handle, text).await?;

        let tx = self.inbound_tx.clone();
        let text = text.to_string();
        self.outstanding += 1;
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let inbound = match item {
                    Ok(event) => Inbound::Turn {
                        source: target,
                        event,
                    },
                    Err(error) => {
                        let _ = tx.send(Inbound::StreamFailed {
                            source: target,
                            text,
                            attempt,
                            error,
                        });
                        return;
                    }
                };
                if tx.send(inbound).is_err() {
                    return;
                }
            }
            let _ = tx.send(Inbound::TurnFinished { source: target });
        });
        Ok(())
    }

    fn start_orchestrator(&mut self, ordinal: Ordinal, attempt: u32) {
        let config = self
            .router
            .config()
            .orchestrator_session
            .clone()
            .with_ordinal(ordinal);
        let adapter = Arc::clone(&self.adapter);
        let tx = self.inbound_tx.clone();

        debug!(%ordinal, attempt, "requesting Orchestrator session");
        self.outstanding += 1;
        tokio::spawn(async move {
            let result = adapter.start(&config).await;
            let _ = tx.send(Inbound::SpawnResolved {
                ordinal,
                attempt,
                result,
            });
        });
    }

    async fn close_orchestrator(&mut self, ordinal: Ordinal) {
        let Some(handle) = self.orchestrators.remove(&ordinal) else {
            return;
        };
        if let Err(e) = self.adapter.close(&handle).await {
            warn!(%ordinal, session = %handle.session_id, error = %e, "failed to close Orchestrator session");
        }
    }

    /// Probes Orchestrator `ordinal` if it is the active record.
    fn probe_orchestrator(&mut self, ordinal: Ordinal) {
        let active = self
            .state()
            .orchestrator()
            .is_some_and(|record| record.ordinal == ordinal && record.lifecycle == LifecycleState::Active);
        if !active {
            return;
        }
        if let Some(handle) = self.orchestrators.get(&ordinal).cloned() {
            self.probe(handle, Target::Orchestrator(ordinal));
        }
    }

    fn probe(&mut self, handle: SessionHandle, source: Target) {
        let Some(mark) = self.router.poll_mark(source) else {
            return;
        };
        self.outstanding += 1;
        spawn_probe(Arc::clone(&self.adapter), handle, source, mark, self.inbound_tx.clone());
    }
}

fn poll_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Next probe tick, or never when polling is disabled.
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
