//! In-memory adapter driven by pre-recorded turns.
//!
//! Used by tests and dry runs. Each `send` pops the next scripted turn for
//! the session's role; sends with nothing scripted produce an empty turn.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use arbiter_models::{SessionId, TurnEvent};

use crate::error::{AdapterError, Result};
use crate::traits::{AdapterInfo, SessionAdapter, SessionConfig, SessionHandle, SessionRole, TurnStream};

/// A user turn delivered to a scripted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTurn {
    pub session_id: SessionId,
    pub role: SessionRole,
    pub text: String,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRole>,
    turns: HashMap<SessionRole, VecDeque<Vec<Result<TurnEvent>>>>,
    send_failures: HashMap<SessionRole, u32>,
    start_failures: u32,
    context_tokens: Option<u64>,
    started: Vec<SessionConfig>,
    sent: Vec<SentTurn>,
    closed: Vec<SessionId>,
    forks: u32,
}

/// Adapter that replays scripted turns.
pub struct ScriptedAdapter {
    info: AdapterInfo,
    inner: Mutex<Inner>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self {
            info: AdapterInfo {
                id: "scripted".to_string(),
                name: "Scripted".to_string(),
                description: "Replays pre-recorded turns".to_string(),
            },
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Queues the events of the next turn for sessions with `role`.
    pub async fn push_turn(&self, role: SessionRole, events: Vec<TurnEvent>) {
        self.push_raw_turn(role, events.into_iter().map(Ok).collect()).await;
    }

    /// Queues a turn that may contain stream errors.
    pub async fn push_raw_turn(&self, role: SessionRole, events: Vec<Result<TurnEvent>>) {
        let mut inner = self.inner.lock().await;
        inner.turns.entry(role).or_default().push_back(events);
    }

    /// Makes the next `count` sends to `role` fail as unreachable.
    pub async fn fail_next_sends(&self, role: SessionRole, count: u32) {
        self.inner.lock().await.send_failures.insert(role, count);
    }

    /// Makes the next `count` starts fail.
    pub async fn fail_next_starts(&self, count: u32) {
        self.inner.lock().await.start_failures = count;
    }

    /// Value returned by `measure_context`; `None` makes it fail.
    pub async fn set_context_tokens(&self, tokens: Option<u64>) {
        self.inner.lock().await.context_tokens = tokens;
    }

    /// Every user turn delivered so far.
    pub async fn sent(&self) -> Vec<SentTurn> {
        self.inner.lock().await.sent.clone()
    }

    /// Texts delivered to sessions with `role`, in order.
    pub async fn sent_to(&self, role: SessionRole) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .sent
            .iter()
            .filter(|t| t.role == role)
            .map(|t| t.text.clone())
            .collect()
    }

    /// Configs of every successfully started session.
    pub async fn started(&self) -> Vec<SessionConfig> {
        self.inner.lock().await.started.clone()
    }

    pub async fn closed(&self) -> Vec<SessionId> {
        self.inner.lock().await.closed.clone()
    }

    pub async fn fork_count(&self) -> u32 {
        self.inner.lock().await.forks
    }
}

#[async_trait]
impl SessionAdapter for ScriptedAdapter {
    fn info(&self) -> &AdapterInfo {
        &self.info
    }

    async fn start(&self, config: &SessionConfig) -> Result<SessionHandle> {
        let mut inner = self.inner.lock().await;
        if inner.start_failures > 0 {
            inner.start_failures -= 1;
            return Err(AdapterError::StartFailed("scripted start failure".into()));
        }

        let session_id = config.resume.clone().unwrap_or_else(SessionId::random);
        inner.sessions.insert(session_id.clone(), config.role);
        inner.started.push(config.clone());
        debug!(session = %session_id, role = %config.role, "scripted session started");
        Ok(SessionHandle::new(session_id, config.role))
    }

    async fn send(&self, handle: &SessionHandle, text: &str) -> Result<TurnStream> {
        if handle.read_only {
            return Err(AdapterError::ReadOnly(handle.session_id.clone()));
        }

        let mut inner = self.inner.lock().await;
        if !inner.sessions.contains_key(&handle.session_id) {
            return Err(AdapterError::UnknownSession(handle.session_id.clone()));
        }
        if let Some(remaining) = inner.send_failures.get_mut(&handle.role) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AdapterError::Unreachable(format!(
                    "{} session {}",
                    handle.role, handle.session_id
                )));
            }
        }

        inner.sent.push(SentTurn {
            session_id: handle.session_id.clone(),
            role: handle.role,
            text: text.to_string(),
        });
        let events = inner
            .turns
            .get_mut(&handle.role)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(stream::iter(events).boxed())
    }

    async fn fork(&self, handle: &SessionHandle) -> Result<SessionHandle> {
        let mut inner = self.inner.lock().await;
        if !inner.sessions.contains_key(&handle.session_id) {
            return Err(AdapterError::UnknownSession(handle.session_id.clone()));
        }
        inner.forks += 1;
        Ok(handle.forked(SessionId::random()))
    }

    async fn measure_context(&self, _handle: &SessionHandle) -> Result<u64> {
        self.inner
            .lock()
            .await
            .context_tokens
            .ok_or(AdapterError::Unsupported("context measurement"))
    }

    async fn close(&self, handle: &SessionHandle) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(&handle.session_id);
        inner.closed.push(handle.session_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_replays_scripted_turn() {
        let adapter = ScriptedAdapter::new();
        adapter
            .push_turn(SessionRole::Arbiter, vec![TurnEvent::text("one"), TurnEvent::text("two")])
            .await;

        let handle = adapter.start(&SessionConfig::arbiter()).await.unwrap();
        let events: Vec<_> = adapter.send(&handle, "hi").await.unwrap().collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap().text, "two");
        assert_eq!(adapter.sent_to(SessionRole::Arbiter).await, vec!["hi"]);
    }

    #[tokio::test]
    async fn test_unscripted_send_is_empty_turn() {
        let adapter = ScriptedAdapter::new();
        let handle = adapter.start(&SessionConfig::orchestrator()).await.unwrap();
        let events: Vec<_> = adapter.send(&handle, "go").await.unwrap().collect().await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_send_failures_are_consumed() {
        let adapter = ScriptedAdapter::new();
        let handle = adapter.start(&SessionConfig::arbiter()).await.unwrap();
        adapter.fail_next_sends(SessionRole::Arbiter, 1).await;

        assert!(matches!(
            adapter.send(&handle, "a").await,
            Err(AdapterError::Unreachable(_))
        ));
        assert!(adapter.send(&handle, "b").await.is_ok());
    }

    #[tokio::test]
    async fn test_fork_is_read_only() {
        let adapter = ScriptedAdapter::new();
        adapter.set_context_tokens(Some(42_000)).await;
        let handle = adapter.start(&SessionConfig::arbiter()).await.unwrap();

        let fork = adapter.fork(&handle).await.unwrap();
        assert!(matches!(
            adapter.send(&fork, "x").await,
            Err(AdapterError::ReadOnly(_))
        ));
        assert_eq!(adapter.measure_context(&fork).await.unwrap(), 42_000);
        assert_eq!(adapter.fork_count().await, 1);
    }

    #[tokio::test]
    async fn test_resume_reuses_session_id() {
        let adapter = ScriptedAdapter::new();
        let resume = SessionId::from_string("sess-previous");
        let config = SessionConfig::arbiter().with_resume(Some(resume.clone()));

        let handle = adapter.start(&config).await.unwrap();
        assert_eq!(handle.session_id, resume);
    }
}
