//! Router configuration.

use std::time::Duration;

use tracing::debug;

use arbiter_adapters::SessionConfig;
use arbiter_context::{estimate, ContextConstants, EstimateFn};
use arbiter_core::{env_parse, load_env, session_file};
use arbiter_persistence::SessionStore;

/// Context window size override, in tokens.
pub const CONTEXT_WINDOW_ENV: &str = "ARBITER_CONTEXT_WINDOW";

/// Fresh-session baseline override, in tokens.
pub const CONTEXT_BASELINE_ENV: &str = "ARBITER_CONTEXT_BASELINE";

/// Interval between out-of-band context probes, in seconds. `0` disables probing.
pub const POLL_INTERVAL_ENV: &str = "ARBITER_POLL_INTERVAL_SECS";

/// What to do when an internal lifecycle invariant would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Abort immediately. Default in debug builds.
    Panic,
    /// Log the violation and drop the offending request.
    Ignore,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ViolationPolicy::Panic
        } else {
            ViolationPolicy::Ignore
        }
    }
}

/// Configuration for the router and its engine.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Window capacity and warning thresholds shared by every tracker.
    pub context: ContextConstants,
    /// Estimator behind every session's tracker.
    pub estimator: EstimateFn,
    /// Baseline used for fresh sessions when no measurement is available.
    pub context_baseline: Option<u64>,
    /// Extra attempts allowed after a transport failure.
    pub transport_retries: u32,
    pub violation_policy: ViolationPolicy,
    /// Interval for out-of-band context probes; `None` disables them.
    pub poll_interval: Option<Duration>,
    /// Probe each session once as it starts to capture its baseline.
    pub probe_on_start: bool,
    pub arbiter_session: SessionConfig,
    pub orchestrator_session: SessionConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            context: ContextConstants::default(),
            estimator: estimate::cache_growth,
            context_baseline: None,
            transport_retries: 1,
            violation_policy: ViolationPolicy::default(),
            poll_interval: None,
            probe_on_start: false,
            arbiter_session: SessionConfig::arbiter(),
            orchestrator_session: SessionConfig::orchestrator(),
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults plus overrides from the environment and `.env.local`.
    pub fn from_env() -> Self {
        load_env();
        let config = Self::default().with_overrides(
            env_parse(CONTEXT_WINDOW_ENV),
            env_parse(CONTEXT_BASELINE_ENV),
            env_parse(POLL_INTERVAL_ENV),
        );
        debug!(?config.context, ?config.poll_interval, "router config loaded");
        config
    }

    fn with_overrides(
        mut self,
        window: Option<u64>,
        baseline: Option<u64>,
        poll_secs: Option<u64>,
    ) -> Self {
        if let Some(window) = window {
            self.context = self.context.with_window_capacity(window);
        }
        if baseline.is_some() {
            self.context_baseline = baseline;
        }
        if let Some(secs) = poll_secs {
            self.poll_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        self
    }

    pub fn with_context(mut self, context: ContextConstants) -> Self {
        self.context = context;
        self
    }

    pub fn with_estimator(mut self, estimator: EstimateFn) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_context_baseline(mut self, tokens: u64) -> Self {
        self.context_baseline = Some(tokens);
        self
    }

    pub fn with_transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = retries;
        self
    }

    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation_policy = policy;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_probe_on_start(mut self, probe: bool) -> Self {
        self.probe_on_start = probe;
        self
    }

    pub fn with_arbiter_session(mut self, session: SessionConfig) -> Self {
        self.arbiter_session = session;
        self
    }

    pub fn with_orchestrator_session(mut self, session: SessionConfig) -> Self {
        self.orchestrator_session = session;
        self
    }
}

/// Resume record store at the default location under the state directory.
pub fn default_session_store() -> SessionStore {
    SessionStore::new(session_file())
}
