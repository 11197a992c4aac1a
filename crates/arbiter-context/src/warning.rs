//! Non-fatal context tracking conditions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Usage classification relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Conditions worth logging that never block routing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextWarning {
    /// Combined cache metric went down between samples.
    #[error("usage telemetry regressed from {previous} to {observed} cached tokens")]
    TelemetryRegressed { previous: u64, observed: u64 },

    /// Estimate exceeded the window and was capped at 100%.
    #[error("context estimate {estimate:.1}% exceeds the window")]
    ExceedsCapacity { estimate: f64 },

    /// Usage crossed into a higher level.
    #[error("context usage at {percent:.1}% is now {level}")]
    LevelCrossed { level: ContextLevel, percent: f64 },

    /// Out-of-band measurement could not be taken.
    #[error("context probe failed: {0}")]
    ProbeFailed(String),
}
