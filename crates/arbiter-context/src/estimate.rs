//! Percentage estimators.
//!
//! Raw usage telemetry regresses between turns and re-reports cached
//! content, so the tracker folds samples into a [`UsageAggregate`] and
//! hands it to a plain estimator function. Estimators are swappable;
//! [`cache_growth`] is the default.

use serde::{Deserialize, Serialize};

/// Default context window of one agent session, in tokens.
pub const DEFAULT_WINDOW_CAPACITY: u64 = 200_000;

/// Default fraction of the window at which a warning is raised.
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.80;

/// Default fraction of the window considered critical.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.90;

/// Signature shared by all estimators. Returns a percentage (0-100+).
pub type EstimateFn = fn(&UsageAggregate, &ContextConstants) -> f64;

/// Tunables injected into estimators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextConstants {
    /// Total tokens the session can hold.
    pub window_capacity: u64,
    /// Used fraction that triggers [`crate::ContextLevel::Warning`].
    pub warning_threshold: f64,
    /// Used fraction that triggers [`crate::ContextLevel::Critical`].
    pub critical_threshold: f64,
}

impl Default for ContextConstants {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

impl ContextConstants {
    pub fn with_window_capacity(mut self, capacity: u64) -> Self {
        self.window_capacity = capacity;
        self
    }

    /// Sets both thresholds, clamped to `0.0..=1.0`.
    pub fn with_thresholds(mut self, warning: f64, critical: f64) -> Self {
        self.warning_threshold = warning.clamp(0.0, 1.0);
        self.critical_threshold = critical.clamp(0.0, 1.0);
        self
    }

    /// Converts a token count to a percentage of the window.
    pub fn percent_of_window(&self, tokens: u64) -> f64 {
        if self.window_capacity == 0 {
            return 0.0;
        }
        tokens as f64 / self.window_capacity as f64 * 100.0
    }
}

/// Running aggregates folded from deduplicated samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAggregate {
    /// Fresh-session measurement (or last authoritative poll).
    pub baseline: u64,
    /// Combined cache metric of the reference sample.
    pub first_combined: Option<u64>,
    /// Highest combined cache metric seen since the reference point.
    pub max_combined: u64,
    /// Combined cache metric of the most recent non-zero sample.
    pub latest_combined: u64,
    pub input_sum: u64,
    pub output_sum: u64,
    /// Number of non-zero samples folded in.
    pub samples: usize,
}

impl UsageAggregate {
    /// Growth of the cached prefix since the reference sample.
    pub fn cache_growth(&self) -> u64 {
        match self.first_combined {
            Some(first) => self.max_combined.saturating_sub(first),
            None => 0,
        }
    }
}

/// Default estimator: baseline plus cache growth plus fresh I/O.
///
/// `(baseline + (max(combined) - first(combined)) + sum(input) + sum(output)) / capacity * 100`
pub fn cache_growth(aggregate: &UsageAggregate, constants: &ContextConstants) -> f64 {
    let tokens = aggregate
        .baseline
        .saturating_add(aggregate.cache_growth())
        .saturating_add(aggregate.input_sum)
        .saturating_add(aggregate.output_sum);
    constants.percent_of_window(tokens)
}

/// Historical estimator: the latest combined cache metric alone.
pub fn latest_combined(aggregate: &UsageAggregate, constants: &ContextConstants) -> f64 {
    constants.percent_of_window(aggregate.latest_combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_zero_percent() {
        let constants = ContextConstants::default().with_window_capacity(0);
        assert_eq!(constants.percent_of_window(10_000), 0.0);
    }

    #[test]
    fn test_cache_growth_formula() {
        let aggregate = UsageAggregate {
            baseline: 18_000,
            first_combined: Some(30_000),
            max_combined: 32_000,
            latest_combined: 32_000,
            input_sum: 1_000,
            output_sum: 1_000,
            samples: 3,
        };
        let constants = ContextConstants::default().with_window_capacity(100_000);
        // 18k + 2k growth + 2k io = 22k of 100k
        assert!((cache_growth(&aggregate, &constants) - 22.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_latest_combined_ignores_baseline() {
        let aggregate = UsageAggregate {
            baseline: 50_000,
            latest_combined: 10_000,
            ..Default::default()
        };
        let constants = ContextConstants::default().with_window_capacity(100_000);
        assert!((latest_combined(&aggregate, &constants) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_thresholds_are_clamped() {
        let constants = ContextConstants::default().with_thresholds(1.5, -0.2);
        assert_eq!(constants.warning_threshold, 1.0);
        assert_eq!(constants.critical_threshold, 0.0);
    }
}
