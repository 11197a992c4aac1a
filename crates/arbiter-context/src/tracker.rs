//! Per-session context tracker.

use std::collections::HashSet;

use tracing::{debug, warn};

use arbiter_models::{ContextSample, MessageId};

use crate::estimate::{self, ContextConstants, EstimateFn, UsageAggregate};
use crate::warning::{ContextLevel, ContextWarning};

/// Aggregate snapshot taken when an out-of-band measurement is requested.
///
/// The measurement covers the session as it was at the snapshot, so only
/// telemetry folded before it is replaced when the result is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollMark {
    epoch: u64,
    reference: Option<u64>,
    max_combined: u64,
    input_sum: u64,
    output_sum: u64,
}

/// Converts a stream of usage samples into a monotonic percentage.
///
/// One instance per session: the Arbiter keeps one for its lifetime and
/// each Orchestrator record gets a fresh one.
///
/// # Example
///
/// ```
/// use arbiter_context::ContextTracker;
/// use arbiter_models::ContextSample;
///
/// let mut tracker = ContextTracker::default();
/// tracker.capture_baseline(18_000);
///
/// tracker.update(&ContextSample::new("msg_1").with_cache(30_000, 0));
/// let first = tracker.get_percent();
///
/// // Cache read regresses; the displayed value does not.
/// tracker.update(&ContextSample::new("msg_2").with_cache(18_000, 0));
/// assert!(tracker.get_percent() >= first);
/// ```
#[derive(Debug, Clone)]
pub struct ContextTracker {
    constants: ContextConstants,
    estimator: EstimateFn,
    aggregate: UsageAggregate,
    seen: HashSet<MessageId>,
    baseline_captured: bool,
    /// Bumped by every applied poll; older marks no longer line up.
    poll_epoch: u64,
    last_percent: f64,
    level: ContextLevel,
    warnings: Vec<ContextWarning>,
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new(ContextConstants::default())
    }
}

impl ContextTracker {
    /// Creates a tracker using the default [`estimate::cache_growth`] estimator.
    pub fn new(constants: ContextConstants) -> Self {
        Self::with_estimator(constants, estimate::cache_growth)
    }

    /// Creates a tracker with a custom estimator.
    pub fn with_estimator(constants: ContextConstants, estimator: EstimateFn) -> Self {
        Self {
            constants,
            estimator,
            aggregate: UsageAggregate::default(),
            seen: HashSet::new(),
            baseline_captured: false,
            poll_epoch: 0,
            last_percent: 0.0,
            level: ContextLevel::Normal,
            warnings: Vec::new(),
        }
    }

    /// Sets the fresh-session baseline. Only the first call has any effect.
    ///
    /// Returns `true` if the baseline was taken.
    pub fn capture_baseline(&mut self, tokens: u64) -> bool {
        if self.baseline_captured {
            return false;
        }
        self.aggregate.baseline = tokens;
        self.baseline_captured = true;
        true
    }

    /// Snapshots the aggregates before a measurement is taken.
    pub fn mark_poll(&self) -> PollMark {
        PollMark {
            epoch: self.poll_epoch,
            reference: self.aggregate.first_combined.map(|_| self.aggregate.max_combined),
            max_combined: self.aggregate.max_combined,
            input_sum: self.aggregate.input_sum,
            output_sum: self.aggregate.output_sum,
        }
    }

    /// Applies an authoritative out-of-band measurement taken at `mark`.
    ///
    /// The measurement becomes the new baseline. Telemetry folded before
    /// the mark is replaced by it; anything folded since is kept on top.
    /// Returns `false` when another poll was applied after `mark` was
    /// taken, in which case nothing changes.
    pub fn apply_poll(&mut self, tokens: u64, mark: PollMark) -> bool {
        if mark.epoch != self.poll_epoch {
            debug!(tokens, "stale context measurement dropped");
            return false;
        }
        debug!(tokens, "applying polled context measurement");
        let agg = &mut self.aggregate;
        agg.baseline = tokens;
        if let Some(reference) = mark.reference {
            agg.first_combined = Some(reference);
        }
        agg.input_sum = agg.input_sum.saturating_sub(mark.input_sum);
        agg.output_sum = agg.output_sum.saturating_sub(mark.output_sum);
        self.baseline_captured = true;
        self.poll_epoch += 1;
        true
    }

    /// Folds a sample into the aggregates.
    ///
    /// Idempotent per `message_id`: returns `false` without changing
    /// anything when the turn was already seen.
    pub fn update(&mut self, sample: &ContextSample) -> bool {
        if !self.seen.insert(sample.message_id.clone()) {
            debug!(message_id = %sample.message_id, "duplicate usage sample ignored");
            return false;
        }
        if sample.is_zero() {
            return true;
        }

        let combined = sample.combined_cache();
        let agg = &mut self.aggregate;

        if agg.samples > 0 && combined < agg.latest_combined {
            self.warnings.push(ContextWarning::TelemetryRegressed {
                previous: agg.latest_combined,
                observed: combined,
            });
        }

        if agg.first_combined.is_none() {
            agg.first_combined = Some(combined);
            agg.max_combined = combined;
        }
        agg.max_combined = agg.max_combined.max(combined);
        agg.latest_combined = combined;
        agg.input_sum = agg.input_sum.saturating_add(sample.input_tokens);
        agg.output_sum = agg.output_sum.saturating_add(sample.output_tokens);
        agg.samples += 1;
        true
    }

    /// Current percentage; never lower than the previous return value.
    pub fn get_percent(&mut self) -> f64 {
        let raw = (self.estimator)(&self.aggregate, &self.constants);
        if raw > 100.0 {
            self.warnings.push(ContextWarning::ExceedsCapacity { estimate: raw });
        }

        let percent = raw.min(100.0).max(self.last_percent);
        self.last_percent = percent;

        let level = self.classify(percent);
        if level > self.level {
            self.level = level;
            self.warnings.push(ContextWarning::LevelCrossed { level, percent });
        }
        percent
    }

    /// Last value returned by [`get_percent`](Self::get_percent).
    pub fn last_percent(&self) -> f64 {
        self.last_percent
    }

    /// Highest level reached so far.
    pub fn level(&self) -> ContextLevel {
        self.level
    }

    pub fn aggregate(&self) -> &UsageAggregate {
        &self.aggregate
    }

    pub fn constants(&self) -> &ContextConstants {
        &self.constants
    }

    /// Drains warnings collected since the last call, logging each one.
    pub fn take_warnings(&mut self) -> Vec<ContextWarning> {
        let warnings = std::mem::take(&mut self.warnings);
        for w in &warnings {
            warn!(warning = %w, "context tracking");
        }
        warnings
    }

    fn classify(&self, percent: f64) -> ContextLevel {
        let used = percent / 100.0;
        if used >= self.constants.critical_threshold {
            ContextLevel::Critical
        } else if used >= self.constants.warning_threshold {
            ContextLevel::Warning
        } else {
            ContextLevel::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with_capacity(capacity: u64) -> ContextTracker {
        ContextTracker::new(ContextConstants::default().with_window_capacity(capacity))
    }

    fn cached(id: &str, cache_read: u64) -> ContextSample {
        ContextSample::new(id).with_cache(cache_read, 0)
    }

    #[test]
    fn test_non_monotonic_cache_reads_stay_monotonic() {
        let mut tracker = tracker_with_capacity(100_000);
        tracker.capture_baseline(18_000);

        let mut readings = Vec::new();
        for (i, cache_read) in [30_000, 18_000, 32_000].into_iter().enumerate() {
            tracker.update(&cached(&format!("msg_{i}"), cache_read));
            readings.push(tracker.get_percent());
        }

        assert!(readings.windows(2).all(|w| w[0] <= w[1]), "{readings:?}");
        assert!((readings[0] - 18.0).abs() < 1e-9);
        assert!((readings[2] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_message_id_is_idempotent() {
        let mut once = tracker_with_capacity(100_000);
        let mut twice = tracker_with_capacity(100_000);
        let sample = ContextSample::new("msg_a").with_cache(5_000, 1_000).with_io(200, 300);

        assert!(once.update(&sample));
        assert!(twice.update(&sample));
        assert!(!twice.update(&sample));

        assert_eq!(once.get_percent(), twice.get_percent());
        assert_eq!(once.aggregate(), twice.aggregate());
    }

    #[test]
    fn test_zero_sample_contributes_nothing() {
        let mut tracker = tracker_with_capacity(100_000);
        assert!(tracker.update(&ContextSample::new("msg_zero")));
        assert_eq!(tracker.aggregate().first_combined, None);

        // First non-zero sample fixes the reference point.
        tracker.update(&cached("msg_1", 40_000));
        assert_eq!(tracker.aggregate().first_combined, Some(40_000));
        assert_eq!(tracker.get_percent(), 0.0);
    }

    #[test]
    fn test_io_tokens_accumulate() {
        let mut tracker = tracker_with_capacity(10_000);
        tracker.update(&ContextSample::new("m1").with_io(500, 500));
        tracker.update(&ContextSample::new("m2").with_io(250, 750));
        assert!((tracker.get_percent() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_captured_once() {
        let mut tracker = tracker_with_capacity(100_000);
        assert!(tracker.capture_baseline(10_000));
        assert!(!tracker.capture_baseline(50_000));
        assert_eq!(tracker.aggregate().baseline, 10_000);
    }

    #[test]
    fn test_poll_rebases_without_regressing_display() {
        let mut tracker = tracker_with_capacity(100_000);
        tracker.update(&cached("m1", 20_000));
        tracker.update(&ContextSample::new("m2").with_cache(30_000, 0).with_io(5_000, 5_000));
        let before = tracker.get_percent();
        assert!((before - 20.0).abs() < 1e-9);

        // Authoritative reading is lower than the estimate.
        let mark = tracker.mark_poll();
        assert!(tracker.apply_poll(12_000, mark));
        assert_eq!(tracker.get_percent(), before);

        // Growth after the poll is measured from the poll.
        tracker.update(&cached("m3", 45_000));
        assert!((tracker.get_percent() - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_poll_keeps_telemetry_folded_after_mark() {
        let mut tracker = tracker_with_capacity(100_000);
        tracker.update(&cached("m1", 10_000));
        let mark = tracker.mark_poll();

        // A turn lands while the measurement is in flight.
        tracker.update(&ContextSample::new("m2").with_cache(10_000, 0).with_io(20_000, 10_000));
        assert!((tracker.get_percent() - 30.0).abs() < 1e-9);

        // The measurement saw 10k; the 30k folded since is kept on top.
        assert!(tracker.apply_poll(10_000, mark));
        assert!((tracker.get_percent() - 40.0).abs() < 1e-9);

        tracker.update(&ContextSample::new("m3").with_cache(10_000, 0).with_io(5_000, 5_000));
        assert!((tracker.get_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_poll_marked_before_another_poll_is_dropped() {
        let mut tracker = tracker_with_capacity(100_000);
        tracker.update(&ContextSample::new("m1").with_io(10_000, 0));
        let older = tracker.mark_poll();
        let newer = tracker.mark_poll();

        assert!(tracker.apply_poll(15_000, newer));
        assert!(!tracker.apply_poll(90_000, older));
        assert_eq!(tracker.aggregate().baseline, 15_000);
        assert!((tracker.get_percent() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_regression_and_level_warnings() {
        let constants = ContextConstants::default()
            .with_window_capacity(1_000)
            .with_thresholds(0.5, 0.9);
        let mut tracker = ContextTracker::new(constants);

        tracker.update(&ContextSample::new("m1").with_cache(100, 0).with_io(600, 0));
        tracker.get_percent();
        assert_eq!(tracker.level(), ContextLevel::Warning);

        tracker.update(&cached("m2", 50));
        let warnings = tracker.take_warnings();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ContextWarning::LevelCrossed { level: ContextLevel::Warning, .. })));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ContextWarning::TelemetryRegressed { previous: 100, observed: 50 })));
        assert!(tracker.take_warnings().is_empty());
    }

    #[test]
    fn test_capped_at_full_window() {
        let mut tracker = tracker_with_capacity(1_000);
        tracker.update(&ContextSample::new("m1").with_io(5_000, 0));
        assert_eq!(tracker.get_percent(), 100.0);
        assert!(tracker
            .take_warnings()
            .iter()
            .any(|w| matches!(w, ContextWarning::ExceedsCapacity { .. })));
    }

    #[test]
    fn test_swappable_estimator() {
        let constants = ContextConstants::default().with_window_capacity(100_000);
        let mut tracker = ContextTracker::with_estimator(constants, estimate::latest_combined);
        tracker.update(&cached("m1", 25_000));
        assert!((tracker.get_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_for_any_ordering() {
        let samples = [
            ContextSample::new("a").with_cache(9_000, 1_000),
            ContextSample::new("b").with_cache(2_000, 0).with_io(10, 10),
            ContextSample::new("c").with_cache(40_000, 3_000),
            ContextSample::new("d"),
            ContextSample::new("e").with_cache(1_000, 0).with_io(4_000, 100),
        ];
        // Every rotation of the input order.
        for start in 0..samples.len() {
            let mut tracker = tracker_with_capacity(60_000);
            let mut last = 0.0;
            for i in 0..samples.len() {
                tracker.update(&samples[(start + i) % samples.len()]);
                let p = tracker.get_percent();
                assert!(p >= last, "rotation {start}: {p} < {last}");
                last = p;
            }
        }
    }
}
