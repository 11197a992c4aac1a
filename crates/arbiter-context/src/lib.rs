//! Context-window tracking for agent sessions.
//!
//! Usage telemetry from the agent engine is noisy: cached prefixes are
//! re-reported every turn and the reported cache size can go down between
//! turns. [`ContextTracker`] deduplicates samples by message id, folds
//! them into running aggregates, and exposes a percentage that never goes
//! down for the lifetime of the tracker.
//!
//! The arithmetic lives in [`estimate`] as plain functions so it can be
//! swapped without touching the tracker. Authoritative out-of-band
//! measurements, when available, rebase the estimate via
//! [`ContextTracker::apply_poll`].

pub mod estimate;
pub mod tracker;
pub mod warning;

pub use estimate::{ContextConstants, EstimateFn, UsageAggregate};
pub use tracker::{ContextTracker, PollMark};
pub use warning::{ContextLevel, ContextWarning};
