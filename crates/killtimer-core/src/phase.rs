//! Phases and the per-phase polling loop.
//!
//! A phase runs from a start instant to a deadline. Once per tick the runner
//! measures elapsed time from the clock, reports it, sleeps, then asks the
//! liveness predicate whether to keep going. Reported values are always
//! wall-clock deltas, so sleep drift never accumulates.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::{elapsed_between, Clock};

/// Nominal polling cadence.
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    MinimalEffort,
    Work,
    Overtime,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::MinimalEffort, Phase::Work, Phase::Overtime];

    pub fn label(self) -> &'static str {
        match self {
            Phase::MinimalEffort => "Minimal effort",
            Phase::Work => "Work",
            Phase::Overtime => "Overtime",
        }
    }

    /// Message shown when the phase reaches its deadline with the child
    /// still running.
    pub fn completion_message(self) -> Option<&'static str> {
        match self {
            Phase::MinimalEffort => Some("Minimal effort done!"),
            Phase::Work => Some("Work done! You are doing overtime!"),
            Phase::Overtime => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    DeadlineReached,
    ChildExited,
}

/// One progress sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProgress {
    pub elapsed: Duration,
    pub remaining: Duration,
    pub total: Duration,
}

impl PhaseProgress {
    fn at(elapsed: Duration, total: Duration) -> Self {
        Self {
            elapsed,
            remaining: total.saturating_sub(elapsed),
            total,
        }
    }

    /// 0.0 .. 1.0 completion, 1.0 for an empty phase.
    pub fn fraction(&self) -> f64 {
        if self.total.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.total.as_secs_f64()).min(1.0)
    }
}

/// Receives everything the supervisor wants the user to see.
pub trait RunReporter {
    /// A free-form line such as the deadline plan.
    fn announce(&mut self, line: &str);

    fn phase_started(&mut self, label: &str, total: Duration);

    fn phase_tick(&mut self, progress: PhaseProgress);

    /// Final sample of a phase that reached its deadline.
    fn phase_finished(&mut self, progress: PhaseProgress);
}

/// Drive a single phase from `start` to `deadline`.
///
/// Returns [`PhaseOutcome::DeadlineReached`] once elapsed time covers the
/// phase, or [`PhaseOutcome::ChildExited`] as soon as `is_alive` answers
/// `false` after a tick. A deadline at or before `start` completes at once.
pub fn run_phase(
    label: &str,
    start: DateTime<Local>,
    deadline: DateTime<Local>,
    clock: &dyn Clock,
    is_alive: &mut dyn FnMut() -> bool,
    reporter: &mut dyn RunReporter,
) -> PhaseOutcome {
    let total = elapsed_between(start, deadline);
    reporter.phase_started(label, total);

    loop {
        let elapsed = elapsed_between(start, clock.now());
        if elapsed >= total {
            reporter.phase_finished(PhaseProgress::at(total, total));
            return PhaseOutcome::DeadlineReached;
        }

        let progress = PhaseProgress::at(elapsed, total);
        trace!(phase = label, elapsed = ?progress.elapsed, remaining = ?progress.remaining, "tick");
        reporter.phase_tick(progress);

        clock.sleep(TICK);
        if !is_alive() {
            return PhaseOutcome::ChildExited;
        }
    }
}
