//! Wall-clock access behind a trait.
//!
//! The phase runner never counts ticks: every displayed value is a delta of
//! two `now()` readings. Swapping in [`ManualClock`] lets tests drive whole
//! phases without real sleeping.

use std::cell::Cell;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

/// Source of the current time plus the one blocking suspension point.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    fn sleep(&self, duration: Duration);
}

/// The real local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock whose `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Local>>,
    sleeps: Cell<usize>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Cell::new(start),
            sleeps: Cell::new(0),
        }
    }

    /// Move time forward without counting a sleep.
    pub fn advance(&self, by: Duration) {
        self.now.set(after(self.now.get(), by));
    }

    /// Number of `sleep` calls observed so far.
    pub fn sleeps(&self) -> usize {
        self.sleeps.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.advance(duration);
    }
}

/// Time from `start` to `end`, clamped to zero if `end` is earlier.
pub fn elapsed_between(start: DateTime<Local>, end: DateTime<Local>) -> Duration {
    (end - start).to_std().unwrap_or(Duration::ZERO)
}

/// `start + span`. Spans too large for chrono are capped to a thousand years.
pub fn after(start: DateTime<Local>, span: Duration) -> DateTime<Local> {
    TimeDelta::from_std(span)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .or_else(|| start.checked_add_signed(TimeDelta::days(365 * 1000)))
        .unwrap_or(start)
}
