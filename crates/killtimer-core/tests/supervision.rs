//! Integration tests for supervising real processes on the real clock.
//!
//! These run actual `sleep`/`true` children, so they take a few seconds each.

#![cfg(unix)]

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use killtimer_core::clock::after;
use killtimer_core::{
    run_phase, Clock, LaunchError, Phase, PhaseOutcome, PhaseProgress, RunReporter,
    RuntimeConfiguration, SilentNotifier, Supervisor, SupervisorState, SystemClock,
    SystemLauncher,
};

#[derive(Default)]
struct CountingReporter {
    ticks: usize,
    lines: Vec<String>,
}

impl RunReporter for CountingReporter {
    fn announce(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn phase_started(&mut self, _label: &str, _total: Duration) {}

    fn phase_tick(&mut self, _progress: PhaseProgress) {
        self.ticks += 1;
    }

    fn phase_finished(&mut self, _progress: PhaseProgress) {}
}

fn config(minimal: u64, work: u64, overtime: u64, command: &[&str]) -> RuntimeConfiguration {
    RuntimeConfiguration {
        minimal_effort_duration: Duration::from_secs(minimal),
        work_duration: Duration::from_secs(work),
        overtime_duration: Duration::from_secs(overtime),
        command_to_run: command.iter().map(|s| s.to_string()).collect(),
        notifications_enabled: false,
        ..RuntimeConfiguration::default()
    }
}

#[test]
fn test_phase_waits_for_real_deadline() {
    let clock = SystemClock;
    let start = clock.now();
    let started = Instant::now();
    let mut reporter = CountingReporter::default();

    let outcome = run_phase(
        "Work",
        start,
        after(start, Duration::from_secs(3)),
        &clock,
        &mut || true,
        &mut reporter,
    );

    assert_eq!(outcome, PhaseOutcome::DeadlineReached);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[test]
fn test_child_outliving_overtime_is_stopped() {
    let cfg = config(0, 0, 1, &["sleep", "30"]);
    let flag = AtomicBool::new(false);
    let started = Instant::now();
    let mut reporter = CountingReporter::default();

    let summary = Supervisor::new(&cfg, &SystemClock, &SystemLauncher, &SilentNotifier, &flag)
        .run(&mut reporter)
        .unwrap();

    assert_eq!(summary.state, SupervisorState::Terminated);
    assert!(summary.termination_requested);
    assert!(summary.termination_error.is_none());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(reporter
        .lines
        .iter()
        .any(|l| l.starts_with("Overtime depleted")));
}

#[test]
fn test_child_exiting_early_stops_the_run() {
    let cfg = config(30, 60, 30, &["true"]);
    let flag = AtomicBool::new(false);
    let started = Instant::now();
    let mut reporter = CountingReporter::default();

    let summary = Supervisor::new(&cfg, &SystemClock, &SystemLauncher, &SilentNotifier, &flag)
        .run(&mut reporter)
        .unwrap();

    assert_eq!(summary.state, SupervisorState::StoppedEarly);
    assert_eq!(summary.stopped_in, Some(Phase::MinimalEffort));
    assert!(!summary.termination_requested);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_unknown_executable_fails_before_any_phase() {
    let cfg = config(1, 1, 1, &["killtimer-no-such-program-xyz"]);
    let flag = AtomicBool::new(false);
    let mut reporter = CountingReporter::default();
    let mut supervisor =
        Supervisor::new(&cfg, &SystemClock, &SystemLauncher, &SilentNotifier, &flag);

    let err = supervisor.run(&mut reporter).unwrap_err();

    assert!(matches!(err, LaunchError::SpawnFailed { .. }));
    assert_eq!(supervisor.state(), SupervisorState::Failed);
    assert_eq!(reporter.ticks, 0);
}

#[test]
fn test_countdown_without_command() {
    let cfg = config(0, 0, 0, &[]);
    let flag = AtomicBool::new(false);
    let mut reporter = CountingReporter::default();

    let summary = Supervisor::new(&cfg, &SystemClock, &SystemLauncher, &SilentNotifier, &flag)
        .run(&mut reporter)
        .unwrap();

    assert_eq!(summary.state, SupervisorState::Terminated);
    assert!(!summary.termination_requested);
    assert!(summary.total_duration() < Duration::from_secs(1));
}
