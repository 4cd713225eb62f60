//! Supervision state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> MinimalEffort -> Work -> Overtime -> Terminated
//!              |             |         |
//!              +-------------+---------+----> StoppedEarly | Interrupted
//! Idle -> Failed            (launch error)
//! ```
//!
//! Minimal effort and Work are both measured from the task start; Overtime is
//! measured from the instant Work ended. Between phases the liveness guard is
//! re-checked: a child that exited on its own ends the run quietly, an
//! interrupted supervisor terminates the child before stopping.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::{after, elapsed_between, Clock};
use crate::config::RuntimeConfiguration;
use crate::duration::{format_clock_time, format_timedelta};
use crate::error::LaunchError;
use crate::interrupt::is_interrupted;
use crate::notifier::{Notification, Notifier};
use crate::phase::{run_phase, Phase, PhaseOutcome, RunReporter};
use crate::process::{ChildProcess, Launcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Idle,
    MinimalEffort,
    Work,
    Overtime,
    /// Overtime ran out. The child, if still running, was asked to stop.
    Terminated,
    /// The child exited on its own before its time was up.
    StoppedEarly,
    /// The supervisor itself was interrupted.
    Interrupted,
    /// The child could not be launched; no phase ran.
    Failed,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SupervisorState::Terminated
                | SupervisorState::StoppedEarly
                | SupervisorState::Interrupted
                | SupervisorState::Failed
        )
    }
}

impl From<Phase> for SupervisorState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::MinimalEffort => SupervisorState::MinimalEffort,
            Phase::Work => SupervisorState::Work,
            Phase::Overtime => SupervisorState::Overtime,
        }
    }
}

/// Deadlines fixed at task start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub start_time: DateTime<Local>,
    pub minimal_effort_deadline: DateTime<Local>,
    pub work_deadline: DateTime<Local>,
    /// Latest possible end of Overtime, assuming Work ends on time.
    pub overtime_horizon: DateTime<Local>,
}

impl Timeline {
    pub fn new(start_time: DateTime<Local>, config: &RuntimeConfiguration) -> Self {
        let minimal_effort_deadline = after(start_time, config.minimal_effort_duration);
        let work_deadline = after(start_time, config.work_duration);
        let work_end = minimal_effort_deadline.max(work_deadline);
        Self {
            start_time,
            minimal_effort_deadline,
            work_deadline,
            overtime_horizon: after(work_end, config.overtime_duration),
        }
    }

    fn plan_lines(&self) -> [String; 4] {
        [
            format!("Task start:                  {}", format_clock_time(&self.start_time)),
            format!(
                "Minimal effort finishes on:  {}",
                format_clock_time(&self.minimal_effort_deadline)
            ),
            format!("Work will be done on:        {}", format_clock_time(&self.work_deadline)),
            format!("Overtime ends no later than: {}", format_clock_time(&self.overtime_horizon)),
        ]
    }
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: SupervisorState,
    /// Phase that was active when the run stopped early or was interrupted.
    pub stopped_in: Option<Phase>,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub termination_requested: bool,
    /// Set when the termination signal could not be delivered.
    pub termination_error: Option<String>,
}

impl RunSummary {
    pub fn total_duration(&self) -> Duration {
        elapsed_between(self.start_time, self.end_time)
    }
}

/// Drives one supervised run. Collaborators are injected so tests can use a
/// virtual clock, a scripted child and a recording notifier.
pub struct Supervisor<'a> {
    config: &'a RuntimeConfiguration,
    clock: &'a dyn Clock,
    launcher: &'a dyn Launcher,
    notifier: &'a dyn Notifier,
    interrupt: &'a AtomicBool,
    state: SupervisorState,
}

impl<'a> Supervisor<'a> {
    pub fn new(
        config: &'a RuntimeConfiguration,
        clock: &'a dyn Clock,
        launcher: &'a dyn Launcher,
        notifier: &'a dyn Notifier,
        interrupt: &'a AtomicBool,
    ) -> Self {
        Self {
            config,
            clock,
            launcher,
            notifier,
            interrupt,
            state: SupervisorState::Idle,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run all phases to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] if the configured command cannot be started.
    /// Every other ending, including forced termination, is a summary.
    pub fn run(&mut self, reporter: &mut dyn RunReporter) -> Result<RunSummary, LaunchError> {
        let timeline = Timeline::new(self.clock.now(), self.config);
        for line in timeline.plan_lines() {
            reporter.announce(&line);
        }

        let mut child = match self.config.command() {
            Some(command) => match self.launcher.launch(command) {
                Ok(child) => {
                    info!(pid = child.pid(), command = %command.join(" "), "supervising");
                    Some(child)
                }
                Err(e) => {
                    self.transition(SupervisorState::Failed);
                    return Err(e);
                }
            },
            None => None,
        };

        let mut work_end = timeline.start_time;
        for phase in Phase::ALL {
            let (phase_start, deadline) = match phase {
                Phase::MinimalEffort => (timeline.start_time, timeline.minimal_effort_deadline),
                Phase::Work => (timeline.start_time, timeline.work_deadline),
                Phase::Overtime => (work_end, after(work_end, self.config.overtime_duration)),
            };

            self.transition(phase.into());
            let interrupt = self.interrupt;
            let outcome = run_phase(
                phase.label(),
                phase_start,
                deadline,
                self.clock,
                &mut || should_continue(interrupt, &mut child),
                reporter,
            );
            if phase == Phase::Work {
                work_end = self.clock.now();
            }

            if is_interrupted(self.interrupt) {
                reporter.announce("Interrupted - terminating user command...");
                return Ok(self.finish(SupervisorState::Interrupted, Some(phase), &timeline, child, reporter));
            }
            if outcome == PhaseOutcome::ChildExited || !should_continue(self.interrupt, &mut child) {
                info!(%phase, "child exited before its deadline");
                return Ok(self.finish(SupervisorState::StoppedEarly, Some(phase), &timeline, None, reporter));
            }

            match phase {
                Phase::MinimalEffort => self.notify(Notification::information(
                    phase.completion_message().unwrap_or_default(),
                )),
                Phase::Work => self.notify(Notification::warning(
                    phase.completion_message().unwrap_or_default(),
                )),
                Phase::Overtime => {
                    if child.is_some() {
                        reporter.announce("Overtime depleted - terminating user command...");
                    }
                }
            }
        }

        Ok(self.finish(SupervisorState::Terminated, None, &timeline, child, reporter))
    }

    /// Enter a terminal state, terminating `child` if one is handed over.
    fn finish(
        &mut self,
        state: SupervisorState,
        stopped_in: Option<Phase>,
        timeline: &Timeline,
        child: Option<Box<dyn ChildProcess>>,
        reporter: &mut dyn RunReporter,
    ) -> RunSummary {
        let mut termination_requested = false;
        let mut termination_error = None;
        if let Some(mut child) = child {
            match child.terminate() {
                Ok(()) => termination_requested = true,
                Err(e) => {
                    warn!(error = %e, "termination request failed");
                    reporter.announce(&format!("error: {e}"));
                    termination_error = Some(e.to_string());
                }
            }
        }

        self.transition(state);
        let summary = RunSummary {
            state,
            stopped_in,
            start_time: timeline.start_time,
            end_time: self.clock.now(),
            termination_requested,
            termination_error,
        };
        reporter.announce(&format!(
            "Total time spent:            {}",
            format_timedelta(Duration::from_secs(summary.total_duration().as_secs()))
        ));
        summary
    }

    fn notify(&self, notification: Notification) {
        info!(message = %notification.message, urgency = ?notification.urgency, "notifying");
        if let Err(e) = self.notifier.notify(&notification) {
            warn!(error = %e, "notification could not be delivered");
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        info!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

/// The liveness predicate: not interrupted, and the child (if any) running.
fn should_continue(interrupt: &AtomicBool, child: &mut Option<Box<dyn ChildProcess>>) -> bool {
    !is_interrupted(interrupt) && child.as_mut().map_or(true, |c| c.is_alive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::TerminationFailure;
    use crate::notifier::{NotifyError, Urgency};
    use crate::phase::tests::RecordingReporter;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.borrow_mut().push(notification.clone());
            Ok(())
        }
    }

    /// Child that exits on its own at `exit_at` (virtual time), if set.
    /// `terminate_calls` counts every request, `terminations` only those
    /// that reached a live child.
    struct ScriptedChild {
        clock: Rc<ManualClock>,
        exit_at: Option<DateTime<Local>>,
        terminate_calls: Rc<Cell<usize>>,
        terminations: Rc<Cell<usize>>,
        terminated: bool,
    }

    impl ChildProcess for ScriptedChild {
        fn pid(&self) -> u32 {
            4242
        }

        fn is_alive(&mut self) -> bool {
            !self.terminated && self.exit_at.map_or(true, |t| self.clock.now() < t)
        }

        fn terminate(&mut self) -> Result<(), TerminationFailure> {
            self.terminate_calls.set(self.terminate_calls.get() + 1);
            if self.is_alive() {
                self.terminations.set(self.terminations.get() + 1);
                self.terminated = true;
            }
            Ok(())
        }
    }

    struct ScriptedLauncher {
        clock: Rc<ManualClock>,
        lifetime: Option<Duration>,
        terminate_calls: Rc<Cell<usize>>,
        terminations: Rc<Cell<usize>>,
        launches: Cell<usize>,
    }

    impl ScriptedLauncher {
        fn new(clock: &Rc<ManualClock>, lifetime: Option<Duration>) -> Self {
            Self {
                clock: Rc::clone(clock),
                lifetime,
                terminate_calls: Rc::new(Cell::new(0)),
                terminations: Rc::new(Cell::new(0)),
                launches: Cell::new(0),
            }
        }
    }

    impl Launcher for ScriptedLauncher {
        fn launch(&self, _command: &[String]) -> Result<Box<dyn ChildProcess>, LaunchError> {
            self.launches.set(self.launches.get() + 1);
            Ok(Box::new(ScriptedChild {
                clock: Rc::clone(&self.clock),
                exit_at: self.lifetime.map(|d| after(self.clock.now(), d)),
                terminate_calls: Rc::clone(&self.terminate_calls),
                terminations: Rc::clone(&self.terminations),
                terminated: false,
            }))
        }
    }

    struct FailingLauncher;

    impl Launcher for FailingLauncher {
        fn launch(&self, command: &[String]) -> Result<Box<dyn ChildProcess>, LaunchError> {
            Err(LaunchError::SpawnFailed {
                command: command.join(" "),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn config(minimal: u64, work: u64, overtime: u64, command: &[&str]) -> RuntimeConfiguration {
        RuntimeConfiguration {
            minimal_effort_duration: secs(minimal),
            work_duration: secs(work),
            overtime_duration: secs(overtime),
            command_to_run: command.iter().map(|s| s.to_string()).collect(),
            ..RuntimeConfiguration::default()
        }
    }

    fn labels(reporter: &RecordingReporter) -> Vec<&str> {
        reporter.started.iter().map(|(l, _)| l.as_str()).collect()
    }

    #[test]
    fn zero_length_countdown_finishes_immediately() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, None);
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(0, 0, 0, &[]);
        let mut reporter = RecordingReporter::default();

        let mut sup = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag);
        let summary = sup.run(&mut reporter).unwrap();

        assert_eq!(summary.state, SupervisorState::Terminated);
        assert_eq!(sup.state(), SupervisorState::Terminated);
        assert_eq!(clock.sleeps(), 0);
        assert_eq!(launcher.launches.get(), 0);
        assert!(!summary.termination_requested);
        assert_eq!(labels(&reporter), vec!["Minimal effort", "Work", "Overtime"]);
    }

    #[test]
    fn child_exiting_during_work_skips_overtime() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, Some(secs(4)));
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(2, 10, 5, &["editor"]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert_eq!(summary.state, SupervisorState::StoppedEarly);
        assert_eq!(summary.stopped_in, Some(Phase::Work));
        assert_eq!(labels(&reporter), vec!["Minimal effort", "Work"]);
        assert_eq!(launcher.terminate_calls.get(), 0);
        assert!(!summary.termination_requested);

        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "Minimal effort done!");
        assert_eq!(sent[0].urgency, Urgency::Normal);
        assert!(sent.iter().all(|n| n.urgency != Urgency::Critical));
    }

    #[test]
    fn child_exiting_during_minimal_effort_sends_nothing() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, Some(secs(1)));
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(5, 10, 5, &["editor"]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert_eq!(summary.state, SupervisorState::StoppedEarly);
        assert_eq!(summary.stopped_in, Some(Phase::MinimalEffort));
        assert!(notifier.sent.borrow().is_empty());
        assert_eq!(summary.total_duration(), secs(1));
    }

    #[test]
    fn child_outliving_overtime_is_terminated_once() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, None);
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(2, 5, 3, &["game"]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert_eq!(summary.state, SupervisorState::Terminated);
        assert!(summary.termination_requested);
        assert_eq!(launcher.terminate_calls.get(), 1);
        assert_eq!(launcher.terminations.get(), 1);
        assert!(reporter
            .lines
            .iter()
            .any(|l| l.starts_with("Overtime depleted")));

        let sent = notifier.sent.borrow();
        let urgencies: Vec<Urgency> = sent.iter().map(|n| n.urgency).collect();
        assert_eq!(urgencies, vec![Urgency::Normal, Urgency::Critical]);
        assert_eq!(sent[1].message, "Work done! You are doing overtime!");
    }

    #[test]
    fn child_exiting_within_overtime_is_left_alone() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, Some(secs(6)));
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(2, 5, 3, &["game"]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert_eq!(summary.state, SupervisorState::StoppedEarly);
        assert_eq!(summary.stopped_in, Some(Phase::Overtime));
        assert_eq!(launcher.terminate_calls.get(), 0);
        assert_eq!(notifier.sent.borrow().len(), 2);
    }

    #[test]
    fn overtime_is_measured_from_end_of_work() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, None);
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(2, 5, 3, &[]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        let totals: Vec<Duration> = reporter.started.iter().map(|(_, t)| *t).collect();
        assert_eq!(totals, vec![secs(2), secs(5), secs(3)]);
        assert_eq!(summary.total_duration(), secs(8));
        assert_eq!(reporter.finished.len(), 3);
    }

    #[test]
    fn minimal_effort_longer_than_work_ends_work_at_once() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, None);
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(4, 2, 1, &[]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert_eq!(summary.state, SupervisorState::Terminated);
        assert_eq!(summary.total_duration(), secs(5));
    }

    #[test]
    fn launch_failure_runs_no_phase() {
        let clock = ManualClock::default();
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(1, 2, 1, &["missing-binary"]);
        let mut reporter = RecordingReporter::default();

        let mut sup = Supervisor::new(&cfg, &clock, &FailingLauncher, &notifier, &flag);
        let err = sup.run(&mut reporter).unwrap_err();

        assert!(matches!(err, LaunchError::SpawnFailed { .. }));
        assert_eq!(sup.state(), SupervisorState::Failed);
        assert!(reporter.started.is_empty());
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn interruption_terminates_child() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, None);
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(true);
        let cfg = config(60, 120, 60, &["game"]);
        let mut reporter = RecordingReporter::default();

        let summary = Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert_eq!(summary.state, SupervisorState::Interrupted);
        assert_eq!(summary.stopped_in, Some(Phase::MinimalEffort));
        assert_eq!(launcher.terminate_calls.get(), 1);
        assert_eq!(launcher.terminations.get(), 1);
        assert!(summary.termination_requested);
        assert!(clock.sleeps() <= 1);
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn plan_is_announced_first() {
        let clock = Rc::new(ManualClock::default());
        let launcher = ScriptedLauncher::new(&clock, None);
        let notifier = RecordingNotifier::default();
        let flag = AtomicBool::new(false);
        let cfg = config(0, 0, 0, &[]);
        let mut reporter = RecordingReporter::default();

        Supervisor::new(&cfg, &*clock, &launcher, &notifier, &flag)
            .run(&mut reporter)
            .unwrap();

        assert!(reporter.lines[0].starts_with("Task start:"));
        assert!(reporter.lines[1].starts_with("Minimal effort finishes on:"));
        assert!(reporter.lines[2].starts_with("Work will be done on:"));
        assert!(reporter.lines[3].starts_with("Overtime ends no later than:"));
        assert!(reporter.lines.last().unwrap().starts_with("Total time spent:"));
    }
}
