//! # Killtimer Core Library
//!
//! Enforces a time budget on an external program. A run starts the program,
//! walks through three phases and stops the program once its overtime is
//! used up. A companion report summarises past runs from a work log.
//!
//! ## Architecture
//!
//! - **Phase runner**: a polling loop that measures wall-clock deltas once per
//!   tick and returns when the deadline passes or the child exits
//! - **Supervisor**: the `Idle -> MinimalEffort -> Work -> Overtime` state
//!   machine with notifications at phase boundaries and final termination
//! - **Process**: child launch, non-blocking liveness and `SIGTERM` delivery
//! - **Work log**: the comma-separated record format and per-command totals
//!
//! ## Key Components
//!
//! - [`Supervisor`]: runs one supervised session
//! - [`run_phase`]: drives a single timed phase
//! - [`ChildHandle`]: the supervised OS process
//! - [`WorkLogRecord`]: one line of the work log

pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod interrupt;
pub mod notifier;
pub mod phase;
pub mod process;
pub mod stats;
pub mod supervisor;
pub mod worklog;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigFile, ConfigOverrides, RuntimeConfiguration};
pub use duration::{format_clock_time, format_duration, format_timedelta, parse_duration};
pub use error::{
    ConfigError, CoreError, DurationParseError, LaunchError, MalformedRecordError,
    TerminationFailure,
};
pub use notifier::{DesktopNotifier, Notification, Notifier, SilentNotifier, Urgency};
pub use phase::{run_phase, Phase, PhaseOutcome, PhaseProgress, RunReporter, TICK};
pub use process::{ChildHandle, ChildProcess, Launcher, Liveness, SystemLauncher};
pub use stats::{summarize, CommandSummary, StatsConfig, StatsReport};
pub use supervisor::{RunSummary, Supervisor, SupervisorState, Timeline};
pub use worklog::WorkLogRecord;
