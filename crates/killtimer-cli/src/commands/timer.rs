use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use killtimer_core::interrupt::{install_handlers, interrupt_flag};
use killtimer_core::worklog::append_record;
use killtimer_core::{
    parse_duration, ConfigFile, ConfigOverrides, DesktopNotifier, Notifier, RuntimeConfiguration,
    SilentNotifier, Supervisor, SupervisorState, SystemClock, SystemLauncher, WorkLogRecord,
};
use tracing::warn;

use crate::progress::TerminalProgress;

/// Exit status after the supervisor itself was interrupted.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Args, Debug)]
pub struct TimerArgs {
    /// Minimal work duration [default: 10m, or config file]
    #[arg(short = 'm', long = "minimal-effort", value_name = "duration", value_parser = parse_duration)]
    pub minimal_effort: Option<Duration>,

    /// Proper work duration, counted from task start [default: 1h, or config file]
    #[arg(short = 'w', long = "work", value_name = "duration", value_parser = parse_duration)]
    pub work: Option<Duration>,

    /// Overtime duration, counted from the end of work [default: 15m, or config file]
    #[arg(short = 'o', long = "overtime", value_name = "duration", value_parser = parse_duration)]
    pub overtime: Option<Duration>,

    /// Do not show desktop notifications
    #[arg(short = 'n', long = "no-notify")]
    pub no_notify: bool,

    /// Append a record of this run to the given work log
    #[arg(short = 'l', long = "log-file", value_name = "path")]
    pub log_file: Option<PathBuf>,

    /// Read defaults from this file instead of ~/.config/killtimer/config.toml
    #[arg(long = "config", value_name = "path")]
    pub config: Option<PathBuf>,

    /// Executable (with arguments) to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "program_to_run")]
    pub program_to_run: Vec<String>,
}

/// Run one supervised session and return the process exit status.
pub fn run(args: TimerArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    let overrides = ConfigOverrides {
        minimal_effort: args.minimal_effort,
        work: args.work,
        overtime: args.overtime,
        disable_notifications: args.no_notify,
        log_file: args.log_file,
    };
    let config = RuntimeConfiguration::resolve(&file, overrides, args.program_to_run)?;

    if let Err(e) = install_handlers() {
        warn!(error = %e, "cannot install interrupt handlers");
    }

    let notifier: Box<dyn Notifier> = if config.notifications_enabled {
        Box::new(DesktopNotifier::new(config.notification_sound))
    } else {
        Box::new(SilentNotifier)
    };
    let mut reporter = TerminalProgress::stdout();
    let mut supervisor = Supervisor::new(
        &config,
        &SystemClock,
        &SystemLauncher,
        notifier.as_ref(),
        interrupt_flag(),
    );
    let summary = supervisor.run(&mut reporter)?;

    if let Some(path) = &config.log_file {
        let record = WorkLogRecord::from_run(&config, &summary);
        if let Err(e) = append_record(path, &record) {
            eprintln!("error: cannot write work log {}: {e}", path.display());
        }
    }

    Ok(match summary.state {
        SupervisorState::Interrupted => EXIT_INTERRUPTED,
        _ => 0,
    })
}
