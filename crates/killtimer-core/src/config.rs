//! TOML-based defaults and the immutable per-run configuration.
//!
//! The file lives at `~/.config/killtimer/config.toml`:
//!
//! ```toml
//! [durations]
//! minimal_effort = "10m"
//! work = "1h"
//! overtime = "15m"
//!
//! [notifications]
//! enabled = true
//! sound = true
//!
//! [log]
//! file = "/home/me/worklog.csv"
//! ```
//!
//! Command-line flags win over the file, the file wins over built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::duration::{format_timedelta, parse_duration};
use crate::error::ConfigError;

/// Returns `~/.config/killtimer[-dev]/` based on KILLTIMER_ENV.
///
/// Set KILLTIMER_ENV=dev to use a development config directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir().ok_or(ConfigError::NoConfigDir)?.join(".config");

    let env = std::env::var("KILLTIMER_ENV").unwrap_or_else(|_| "production".to_string());

    Ok(if env == "dev" {
        base_dir.join("killtimer-dev")
    } else {
        base_dir.join("killtimer")
    })
}

/// Phase durations as human expressions (`"10m"`, `"1h30m"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurationsConfig {
    #[serde(default = "default_minimal_effort")]
    pub minimal_effort: String,
    #[serde(default = "default_work")]
    pub work: String,
    #[serde(default = "default_overtime")]
    pub overtime: String,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
}

/// Work log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Append one record per run here when set.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// On-disk configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub durations: DurationsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_minimal_effort() -> String {
    "10m".into()
}
fn default_work() -> String {
    "1h".into()
}
fn default_overtime() -> String {
    "15m".into()
}
fn default_true() -> bool {
    true
}

impl Default for DurationsConfig {
    fn default() -> Self {
        Self {
            minimal_effort: default_minimal_effort(),
            work: default_work(),
            overtime: default_overtime(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
        }
    }
}

impl ConfigFile {
    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load from the default location, or defaults if there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Per-invocation values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub minimal_effort: Option<Duration>,
    pub work: Option<Duration>,
    pub overtime: Option<Duration>,
    pub disable_notifications: bool,
    pub log_file: Option<PathBuf>,
}

/// Everything a single timer run needs. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfiguration {
    pub minimal_effort_duration: Duration,
    /// Measured from task start, so it includes the minimal effort window.
    pub work_duration: Duration,
    /// Measured from the end of the Work phase.
    pub overtime_duration: Duration,
    /// Executable and arguments. Empty means countdown only.
    pub command_to_run: Vec<String>,
    pub notifications_enabled: bool,
    pub notification_sound: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for RuntimeConfiguration {
    fn default() -> Self {
        Self {
            minimal_effort_duration: Duration::from_secs(10 * 60),
            work_duration: Duration::from_secs(60 * 60),
            overtime_duration: Duration::from_secs(15 * 60),
            command_to_run: Vec::new(),
            notifications_enabled: true,
            notification_sound: true,
            log_file: None,
        }
    }
}

impl RuntimeConfiguration {
    /// Merge file values, overrides and the command into a run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a duration in the file cannot be parsed.
    pub fn resolve(
        file: &ConfigFile,
        overrides: ConfigOverrides,
        command_to_run: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let from_file = |key: &str, value: &str| {
            parse_duration(value).map_err(|source| ConfigError::InvalidValue {
                key: format!("durations.{key}"),
                source,
            })
        };

        let minimal_effort_duration = match overrides.minimal_effort {
            Some(d) => d,
            None => from_file("minimal_effort", &file.durations.minimal_effort)?,
        };
        let work_duration = match overrides.work {
            Some(d) => d,
            None => from_file("work", &file.durations.work)?,
        };
        let overtime_duration = match overrides.overtime {
            Some(d) => d,
            None => from_file("overtime", &file.durations.overtime)?,
        };

        let config = Self {
            minimal_effort_duration,
            work_duration,
            overtime_duration,
            command_to_run,
            notifications_enabled: file.notifications.enabled && !overrides.disable_notifications,
            notification_sound: file.notifications.sound,
            log_file: overrides.log_file.or_else(|| file.log.file.clone()),
        };
        config.warn_if_inconsistent();
        Ok(config)
    }

    /// The command to supervise, if any.
    pub fn command(&self) -> Option<&[String]> {
        if self.command_to_run.is_empty() {
            None
        } else {
            Some(&self.command_to_run)
        }
    }

    fn warn_if_inconsistent(&self) {
        if self.minimal_effort_duration > self.work_duration {
            warn!(
                minimal_effort = %format_timedelta(self.minimal_effort_duration),
                work = %format_timedelta(self.work_duration),
                "minimal effort is longer than work; work will end together with minimal effort"
            );
        }
    }
}
