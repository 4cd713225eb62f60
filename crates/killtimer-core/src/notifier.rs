//! Desktop notifications fired at phase boundaries.

use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NOTIFICATION_TITLE: &str = "Killtimer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Informational, dismisses itself.
    Normal,
    /// Stays on screen until dismissed.
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    pub sound: bool,
}

impl Notification {
    pub fn information(message: impl Into<String>) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            message: message.into(),
            urgency: Urgency::Normal,
            sound: true,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            message: message.into(),
            urgency: Urgency::Critical,
            sound: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to run notification helper '{helper}': {source}")]
    Helper {
        helper: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("notification helper '{helper}' exited with {status}")]
    HelperFailed {
        helper: &'static str,
        status: std::process::ExitStatus,
    },

    #[error("desktop notifications are not supported on this platform")]
    Unsupported,
}

/// Delivers a notification to the user.
pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sends notifications through the platform's notification helper
/// (`notify-send` on Linux and BSD, `osascript` on macOS).
#[derive(Debug, Clone, Copy)]
pub struct DesktopNotifier {
    sound: bool,
}

impl DesktopNotifier {
    pub fn new(sound: bool) -> Self {
        Self { sound }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Notifier for DesktopNotifier {
    #[cfg(target_os = "macos")]
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let escape = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");
        let mut script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape(&notification.message),
            escape(&notification.title)
        );
        if self.sound && notification.sound {
            script.push_str(" sound name \"Glass\"");
        }
        run_helper("osascript", Command::new("osascript").args(["-e", &script]))
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (urgency, icon) = match notification.urgency {
            Urgency::Normal => ("normal", "dialog-information"),
            Urgency::Critical => ("critical", "dialog-warning"),
        };
        let mut cmd = Command::new("notify-send");
        cmd.args(["-u", urgency, "-i", icon, "-a", "killtimer"]);
        if self.sound && notification.sound {
            cmd.args(["-h", "string:sound-name:message-new-instant"]);
        }
        cmd.args([notification.title.as_str(), notification.message.as_str()]);
        run_helper("notify-send", &mut cmd)
    }

    #[cfg(not(unix))]
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Unsupported)
    }
}

#[cfg(unix)]
fn run_helper(helper: &'static str, cmd: &mut Command) -> Result<(), NotifyError> {
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| NotifyError::Helper { helper, source })?;
    if status.success() {
        Ok(())
    } else {
        Err(NotifyError::HelperFailed { helper, status })
    }
}

/// Drops every notification. Used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::debug!(message = %notification.message, "notification suppressed");
        Ok(())
    }
}
