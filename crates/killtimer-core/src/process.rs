//! The supervised child process.
//!
//! A child is started with its output discarded and in a process group of its
//! own, so terminal job control (Ctrl-C, Ctrl-Z) reaches the supervisor only.
//! Liveness is checked with a non-blocking `try_wait`; termination sends
//! `SIGTERM` to the child's group and returns without waiting.

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{LaunchError, TerminationFailure};

/// Observed state of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    /// Exit code, `None` when the process was ended by a signal.
    Exited(Option<i32>),
}

/// Operations the supervisor needs from a running child.
pub trait ChildProcess {
    fn pid(&self) -> u32;

    /// Non-blocking check: `true` until the process has exited.
    fn is_alive(&mut self) -> bool;

    /// Ask the process to stop. A no-op once it has exited or was already
    /// asked.
    fn terminate(&mut self) -> Result<(), TerminationFailure>;
}

/// Starts child processes.
pub trait Launcher {
    fn launch(&self, command: &[String]) -> Result<Box<dyn ChildProcess>, LaunchError>;
}

/// Launches real OS processes via [`ChildHandle::launch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, command: &[String]) -> Result<Box<dyn ChildProcess>, LaunchError> {
        Ok(Box::new(ChildHandle::launch(command)?))
    }
}

/// Handle to a real OS process owned by the supervisor.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
    liveness: Liveness,
    termination_requested: bool,
}

impl ChildHandle {
    /// Start `command[0]` with the remaining elements as arguments.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] if the command is empty or the executable
    /// cannot be started.
    pub fn launch(command: &[String]) -> Result<Self, LaunchError> {
        let (program, args) = command.split_first().ok_or(LaunchError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            command: command.join(" "),
            source,
        })?;
        info!(pid = child.id(), program = %program, "launched child process");

        Ok(Self {
            child,
            liveness: Liveness::Running,
            termination_requested: false,
        })
    }

    /// Poll the process without blocking and cache an observed exit.
    pub fn liveness(&mut self) -> Liveness {
        if self.liveness != Liveness::Running {
            return self.liveness;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.child.id(), code = ?status.code(), "child exited");
                self.liveness = Liveness::Exited(status.code());
            }
            Ok(None) => {}
            Err(e) => {
                // The process is no longer ours to wait on.
                warn!(pid = self.child.id(), error = %e, "cannot poll child, treating as exited");
                self.liveness = Liveness::Exited(None);
            }
        }
        self.liveness
    }

    /// Exit code if the process has been observed to exit with one.
    pub fn exit_code(&mut self) -> Option<i32> {
        match self.liveness() {
            Liveness::Exited(code) => code,
            Liveness::Running => None,
        }
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> std::io::Result<()> {
        let pid = self.child.id() as libc::pid_t;
        // The child leads its own process group, so signal the whole group.
        let rc = unsafe { libc::kill(-pid, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> std::io::Result<()> {
        self.child.kill()
    }
}

impl ChildProcess for ChildHandle {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        self.liveness() == Liveness::Running
    }

    fn terminate(&mut self) -> Result<(), TerminationFailure> {
        if self.termination_requested || !self.is_alive() {
            debug!(pid = self.child.id(), "terminate skipped, nothing to do");
            return Ok(());
        }
        let pid = self.child.id();
        self.send_terminate()
            .map_err(|source| TerminationFailure { pid, source })?;
        self.termination_requested = true;
        info!(pid, "sent termination request");
        Ok(())
    }
}

/// How long dropping a signalled handle waits for the child to be reaped.
const REAP_GRACE: Duration = Duration::from_millis(500);
const REAP_POLL: Duration = Duration::from_millis(20);

impl Drop for ChildHandle {
    fn drop(&mut self) {
        // A signalled child gets REAP_GRACE to exit. Anything still running
        // is reaped by init once this process exits.
        let deadline = Instant::now() + REAP_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(None) if self.termination_requested && Instant::now() < deadline => {
                    std::thread::sleep(REAP_POLL);
                }
                Ok(None) => {
                    debug!(pid = self.child.id(), "child still running at drop");
                    return;
                }
                Ok(Some(_)) | Err(_) => return,
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn wait_until_exited(handle: &mut ChildHandle, limit: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < limit {
            if !handle.is_alive() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(ChildHandle::launch(&[]), Err(LaunchError::EmptyCommand)));
    }

    #[test]
    fn missing_executable_is_a_launch_error() {
        let err = ChildHandle::launch(&cmd(&["/definitely/not/here/killtimer-test"])).unwrap_err();
        assert!(matches!(err, LaunchError::SpawnFailed { .. }));
        assert!(err.to_string().contains("/definitely/not/here/killtimer-test"));
    }

    #[test]
    fn short_lived_child_reports_exit_code() {
        let mut handle = ChildHandle::launch(&cmd(&["sh", "-c", "exit 3"])).unwrap();
        assert!(wait_until_exited(&mut handle, Duration::from_secs(5)));
        assert_eq!(handle.liveness(), Liveness::Exited(Some(3)));
        assert_eq!(handle.exit_code(), Some(3));
    }

    #[test]
    fn is_alive_does_not_block() {
        let mut handle = ChildHandle::launch(&cmd(&["sleep", "5"])).unwrap();
        let started = Instant::now();
        assert!(handle.is_alive());
        assert!(started.elapsed() < Duration::from_millis(500));
        handle.terminate().unwrap();
    }

    #[test]
    fn terminate_stops_child_and_repeats_as_noop() {
        let mut handle = ChildHandle::launch(&cmd(&["sleep", "30"])).unwrap();
        assert!(handle.is_alive());
        handle.terminate().unwrap();
        handle.terminate().unwrap();
        assert!(wait_until_exited(&mut handle, Duration::from_secs(5)));
        assert_eq!(handle.liveness(), Liveness::Exited(None));
        handle.terminate().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn dropping_a_terminated_handle_reaps_the_child() {
        let mut handle = ChildHandle::launch(&cmd(&["sleep", "30"])).unwrap();
        let pid = handle.pid();
        handle.terminate().unwrap();
        drop(handle);
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }
}
