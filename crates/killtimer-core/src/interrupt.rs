//! Interruption of the supervising process.
//!
//! SIGINT, SIGTERM and SIGHUP only raise a flag. The supervisor sees it at the
//! next tick, terminates the child and stops.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The process-wide flag set by the installed signal handlers.
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// Whether an interruption was requested.
pub fn is_interrupted(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

#[cfg(unix)]
extern "C" fn on_signal(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT, SIGTERM and SIGHUP to [`interrupt_flag`].
///
/// # Errors
///
/// Returns the OS error if a handler cannot be installed.
#[cfg(unix)]
pub fn install_handlers() -> std::io::Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
        // SAFETY: the handler only performs an atomic store, which is
        // async-signal-safe, and the sigaction struct is fully initialised.
        let rc = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = libc::SA_RESTART;
            libc::sigaction(signal, &action, std::ptr::null_mut())
        };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    tracing::debug!("interrupt handlers installed");
    Ok(())
}

#[cfg(not(unix))]
pub fn install_handlers() -> std::io::Result<()> {
    tracing::debug!("interrupt handlers unavailable on this platform");
    Ok(())
}
