//! Process-wide signal disposition (spec.md §5): a `SIGPIPE` ignore so a
//! client or CGI child closing its end of a pipe never kills the process
//! with the default terminate-on-write disposition, a single signal-safe
//! flag set by `SIGCHLD` to prompt a non-blocking reap on the next tick, and
//! `SIGINT`/`SIGTERM` handling for a clean, exit-code-0 shutdown.

use nix::sys::signal::{self, SigHandler, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

static CHILD_EXITED: AtomicBool = AtomicBool::new(false);
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigchld(_: i32) {
    CHILD_EXITED.store(true, Ordering::Relaxed);
}

extern "C" fn on_shutdown_signal(_: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// Installs the process-wide dispositions described above. Must run once,
/// before the reactor starts polling.
pub fn install() -> nix::Result<()> {
    unsafe {
        signal::signal(Signal::SIGPIPE, SigHandler::SigIgn)?;
        signal::signal(Signal::SIGCHLD, SigHandler::Handler(on_sigchld))?;
        signal::signal(Signal::SIGINT, SigHandler::Handler(on_shutdown_signal))?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(on_shutdown_signal))?;
    }
    Ok(())
}

/// Clears and returns whether a `SIGCHLD` arrived since the last check.
pub fn take_child_exited() -> bool {
    CHILD_EXITED.swap(false, Ordering::Relaxed)
}

/// Whether `SIGINT`/`SIGTERM` asked for a graceful shutdown.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}
