//! Sending signals
//!
//! Identifiers are resolved here, before anything reaches `kill(2)`, so a bad
//! name or number fails the same way it does for `trap`.

use std::io;

use crate::error::TrapError;
use crate::signal::types::SignalRef;

/// Send a signal to `pid`.
///
/// Signal number 0 only checks that the process exists. Negative pids address
/// process groups the way `kill(2)` defines.
pub fn kill<'a>(pid: libc::pid_t, signal: impl Into<SignalRef<'a>>) -> Result<(), TrapError> {
    let signo = match signal.into() {
        SignalRef::Number(0) => 0,
        other => other
            .resolve()
            .map_err(|e| {
                log::warn!("kill: {}", e);
                e
            })?
            .as_i32(),
    };

    log::debug!("kill({}, {})", pid, signo);
    // SAFETY: kill has no memory-safety requirements.
    if unsafe { libc::kill(pid, signo) } != 0 {
        return Err(TrapError::Process {
            pid,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Send a signal to the calling process
pub fn raise<'a>(signal: impl Into<SignalRef<'a>>) -> Result<(), TrapError> {
    kill(std::process::id() as libc::pid_t, signal)
}
