//! Orderly process exit
//!
//! [`terminate`] is the one way out that honors traps: signals delivered
//! right before it still get dispatched, the `EXIT` trap runs, then the
//! exit hooks, and the process ends with the status the outcome calls for.
//! A fatal signal is re-raised with the system default disposition so the
//! parent sees a real signal death.

use std::io::Write;
use std::process;

use crate::error::{DispatchError, ExitStatus};
use crate::runtime::{try_global, SignalRuntime};
use crate::signal::receiver::reset_to_system_default;
use crate::signal::types::{Action, TrapSpec, TrapTarget};

/// Map the outcome of a program to its exit status
pub fn exit_status(outcome: &Result<(), DispatchError>) -> ExitStatus {
    match outcome {
        Ok(()) => ExitStatus::Code(0),
        Err(DispatchError::Exit(req)) => req.status,
        Err(DispatchError::Signal(e)) => ExitStatus::Signaled(e.signal()),
        Err(DispatchError::Handler { .. }) => ExitStatus::Code(1),
    }
}

/// Run the `EXIT` trap, then every exit hook, newest first.
///
/// Each runs at most once per runtime. Returns how many ran. A failing
/// `EXIT` handler is logged and does not stop the hooks.
pub fn run_exit_hooks(runtime: &SignalRuntime) -> usize {
    let mut ran = 0;

    // Unset the trap while taking it so a second exit cannot run it again
    match runtime
        .table()
        .install(TrapTarget::Exit, TrapSpec::Restore(Action::Unset))
    {
        Ok(Action::Handler(handler)) => {
            ran += 1;
            if let Err(e) = handler.call(TrapTarget::Exit.signo()) {
                log::warn!("EXIT trap failed: {}", e);
            }
        }
        Ok(_) => {}
        Err(e) => log::error!("cannot take EXIT trap: {}", e),
    }

    for hook in runtime.take_exit_hooks() {
        hook();
        ran += 1;
    }
    ran
}

/// Finish a runtime: final checkpoint, exit trap and hooks.
///
/// Returns the status the process should end with. An outcome that is
/// already an error wins over anything the final checkpoint returns.
pub fn finish(runtime: &SignalRuntime, outcome: Result<(), DispatchError>) -> ExitStatus {
    let outcome = match (outcome, runtime.checkpoint()) {
        (Ok(()), Ok(_)) => Ok(()),
        (Ok(()), Err(e)) => Err(e),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(late)) => {
            log::debug!("dropping late dispatch error: {}", late);
            Err(e)
        }
    };

    if let Err(DispatchError::Handler { signal, source }) = &outcome {
        log::error!("trap for {} failed", signal);
        eprintln!("{}", source);
    }

    let status = exit_status(&outcome);
    run_exit_hooks(runtime);
    status
}

/// End the process in order. Never returns.
///
/// Without a global runtime only the status mapping applies.
pub fn terminate(outcome: Result<(), DispatchError>) -> ! {
    let status = match try_global() {
        Some(runtime) => finish(runtime, outcome),
        None => exit_status(&outcome),
    };
    exit_with(status)
}

/// Exit with `status`, dying by signal if it says so
pub fn exit_with(status: ExitStatus) -> ! {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    match status {
        ExitStatus::Code(code) => {
            log::info!("exiting with status {}", code);
            process::exit(code)
        }
        ExitStatus::Signaled(sig) => {
            log::info!("terminating by {}", sig);
            reset_to_system_default(sig);
            // SAFETY: raise has no memory-safety requirements; the disposition
            // is now the system default.
            unsafe {
                libc::raise(sig.as_i32());
            }
            // Not fatal after all (e.g. blocked), fall back to the shell code
            process::exit(status.code())
        }
    }
}
