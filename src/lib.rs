//! Deferred signal dispatch and trap management
//!
//! Signals are recorded when the OS delivers them and run later, at a
//! checkpoint, where handlers may allocate, lock and fail like any other
//! code.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sigtrap::{TrapHandler, trap};
//!
//! trap("INT", TrapHandler::new(|signo| {
//!     println!("got {}", sigtrap::signal_name(signo).unwrap_or("?"));
//!     Ok(())
//! }))?;
//! sigtrap::raise("INT")?;
//! sigtrap::sleep(Duration::from_millis(100))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod exit;
pub mod logger;
pub mod process;
pub mod runtime;
pub mod signal;

use std::collections::BTreeMap;
use std::time::Duration;

pub use config::{Attach, LogConfig, RuntimeConfig};
pub use error::{DispatchError, ExitRequest, ExitStatus, HandlerError, TrapError};
pub use exit::{exit_status, exit_with, terminate};
pub use process::{kill, raise};
pub use runtime::{init_global, runtime, SignalRuntime};
pub use signal::delivery::DispatchStats;
pub use signal::exception::SignalException;
pub use signal::types::{
    Action, DefaultBehavior, SigNum, SignalRef, TrapHandler, TrapSpec, TrapTarget, Trust,
};

/// Register an action on the global runtime, returning the previous one
pub fn trap<'a, 'b>(
    signal: impl Into<SignalRef<'a>>,
    spec: impl Into<TrapSpec<'b>>,
) -> Result<Action, TrapError> {
    runtime()?.trap(signal, spec)
}

/// Record a delivery on the global runtime; async-signal-safe
pub fn deliver(signo: i32) {
    if let Some(runtime) = runtime::try_global() {
        runtime.deliver(signo);
    }
}

/// Dispatch pending signals of the global runtime
pub fn checkpoint() -> Result<usize, DispatchError> {
    match runtime::try_global() {
        Some(runtime) => runtime.checkpoint(),
        None => Ok(0),
    }
}

/// Sleep while dispatching signals of the global runtime
pub fn sleep(duration: Duration) -> Result<usize, DispatchError> {
    match runtime::try_global() {
        Some(runtime) => runtime.sleep(duration),
        None => {
            std::thread::sleep(duration);
            Ok(0)
        }
    }
}

/// Run `hook` when the process exits through [`terminate`]
pub fn at_exit<F>(hook: F) -> Result<(), TrapError>
where
    F: FnOnce() + Send + 'static,
{
    runtime()?.at_exit(hook);
    Ok(())
}

/// Every signal name and alias with its number, plus `EXIT => 0`
pub fn list_signals() -> BTreeMap<&'static str, i32> {
    signal::constants::list_signals()
}

/// Canonical name of a signal number, without the `SIG` prefix
pub fn signal_name(signo: i32) -> Option<&'static str> {
    signal::constants::signal_name(signo)
}
