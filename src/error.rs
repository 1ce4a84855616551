//! Error types for registration and dispatch.
//!
//! [`TrapError`] is returned synchronously when a trap is registered, a signal
//! identifier is resolved, or an exception is built. [`DispatchError`] is what
//! leaves a checkpoint when a deferred action wants the surrounding program to
//! observe it. Nothing from the asynchronous delivery path ever becomes an
//! error by itself.

use std::fmt;
use std::io;

use crate::signal::exception::SignalException;
use crate::signal::types::{SigNum, TrapTarget};

/// Error returned by a trap handler
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registration and construction errors
#[derive(Debug)]
pub enum TrapError {
    /// The name does not belong to any signal of this platform.
    InvalidSignalName(String),
    /// The number is outside the platform's signal range.
    InvalidSignalNumber(i64),
    /// The signal cannot be trapped.
    ReservedSignal(SigNum),
    /// The handler was marked untrusted.
    UntrustedHandler(TrapTarget),
    /// The action string is not one of the known tokens.
    InvalidActionToken(String),
    /// No signal was given where one is required.
    MissingSignal,
    /// The OS refused to change the disposition of a signal.
    Os { signal: SigNum, source: io::Error },
    /// `kill(2)` failed.
    Process { pid: i32, source: io::Error },
    /// The wake pipe could not be set up.
    Io(io::Error),
}

impl fmt::Display for TrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapError::InvalidSignalName(name) => write!(f, "unsupported signal '{}'", name),
            TrapError::InvalidSignalNumber(number) => {
                write!(f, "invalid signal number ({})", number)
            }
            TrapError::ReservedSignal(sig) => write!(f, "can't trap reserved signal: {}", sig),
            TrapError::UntrustedHandler(target) => {
                write!(f, "insecure: untrusted handler for {}", target)
            }
            TrapError::InvalidActionToken(token) => write!(f, "invalid trap command '{}'", token),
            TrapError::MissingSignal => {
                write!(f, "wrong number of arguments (given 0, expected 1)")
            }
            TrapError::Os { signal, source } => {
                write!(f, "failed to change disposition of {}: {}", signal, source)
            }
            TrapError::Process { pid, source } => write!(f, "kill({}): {}", pid, source),
            TrapError::Io(e) => write!(f, "signal wake pipe: {}", e),
        }
    }
}

impl std::error::Error for TrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrapError::Os { source, .. } | TrapError::Process { source, .. } => Some(source),
            TrapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrapError {
    fn from(e: io::Error) -> Self {
        TrapError::Io(e)
    }
}

/// How a process should end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exit normally with this code
    Code(i32),
    /// Die from this signal
    Signaled(SigNum),
}

impl ExitStatus {
    /// Numeric status as a shell reports it (`128 + signo` for signals)
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Code(code) => *code,
            ExitStatus::Signaled(sig) => 128 + sig.as_i32(),
        }
    }
}

/// Request for an orderly process exit raised by a deferred action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRequest {
    pub status: ExitStatus,
}

impl ExitRequest {
    pub const fn code(code: i32) -> Self {
        ExitRequest {
            status: ExitStatus::Code(code),
        }
    }

    pub const fn signaled(sig: SigNum) -> Self {
        ExitRequest {
            status: ExitStatus::Signaled(sig),
        }
    }
}

impl fmt::Display for ExitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ExitStatus::Code(code) => write!(f, "exit ({})", code),
            ExitStatus::Signaled(sig) => write!(f, "exit by {}", sig),
        }
    }
}

/// Handlers return an `ExitRequest` as their error to exit the process
impl std::error::Error for ExitRequest {}

/// Failure propagated out of a checkpoint
#[derive(Debug)]
pub enum DispatchError {
    /// A trap handler returned an error.
    Handler { signal: SigNum, source: HandlerError },
    /// A signal with no registered default behavior surfaced as an exception.
    Signal(SignalException),
    /// A deferred action asked for the process to exit.
    Exit(ExitRequest),
}

impl DispatchError {
    /// The signal whose dispatch failed, if any
    pub fn signal(&self) -> Option<SigNum> {
        match self {
            DispatchError::Handler { signal, .. } => Some(*signal),
            DispatchError::Signal(e) => Some(e.signal()),
            DispatchError::Exit(_) => None,
        }
    }

    /// Take the handler's own error back out
    pub fn into_handler_error(self) -> Option<HandlerError> {
        match self {
            DispatchError::Handler { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Handler { source, .. } => write!(f, "{}", source),
            DispatchError::Signal(e) => write!(f, "{}", e),
            DispatchError::Exit(req) => write!(f, "{}", req),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Handler { source, .. } => Some(source.as_ref()),
            DispatchError::Signal(e) => Some(e),
            DispatchError::Exit(_) => None,
        }
    }
}

impl From<SignalException> for DispatchError {
    fn from(e: SignalException) -> Self {
        DispatchError::Signal(e)
    }
}
