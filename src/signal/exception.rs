//! Signal exceptions
//!
//! A [`SignalException`] is how a signal with no registered default behavior
//! reaches the program: the checkpoint returns it instead of running code.
//! Programs can also build one directly to represent "died from signal N".

use std::fmt;

use super::constants::SIGINT;
use super::types::{SigNum, SignalRef};
use crate::error::TrapError;

/// A signal surfaced as an error value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalException {
    signo: SigNum,
}

impl SignalException {
    /// Build from any signal identifier.
    ///
    /// `EXIT`, 0, negative and out-of-range numbers, and unknown names fail.
    pub fn new<'a>(signal: impl Into<SignalRef<'a>>) -> Result<Self, TrapError> {
        signal.into().resolve().map(Self::from_identity)
    }

    pub const fn from_identity(signo: SigNum) -> Self {
        SignalException { signo }
    }

    pub fn from_number(number: i64) -> Result<Self, TrapError> {
        SigNum::from_raw(number).map(Self::from_identity)
    }

    pub fn from_name(name: &str) -> Result<Self, TrapError> {
        SigNum::from_name(name).map(Self::from_identity)
    }

    /// Build from an optional argument; a missing signal is an error
    pub fn from_args(signal: Option<SignalRef<'_>>) -> Result<Self, TrapError> {
        match signal {
            Some(signal) => Self::new(signal),
            None => Err(TrapError::MissingSignal),
        }
    }

    pub fn signo(&self) -> i32 {
        self.signo.as_i32()
    }

    pub fn signal(&self) -> SigNum {
        self.signo
    }

    /// Signal name with the `SIG` prefix, e.g. `"SIGINT"`
    pub fn signm(&self) -> String {
        self.signo.to_string()
    }

    /// Whether this is the interrupt signal
    pub fn is_interrupt(&self) -> bool {
        self.signo() == SIGINT
    }
}

impl fmt::Display for SignalException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signo)
    }
}

impl std::error::Error for SignalException {}

impl From<SigNum> for SignalException {
    fn from(signo: SigNum) -> Self {
        SignalException::from_identity(signo)
    }
}
