//! Signal-related data structures

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::constants::*;
use crate::error::{HandlerError, TrapError};

/// A valid signal number of this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SigNum(u8);

impl SigNum {
    /// Validate a raw signal number
    pub fn from_raw(sig: i64) -> Result<Self, TrapError> {
        if is_valid_signal(sig) {
            Ok(SigNum(sig as u8))
        } else {
            Err(TrapError::InvalidSignalNumber(sig))
        }
    }

    /// Look a signal up by name (case-insensitive, optional `SIG` prefix)
    pub fn from_name(name: &str) -> Result<Self, TrapError> {
        signal_number(name)
            .map(|sig| SigNum(sig as u8))
            .ok_or_else(|| TrapError::InvalidSignalName(name.to_owned()))
    }

    /// Validate without building an error; usable from signal context
    #[inline]
    pub const fn checked(sig: i32) -> Option<Self> {
        if is_valid_signal(sig as i64) {
            Some(SigNum(sig as u8))
        } else {
            None
        }
    }

    pub(crate) const fn from_bit(bit: u32) -> Self {
        SigNum(bit as u8 + 1)
    }

    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Canonical name without the `SIG` prefix, if the number has one
    pub fn name(self) -> Option<&'static str> {
        signal_name(self.as_i32())
    }

    pub fn is_reserved(self) -> bool {
        is_reserved(self.as_i32())
    }

    pub const fn mask(self) -> u64 {
        sig_mask(self.0 as i32)
    }
}

impl fmt::Display for SigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "SIG{}", name),
            None => write!(f, "SIG{}", self.0),
        }
    }
}

impl TryFrom<i32> for SigNum {
    type Error = TrapError;

    fn try_from(sig: i32) -> Result<Self, TrapError> {
        SigNum::from_raw(sig as i64)
    }
}

/// A signal identifier as callers supply it.
///
/// Anything with a string form enters as [`SignalRef::Name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalRef<'a> {
    Name(Cow<'a, str>),
    Number(i64),
    Signal(SigNum),
}

impl<'a> SignalRef<'a> {
    /// Build a name reference from any string-like value
    pub fn name<S: AsRef<str> + ?Sized>(name: &S) -> SignalRef<'static> {
        SignalRef::Name(Cow::Owned(name.as_ref().to_owned()))
    }

    /// Resolve to a real signal
    pub fn resolve(&self) -> Result<SigNum, TrapError> {
        match self {
            SignalRef::Name(name) => SigNum::from_name(name),
            SignalRef::Number(number) => SigNum::from_raw(*number),
            SignalRef::Signal(sig) => Ok(*sig),
        }
    }

    /// Resolve to a trap target, accepting the `EXIT` pseudo-signal
    pub fn resolve_target(&self) -> Result<TrapTarget, TrapError> {
        match self {
            SignalRef::Name(name) if strip_sig_prefix(name).eq_ignore_ascii_case(EXIT_NAME) => {
                Ok(TrapTarget::Exit)
            }
            SignalRef::Number(0) => Ok(TrapTarget::Exit),
            _ => self.resolve().map(TrapTarget::Signal),
        }
    }
}

impl<'a> From<&'a str> for SignalRef<'a> {
    fn from(name: &'a str) -> Self {
        SignalRef::Name(Cow::Borrowed(name))
    }
}

impl From<String> for SignalRef<'static> {
    fn from(name: String) -> Self {
        SignalRef::Name(Cow::Owned(name))
    }
}

impl From<i32> for SignalRef<'static> {
    fn from(number: i32) -> Self {
        SignalRef::Number(number as i64)
    }
}

impl From<i64> for SignalRef<'static> {
    fn from(number: i64) -> Self {
        SignalRef::Number(number)
    }
}

impl From<SigNum> for SignalRef<'static> {
    fn from(sig: SigNum) -> Self {
        SignalRef::Signal(sig)
    }
}

/// Where a trap can be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapTarget {
    /// The `EXIT` pseudo-signal, run when the process exits in order
    Exit,
    Signal(SigNum),
}

impl TrapTarget {
    /// Number passed to handlers (0 for `EXIT`)
    pub fn signo(&self) -> i32 {
        match self {
            TrapTarget::Exit => EXIT_SIGNAL,
            TrapTarget::Signal(sig) => sig.as_i32(),
        }
    }
}

impl fmt::Display for TrapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapTarget::Exit => f.write_str(EXIT_NAME),
            TrapTarget::Signal(sig) => write!(f, "{}", sig),
        }
    }
}

/// Whether a handler may be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    Trusted,
    Untrusted,
}

type HandlerFn = dyn Fn(i32) -> Result<(), HandlerError> + Send + Sync;

/// A handler capability for a trap
///
/// Handlers run in a checkpoint, never in signal context, so they may
/// allocate, lock and fail. Clones share the same function.
#[derive(Clone)]
pub struct TrapHandler {
    func: Arc<HandlerFn>,
    trust: Trust,
}

impl TrapHandler {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(i32) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        TrapHandler {
            func: Arc::new(func),
            trust: Trust::Trusted,
        }
    }

    /// Mark the handler as coming from an untrusted source
    pub fn untrusted(mut self) -> Self {
        self.trust = Trust::Untrusted;
        self
    }

    pub fn trust(&self) -> Trust {
        self.trust
    }

    pub fn call(&self, signo: i32) -> Result<(), HandlerError> {
        (self.func)(signo)
    }

    /// Check whether both handles share the same function
    pub fn ptr_eq(&self, other: &TrapHandler) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for TrapHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapHandler")
            .field("func", &Arc::as_ptr(&self.func))
            .field("trust", &self.trust)
            .finish()
    }
}

/// The action registered for a signal
#[derive(Debug, Clone, Default)]
pub enum Action {
    /// Nothing was ever registered; behaves like `Default`
    #[default]
    Unset,
    /// The signal's default behavior
    Default,
    /// Drop the signal
    Ignore,
    /// Exit the process in order
    Exit,
    /// Run a handler
    Handler(TrapHandler),
}

impl Action {
    /// The token that names this action, if it is not a handler
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Action::Unset => None,
            Action::Default => Some("DEFAULT"),
            Action::Ignore => Some("IGNORE"),
            Action::Exit => Some("EXIT"),
            Action::Handler(_) => None,
        }
    }

    #[inline]
    pub fn is_handler(&self) -> bool {
        matches!(self, Action::Handler(_))
    }

    /// Parse an action token.
    ///
    /// An empty token means ignore. Unknown tokens are rejected.
    pub fn from_token(token: &str) -> Result<Self, TrapError> {
        match token {
            "" | "IGNORE" | "SIG_IGN" => Ok(Action::Ignore),
            "DEFAULT" | "SIG_DFL" | "SYSTEM_DEFAULT" => Ok(Action::Default),
            "EXIT" => Ok(Action::Exit),
            other => Err(TrapError::InvalidActionToken(other.to_owned())),
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Action::Unset, Action::Unset)
            | (Action::Default, Action::Default)
            | (Action::Ignore, Action::Ignore)
            | (Action::Exit, Action::Exit) => true,
            (Action::Handler(a), Action::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// What a caller asks `trap` to install
#[derive(Debug, Clone)]
pub enum TrapSpec<'a> {
    /// No command: ignore the signal
    Nil,
    /// One of the action tokens
    Token(&'a str),
    Handler(TrapHandler),
    /// Put back an action previously returned by `trap`
    Restore(Action),
}

impl<'a> TrapSpec<'a> {
    /// Validate into the action to store
    pub fn into_action(self, target: TrapTarget) -> Result<Action, TrapError> {
        let action = match self {
            TrapSpec::Nil => Action::Ignore,
            TrapSpec::Token(token) => Action::from_token(token)?,
            TrapSpec::Handler(handler) => Action::Handler(handler),
            TrapSpec::Restore(action) => action,
        };
        if let Action::Handler(ref handler) = action {
            if handler.trust() == Trust::Untrusted {
                return Err(TrapError::UntrustedHandler(target));
            }
        }
        Ok(action)
    }
}

impl<'a> From<&'a str> for TrapSpec<'a> {
    fn from(token: &'a str) -> Self {
        TrapSpec::Token(token)
    }
}

impl<'a> From<Option<&'a str>> for TrapSpec<'a> {
    fn from(token: Option<&'a str>) -> Self {
        token.map_or(TrapSpec::Nil, TrapSpec::Token)
    }
}

impl From<TrapHandler> for TrapSpec<'static> {
    fn from(handler: TrapHandler) -> Self {
        TrapSpec::Handler(handler)
    }
}

impl From<Action> for TrapSpec<'static> {
    fn from(action: Action) -> Self {
        TrapSpec::Restore(action)
    }
}

/// Platform default action for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDefaultAction {
    /// Terminate the process
    Terminate,
    /// Ignore the signal
    Ignore,
    /// Terminate with core dump
    CoreDump,
    /// Stop (pause) the process
    Stop,
    /// Continue a stopped process
    Continue,
}

/// Get the platform default action for a signal
pub fn default_action(sig: SigNum) -> SignalDefaultAction {
    match sig.as_i32() {
        SIGQUIT | SIGILL | SIGTRAP | SIGABRT | SIGBUS | SIGFPE | SIGSEGV | SIGXCPU | SIGXFSZ
        | SIGSYS => SignalDefaultAction::CoreDump,

        SIGCHLD | SIGURG | SIGWINCH => SignalDefaultAction::Ignore,

        SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU => SignalDefaultAction::Stop,

        SIGCONT => SignalDefaultAction::Continue,

        // HUP, INT, TERM, USR1/2, ALRM, PIPE and real-time signals
        _ => SignalDefaultAction::Terminate,
    }
}

/// What the `Default` action does for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultBehavior {
    /// No registered behavior: surface a `SignalException`
    Raise,
    /// Drop the signal (the OS ignores it too)
    Ignore,
    /// Leave it to the platform default action
    System,
}

/// Signals that surface as a `SignalException` unless trapped
const RAISED_BY_DEFAULT: &[i32] = &[SIGHUP, SIGINT, SIGQUIT, SIGALRM, SIGTERM, SIGUSR1, SIGUSR2];

/// Get the built-in default behavior for a signal
pub fn default_behavior(sig: SigNum) -> DefaultBehavior {
    match sig.as_i32() {
        signo if RAISED_BY_DEFAULT.contains(&signo) => DefaultBehavior::Raise,
        SIGPIPE => DefaultBehavior::Ignore,
        _ => DefaultBehavior::System,
    }
}
