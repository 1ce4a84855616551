//! Signal numbers, names and classification for the host platform
//!
//! Numbers come from `libc` so they always match what `kill(2)` and
//! `sigaction(2)` expect. Names are stored without the `SIG` prefix, the
//! canonical name of a number first and its aliases after it.

use std::collections::BTreeMap;

pub const SIGHUP: i32 = libc::SIGHUP;
pub const SIGINT: i32 = libc::SIGINT;
pub const SIGQUIT: i32 = libc::SIGQUIT;
pub const SIGILL: i32 = libc::SIGILL;
pub const SIGTRAP: i32 = libc::SIGTRAP;
pub const SIGABRT: i32 = libc::SIGABRT;
pub const SIGBUS: i32 = libc::SIGBUS;
pub const SIGFPE: i32 = libc::SIGFPE;
pub const SIGKILL: i32 = libc::SIGKILL; // Cannot be caught or blocked
pub const SIGUSR1: i32 = libc::SIGUSR1;
pub const SIGSEGV: i32 = libc::SIGSEGV;
pub const SIGUSR2: i32 = libc::SIGUSR2;
pub const SIGPIPE: i32 = libc::SIGPIPE;
pub const SIGALRM: i32 = libc::SIGALRM;
pub const SIGTERM: i32 = libc::SIGTERM;
pub const SIGCHLD: i32 = libc::SIGCHLD;
pub const SIGCONT: i32 = libc::SIGCONT;
pub const SIGSTOP: i32 = libc::SIGSTOP; // Cannot be caught or blocked
pub const SIGTSTP: i32 = libc::SIGTSTP;
pub const SIGTTIN: i32 = libc::SIGTTIN;
pub const SIGTTOU: i32 = libc::SIGTTOU;
pub const SIGURG: i32 = libc::SIGURG;
pub const SIGXCPU: i32 = libc::SIGXCPU;
pub const SIGXFSZ: i32 = libc::SIGXFSZ;
pub const SIGVTALRM: i32 = libc::SIGVTALRM;
pub const SIGPROF: i32 = libc::SIGPROF;
pub const SIGWINCH: i32 = libc::SIGWINCH;
pub const SIGIO: i32 = libc::SIGIO;
pub const SIGSYS: i32 = libc::SIGSYS;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub const SIGSTKFLT: i32 = libc::SIGSTKFLT;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const SIGPWR: i32 = libc::SIGPWR;

/// One past the highest signal number (Linux counts real-time signals too)
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const NSIG: i32 = 65;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const NSIG: i32 = 32;

/// Highest valid signal number
pub const MAX_SIGNAL: i32 = NSIG - 1;

/// Number listed for the `EXIT` pseudo-signal
pub const EXIT_SIGNAL: i32 = 0;

/// Name of the `EXIT` pseudo-signal
pub const EXIT_NAME: &str = "EXIT";

/// A named entry of the signal list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEntry {
    pub name: &'static str,
    pub number: i32,
}

const fn entry(name: &'static str, number: i32) -> SignalEntry {
    SignalEntry { name, number }
}

/// Every signal name known on this platform. Canonical names precede aliases.
pub static SIGNAL_TABLE: &[SignalEntry] = &[
    entry("HUP", SIGHUP),
    entry("INT", SIGINT),
    entry("QUIT", SIGQUIT),
    entry("ILL", SIGILL),
    entry("TRAP", SIGTRAP),
    entry("ABRT", SIGABRT),
    entry("BUS", SIGBUS),
    entry("FPE", SIGFPE),
    entry("KILL", SIGKILL),
    entry("USR1", SIGUSR1),
    entry("SEGV", SIGSEGV),
    entry("USR2", SIGUSR2),
    entry("PIPE", SIGPIPE),
    entry("ALRM", SIGALRM),
    entry("TERM", SIGTERM),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    entry("STKFLT", SIGSTKFLT),
    entry("CHLD", SIGCHLD),
    entry("CONT", SIGCONT),
    entry("STOP", SIGSTOP),
    entry("TSTP", SIGTSTP),
    entry("TTIN", SIGTTIN),
    entry("TTOU", SIGTTOU),
    entry("URG", SIGURG),
    entry("XCPU", SIGXCPU),
    entry("XFSZ", SIGXFSZ),
    entry("VTALRM", SIGVTALRM),
    entry("PROF", SIGPROF),
    entry("WINCH", SIGWINCH),
    entry("IO", SIGIO),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    entry("PWR", SIGPWR),
    entry("SYS", SIGSYS),
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    entry("EMT", libc::SIGEMT),
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    entry("INFO", libc::SIGINFO),
    // Aliases
    entry("IOT", SIGABRT),
    entry("CLD", SIGCHLD),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    entry("POLL", SIGIO),
];

/// Signals whose delivery cannot be intercepted by a trap.
///
/// Hardware faults cannot resume safely from a deferred handler, VTALRM is
/// claimed by timer-driven runtimes, and KILL/STOP are never catchable.
pub const RESERVED_SIGNALS: &[i32] =
    &[SIGSEGV, SIGBUS, SIGILL, SIGFPE, SIGVTALRM, SIGKILL, SIGSTOP];

/// Convert signal number to bit mask
///
/// Returns 0 for invalid signal numbers (0 or > MAX_SIGNAL)
#[inline]
pub const fn sig_mask(sig: i32) -> u64 {
    if sig <= 0 || sig > MAX_SIGNAL {
        0
    } else {
        1u64 << (sig - 1)
    }
}

/// Check if a signal number is valid
#[inline]
pub const fn is_valid_signal(sig: i64) -> bool {
    sig > 0 && sig <= MAX_SIGNAL as i64
}

/// Check if a signal is reserved (cannot be trapped)
pub fn is_reserved(sig: i32) -> bool {
    RESERVED_SIGNALS.contains(&sig)
}

/// Canonical name of a signal number, without the `SIG` prefix
pub fn signal_name(sig: i32) -> Option<&'static str> {
    SIGNAL_TABLE
        .iter()
        .find(|e| e.number == sig)
        .map(|e| e.name)
}

/// Look a signal up by name.
///
/// Matching ignores ASCII case and an optional `SIG` prefix. The `EXIT`
/// pseudo-signal is not a signal and is not found here.
pub fn signal_number(name: &str) -> Option<i32> {
    let name = strip_sig_prefix(name);
    SIGNAL_TABLE
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .map(|e| e.number)
}

/// Strip an optional, case-insensitive `SIG` prefix
pub(crate) fn strip_sig_prefix(name: &str) -> &str {
    match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("SIG") => &name[3..],
        _ => name,
    }
}

/// Every signal name (aliases included) with its number, plus `EXIT => 0`
pub fn list_signals() -> BTreeMap<&'static str, i32> {
    let mut list: BTreeMap<&'static str, i32> =
        SIGNAL_TABLE.iter().map(|e| (e.name, e.number)).collect();
    list.insert(EXIT_NAME, EXIT_SIGNAL);
    list
}
