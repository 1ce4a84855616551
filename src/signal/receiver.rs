//! Low-level signal receiver
//!
//! [`receive`] is the only code that runs in OS signal-delivery context. It
//! records the signal in the global runtime's pending set and writes a byte
//! to the wake pipe, nothing else: no allocation, no locks, no logging, no
//! handler calls. Everything else in this module runs in normal context and
//! changes OS dispositions so that [`receive`] gets called at all.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr;
use std::time::Duration;

use spin::Mutex;

use super::constants::NSIG;
use super::types::SigNum;
use crate::error::TrapError;

/// Changes how the OS disposes of a signal
///
/// The trap table calls these with its writer lock held, so the OS state and
/// the table never disagree.
pub trait Disposition: Send + Sync {
    /// Route the signal to the receiver
    fn catch(&self, sig: SigNum) -> Result<(), TrapError>;
    /// Have the OS drop the signal
    fn ignore(&self, sig: SigNum) -> Result<(), TrapError>;
    /// Have the OS apply its default action
    fn system_default(&self, sig: SigNum) -> Result<(), TrapError>;
    /// Put back whatever disposition was in place before the first change
    fn release(&self, sig: SigNum) -> Result<(), TrapError>;
    /// Route an untrapped signal to the receiver, unless the process was
    /// started with it ignored
    fn adopt(&self, sig: SigNum) -> Result<(), TrapError> {
        self.catch(sig)
    }
}

/// Disposition for runtimes not attached to the OS
#[derive(Debug, Default)]
pub struct Detached;

impl Disposition for Detached {
    fn catch(&self, _sig: SigNum) -> Result<(), TrapError> {
        Ok(())
    }

    fn ignore(&self, _sig: SigNum) -> Result<(), TrapError> {
        Ok(())
    }

    fn system_default(&self, _sig: SigNum) -> Result<(), TrapError> {
        Ok(())
    }

    fn release(&self, _sig: SigNum) -> Result<(), TrapError> {
        Ok(())
    }
}

/// Disposition backed by `sigaction(2)`
pub struct HostSignals {
    // Disposition found before our first change, indexed by signal number
    saved: Mutex<[Option<libc::sigaction>; NSIG as usize]>,
}

impl Default for HostSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSignals {
    pub fn new() -> Self {
        HostSignals {
            saved: Mutex::new([None; NSIG as usize]),
        }
    }

    fn set(&self, sig: SigNum, handler: libc::sighandler_t) -> Result<(), TrapError> {
        let mut saved = self.saved.lock();

        // SAFETY: sigaction is plain old data; all-zero is a valid value.
        let mut new: libc::sigaction = unsafe { mem::zeroed() };
        new.sa_sigaction = handler;
        new.sa_flags = libc::SA_RESTART;
        let mut old: libc::sigaction = unsafe { mem::zeroed() };

        // SAFETY: both pointers refer to live, initialized sigaction values.
        let ret = unsafe {
            libc::sigemptyset(&mut new.sa_mask);
            libc::sigaction(sig.as_i32(), &new, &mut old)
        };
        if ret != 0 {
            let source = io::Error::last_os_error();
            log::error!("sigaction({}) failed: {}", sig, source);
            return Err(TrapError::Os { signal: sig, source });
        }

        let slot = &mut saved[sig.as_u8() as usize];
        if slot.is_none() {
            *slot = Some(old);
        }
        Ok(())
    }

    /// Whether the disposition found before our first change was `SIG_IGN`
    fn inherited_ignore(&self, sig: SigNum) -> Result<bool, TrapError> {
        if let Some(old) = &self.saved.lock()[sig.as_u8() as usize] {
            return Ok(old.sa_sigaction == libc::SIG_IGN);
        }

        // SAFETY: sigaction is plain old data; all-zero is a valid value.
        let mut current: libc::sigaction = unsafe { mem::zeroed() };
        // SAFETY: a null new action only queries; `current` is live.
        let ret = unsafe { libc::sigaction(sig.as_i32(), ptr::null(), &mut current) };
        if ret != 0 {
            let source = io::Error::last_os_error();
            return Err(TrapError::Os { signal: sig, source });
        }
        Ok(current.sa_sigaction == libc::SIG_IGN)
    }
}

impl Disposition for HostSignals {
    fn catch(&self, sig: SigNum) -> Result<(), TrapError> {
        self.set(sig, receive as extern "C" fn(libc::c_int) as libc::sighandler_t)
    }

    fn ignore(&self, sig: SigNum) -> Result<(), TrapError> {
        self.set(sig, libc::SIG_IGN)
    }

    fn system_default(&self, sig: SigNum) -> Result<(), TrapError> {
        self.set(sig, libc::SIG_DFL)
    }

    fn release(&self, sig: SigNum) -> Result<(), TrapError> {
        let mut saved = self.saved.lock();
        let Some(old) = saved[sig.as_u8() as usize].take() else {
            return Ok(());
        };
        // SAFETY: `old` was filled in by a successful sigaction call.
        let ret = unsafe { libc::sigaction(sig.as_i32(), &old, ptr::null_mut()) };
        if ret != 0 {
            let source = io::Error::last_os_error();
            saved[sig.as_u8() as usize] = Some(old);
            log::error!("restoring disposition of {} failed: {}", sig, source);
            return Err(TrapError::Os { signal: sig, source });
        }
        Ok(())
    }

    fn adopt(&self, sig: SigNum) -> Result<(), TrapError> {
        if self.inherited_ignore(sig)? {
            log::debug!("{} was ignored at startup, leaving it ignored", sig);
            self.release(sig)
        } else {
            self.catch(sig)
        }
    }
}

/// Reset a signal to the system default outside of any trap table.
///
/// Used by the exit path right before re-raising a fatal signal.
pub(crate) fn reset_to_system_default(sig: SigNum) {
    // SAFETY: installing SIG_DFL has no memory-safety requirements.
    unsafe {
        libc::signal(sig.as_i32(), libc::SIG_DFL);
    }
}

/// The OS signal handler.
///
/// Must stay async-signal-safe: atomics and `write(2)` only.
extern "C" fn receive(signo: libc::c_int) {
    let _errno = ErrnoGuard::save();
    if let Some(runtime) = crate::runtime::try_global() {
        runtime.deliver(signo);
    }
}

/// Restores `errno` on drop so the interrupted code never sees our `write`
struct ErrnoGuard(libc::c_int);

impl ErrnoGuard {
    fn save() -> Self {
        ErrnoGuard(unsafe { *errno_location() })
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        unsafe { *errno_location() = self.0 }
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "dragonfly"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno()
}

/// Self-pipe used to wake checkpoints blocked in [`WakePipe::wait`]
pub struct WakePipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl WakePipe {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: fds has room for the two descriptors pipe() writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe() succeeded, we own both descriptors from here on.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        for fd in [&read, &write] {
            set_nonblocking_cloexec(fd)?;
        }
        Ok(WakePipe { read, write })
    }

    /// Make the next `wait` return. Safe to call from signal context.
    #[inline]
    pub fn kick(&self) {
        let byte = 1u8;
        // A full pipe already guarantees a wake-up, so the result is ignored.
        unsafe {
            libc::write(
                self.write.as_raw_fd(),
                &byte as *const u8 as *const libc::c_void,
                1,
            );
        }
    }

    /// Block until kicked or until `timeout` passes. Returns true if kicked
    /// (or interrupted).
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut pfd = libc::pollfd {
            fd: self.read.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd is a single valid pollfd.
        let ret = unsafe { libc::poll(&mut pfd, 1, poll_timeout_ms(timeout)) };
        ret != 0
    }

    /// Consume every pending wake byte
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            // SAFETY: buf is valid for buf.len() bytes.
            let n = unsafe {
                libc::read(
                    self.read.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 || (n as usize) < buf.len() {
                break;
            }
        }
    }
}

fn set_nonblocking_cloexec(fd: &OwnedFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: fcntl on a descriptor we own.
    unsafe {
        let flags = libc::fcntl(raw, libc::F_GETFL);
        if flags < 0 || libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(raw, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Round a timeout up to whole milliseconds for poll(2)
fn poll_timeout_ms(timeout: Duration) -> libc::c_int {
    let mut ms = timeout.as_millis();
    if Duration::from_millis(ms as u64) < timeout {
        ms += 1;
    }
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}
