//! Signal runtime
//!
//! A [`SignalRuntime`] owns one trap table, one dispatcher and one wake pipe.
//! Any number of detached runtimes can exist; the process-global one, set up
//! by [`init_global`], is the only one the OS receiver feeds.

use std::io;
use std::time::{Duration, Instant};

use conquer_once::spin::OnceCell;
use crossbeam_queue::SegQueue;

use crate::config::{Attach, RuntimeConfig};
use crate::error::{DispatchError, TrapError};
use crate::signal::delivery::{DispatchStats, Dispatcher};
use crate::signal::pending::SigSet;
use crate::signal::receiver::{Detached, Disposition, HostSignals, WakePipe};
use crate::signal::table::TrapTable;
use crate::signal::types::{Action, SigNum, SignalRef, TrapSpec, TrapTarget};

static GLOBAL: OnceCell<SignalRuntime> = OnceCell::uninit();

pub(crate) type ExitHook = Box<dyn FnOnce() + Send + 'static>;

pub struct SignalRuntime {
    table: TrapTable,
    dispatcher: Dispatcher,
    wake: WakePipe,
    exit_hooks: SegQueue<ExitHook>,
    attach: Attach,
}

impl SignalRuntime {
    /// Create a runtime that is not attached to the OS.
    ///
    /// Signals reach it only through [`deliver`](Self::deliver). The attach
    /// mode of `config` is ignored here; see [`init_global`].
    pub fn new(config: RuntimeConfig) -> Result<Self, TrapError> {
        Self::build(&config, Attach::Detached)
    }

    pub fn detached() -> Result<Self, TrapError> {
        Self::new(RuntimeConfig::detached())
    }

    fn build(config: &RuntimeConfig, attach: Attach) -> Result<Self, TrapError> {
        let disposition: Box<dyn Disposition> = match attach {
            Attach::Host => Box::new(HostSignals::new()),
            Attach::Detached => Box::new(Detached),
        };
        let mut table = TrapTable::new(disposition);
        for &(sig, behavior) in config.default_overrides() {
            table.set_default_behavior(sig, behavior);
        }

        Ok(SignalRuntime {
            table,
            dispatcher: Dispatcher::new(),
            wake: WakePipe::new()?,
            exit_hooks: SegQueue::new(),
            attach,
        })
    }

    pub fn attach_mode(&self) -> Attach {
        self.attach
    }

    /// Register an action and return the one it replaces.
    ///
    /// `signal` may name `EXIT` (or be 0) to register the exit trap.
    pub fn trap<'a, 'b>(
        &self,
        signal: impl Into<SignalRef<'a>>,
        spec: impl Into<TrapSpec<'b>>,
    ) -> Result<Action, TrapError> {
        let target = signal.into().resolve_target()?;
        self.table.install(target, spec.into())
    }

    /// The action currently registered for `signal`
    pub fn lookup<'a>(&self, signal: impl Into<SignalRef<'a>>) -> Result<Action, TrapError> {
        let target = signal.into().resolve_target()?;
        Ok(self.table.lookup(target))
    }

    /// Record a delivery of `signo`.
    ///
    /// Async-signal-safe. Numbers outside the signal range (including 0) are
    /// dropped.
    #[inline]
    pub fn deliver(&self, signo: i32) {
        if let Some(sig) = SigNum::checked(signo) {
            if self.dispatcher.record(sig) {
                self.wake.kick();
            }
        }
    }

    /// Dispatch every signal pending right now.
    ///
    /// Returns `Ok(0)` if another checkpoint is already dispatching.
    pub fn checkpoint(&self) -> Result<usize, DispatchError> {
        let Some(result) = self.dispatcher.try_drain(&self.table) else {
            return Ok(0);
        };
        // Late arrivals never kicked the pipe; wake whoever skipped this cycle
        if self.dispatcher.has_pending() {
            self.wake.kick();
        }
        result
    }

    /// Block for `duration`, dispatching signals as they arrive.
    ///
    /// Returns the number of signals dispatched. The first dispatch error
    /// ends the sleep early.
    pub fn sleep(&self, duration: Duration) -> Result<usize, DispatchError> {
        // None: too far in the future to represent, sleep "forever"
        let deadline = Instant::now().checked_add(duration);
        let mut total = self.checkpoint()?;
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return Ok(total);
            }
            if self.wake.wait(remaining) {
                self.wake.drain();
            }
            total += self.checkpoint()?;
        }
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.dispatcher.has_pending()
    }

    pub fn pending(&self) -> SigSet {
        self.dispatcher.pending()
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Run `hook` on orderly exit, after the `EXIT` trap.
    ///
    /// Hooks run last-registered first.
    pub fn at_exit<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.exit_hooks.push(Box::new(hook));
    }

    pub(crate) fn table(&self) -> &TrapTable {
        &self.table
    }

    /// Take every registered exit hook, newest first
    pub(crate) fn take_exit_hooks(&self) -> Vec<ExitHook> {
        let mut hooks = Vec::with_capacity(self.exit_hooks.len());
        while let Some(hook) = self.exit_hooks.pop() {
            hooks.push(hook);
        }
        hooks.reverse();
        hooks
    }
}

/// Set up the process-global runtime.
///
/// The first call decides the configuration; later calls return the existing
/// runtime unchanged. A host-attached runtime starts catching every untrapped
/// signal whose default behavior is `Raise`, unless the process inherited it
/// as ignored.
pub fn init_global(config: RuntimeConfig) -> Result<&'static SignalRuntime, TrapError> {
    if let Ok(runtime) = GLOBAL.try_get() {
        return Ok(runtime);
    }

    let runtime = SignalRuntime::build(&config, config.attach_mode())?;
    let won = GLOBAL.try_init_once(move || runtime).is_ok();
    let runtime = GLOBAL.get().ok_or_else(|| {
        TrapError::Io(io::Error::new(
            io::ErrorKind::Other,
            "global signal runtime unavailable",
        ))
    })?;

    if !won {
        log::debug!("global signal runtime initialized concurrently");
        return Ok(runtime);
    }
    // Only once the receiver can find the runtime
    if runtime.attach == Attach::Host {
        runtime.table.adopt_defaults()?;
    }
    log::info!("global signal runtime ready ({:?})", runtime.attach);
    Ok(runtime)
}

/// The global runtime, if it exists. Never blocks; safe in signal context.
#[inline]
pub fn try_global() -> Option<&'static SignalRuntime> {
    GLOBAL.try_get().ok()
}

/// The global runtime, created with the default configuration on first use
pub fn runtime() -> Result<&'static SignalRuntime, TrapError> {
    match try_global() {
        Some(runtime) => Ok(runtime),
        None => init_global(RuntimeConfig::default()),
    }
}
