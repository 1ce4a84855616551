//! Deferred signal dispatch
//!
//! Signals recorded by the receiver are dispatched here, at checkpoints, in
//! normal execution context. A drain cycle takes the whole pending set at
//! once and then resolves each signal's action, lowest number first. Signals
//! that arrive while a cycle runs wait for the next one, so a single
//! checkpoint does bounded work even under a signal storm.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::exception::SignalException;
use super::pending::{PendingSet, SigSet};
use super::table::TrapTable;
use super::types::*;
use crate::error::{DispatchError, ExitRequest};

/// Counters describing what the dispatcher has seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Deliveries recorded, including ones that coalesced
    pub delivered: u64,
    /// Actions resolved and run
    pub dispatched: u64,
    /// Drain cycles that found at least one pending signal
    pub cycles: u64,
}

/// Pending set plus the single-drainer lock
pub struct Dispatcher {
    pending: PendingSet,
    drain_lock: Mutex<()>,
    delivered: AtomicU64,
    dispatched: AtomicU64,
    cycles: AtomicU64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub const fn new() -> Self {
        Dispatcher {
            pending: PendingSet::new(),
            drain_lock: Mutex::new(()),
            delivered: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
        }
    }

    /// Record one delivery of `sig`.
    ///
    /// Returns true if the signal was not pending before. Async-signal-safe.
    #[inline]
    pub fn record(&self, sig: SigNum) -> bool {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.pending.raise(sig)
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> SigSet {
        self.pending.snapshot()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }

    /// Run one drain cycle against `table`.
    ///
    /// Returns the number of signals dispatched. If another drain is already
    /// running (another thread, or a handler that reached a checkpoint) this
    /// returns `Ok(0)` without touching the pending set.
    pub fn drain_pending(&self, table: &TrapTable) -> Result<usize, DispatchError> {
        self.try_drain(table).unwrap_or(Ok(0))
    }

    /// Like [`drain_pending`](Self::drain_pending), but `None` when another
    /// drain holds the lock.
    ///
    /// The lock is released by the time this returns. Signals that arrived
    /// during the cycle found their bit already set and woke nobody, so a
    /// caller that got `Some` must check [`has_pending`](Self::has_pending)
    /// and wake any waiter itself.
    pub fn try_drain(&self, table: &TrapTable) -> Option<Result<usize, DispatchError>> {
        let guard = self.drain_lock.try_lock()?;
        let result = self.drain_locked(table);
        drop(guard);
        Some(result)
    }

    fn drain_locked(&self, table: &TrapTable) -> Result<usize, DispatchError> {
        // Take the bits before running anything so a handler can see its own
        // signal again at the next checkpoint
        let mut work = self.pending.take_all();
        if work.is_empty() {
            return Ok(0);
        }
        self.cycles.fetch_add(1, Ordering::Relaxed);

        let mut count = 0;
        while let Some(sig) = work.pop_lowest() {
            let action = table.lookup(TrapTarget::Signal(sig));
            log::debug!("Dispatching {} ({:?})", sig, action);
            self.dispatched.fetch_add(1, Ordering::Relaxed);
            count += 1;

            if let Err(e) = dispatch_action(table, sig, &action) {
                if !work.is_empty() {
                    log::debug!("Requeueing {} signals after failed dispatch", work.count());
                    self.pending.restore(work);
                }
                return Err(e);
            }
        }
        Ok(count)
    }
}

/// Run the action resolved for a pending signal
fn dispatch_action(table: &TrapTable, sig: SigNum, action: &Action) -> Result<(), DispatchError> {
    match action {
        Action::Handler(handler) => {
            handler
                .call(sig.as_i32())
                .map_err(|source| match source.downcast::<ExitRequest>() {
                    Ok(req) => {
                        log::info!("Handler for {} requested {}", sig, req);
                        DispatchError::Exit(*req)
                    }
                    Err(source) => {
                        log::debug!("Handler for {} failed: {}", sig, source);
                        DispatchError::Handler { signal: sig, source }
                    }
                })
        }
        Action::Ignore => {
            log::debug!("Signal {} ignored", sig);
            Ok(())
        }
        Action::Exit => {
            log::info!("Signal {} requested exit", sig);
            Err(DispatchError::Exit(ExitRequest::code(0)))
        }
        Action::Default | Action::Unset => deliver_default_action(sig, table.default_behavior(sig)),
    }
}

/// Apply the default behavior of a signal
fn deliver_default_action(sig: SigNum, behavior: DefaultBehavior) -> Result<(), DispatchError> {
    match behavior {
        DefaultBehavior::Raise => Err(DispatchError::Signal(SignalException::from_identity(sig))),
        DefaultBehavior::Ignore => Ok(()),
        DefaultBehavior::System => match default_action(sig) {
            SignalDefaultAction::Terminate | SignalDefaultAction::CoreDump => {
                log::info!("Signal {} terminates the process", sig);
                Err(DispatchError::Exit(ExitRequest::signaled(sig)))
            }
            SignalDefaultAction::Ignore
            | SignalDefaultAction::Stop
            | SignalDefaultAction::Continue => {
                log::debug!("Signal {} has no in-process default effect", sig);
                Ok(())
            }
        },
    }
}
