//! Trap table: the registered action of every trappable signal
//!
//! Writers (`install`) serialize on one lock and keep the OS disposition in
//! step with the stored action. Readers take a clone of the action and drop
//! the lock before anything runs it.

use core::mem;

use spin::RwLock;

use super::constants::NSIG;
use super::receiver::Disposition;
use super::types::{default_behavior, Action, DefaultBehavior, SigNum, TrapSpec, TrapTarget};
use crate::error::TrapError;

pub struct TrapTable {
    // Indexed by signal number; slot 0 holds the EXIT trap
    actions: RwLock<Vec<Action>>,
    // Per-signal overrides of the built-in default behavior
    defaults: Vec<Option<DefaultBehavior>>,
    disposition: Box<dyn Disposition>,
}

impl TrapTable {
    pub fn new(disposition: Box<dyn Disposition>) -> Self {
        TrapTable {
            actions: RwLock::new(vec![Action::Unset; NSIG as usize]),
            defaults: vec![None; NSIG as usize],
            disposition,
        }
    }

    /// Override what `Default` does for one signal
    pub fn set_default_behavior(&mut self, sig: SigNum, behavior: DefaultBehavior) {
        self.defaults[sig.as_u8() as usize] = Some(behavior);
    }

    /// The behavior `Default` (and `Unset`) resolve to for a signal
    pub fn default_behavior(&self, sig: SigNum) -> DefaultBehavior {
        self.defaults[sig.as_u8() as usize].unwrap_or_else(|| default_behavior(sig))
    }

    /// Install a new action and return the one it replaces.
    ///
    /// Fails without touching the table if the signal is reserved, the request
    /// does not validate, or the OS refuses the new disposition.
    pub fn install(&self, target: TrapTarget, spec: TrapSpec<'_>) -> Result<Action, TrapError> {
        if let TrapTarget::Signal(sig) = target {
            if sig.is_reserved() {
                log::warn!("trap: refusing reserved signal {}", sig);
                return Err(TrapError::ReservedSignal(sig));
            }
        }

        let action = spec.into_action(target).map_err(|e| {
            log::warn!("trap: rejected action for {}: {}", target, e);
            e
        })?;

        let mut actions = self.actions.write();
        if let TrapTarget::Signal(sig) = target {
            self.apply_disposition(sig, &action)?;
        }

        let idx = target.signo() as usize;
        log::debug!("trap: {} -> {:?}", target, action);
        Ok(mem::replace(&mut actions[idx], action))
    }

    /// Current action for a target
    pub fn lookup(&self, target: TrapTarget) -> Action {
        self.actions.read()[target.signo() as usize].clone()
    }

    /// Apply the `Unset` disposition to every untrapped signal whose default
    /// behavior is `Raise`, so it surfaces as a `SignalException` instead of
    /// killing the process outright.
    pub fn adopt_defaults(&self) -> Result<(), TrapError> {
        let actions = self.actions.write();
        for signo in 1..NSIG as i32 {
            let Some(sig) = SigNum::checked(signo) else {
                continue;
            };
            if sig.is_reserved() || actions[signo as usize] != Action::Unset {
                continue;
            }
            if self.default_behavior(sig) == DefaultBehavior::Raise {
                self.disposition.adopt(sig)?;
            }
        }
        Ok(())
    }

    fn apply_disposition(&self, sig: SigNum, action: &Action) -> Result<(), TrapError> {
        match action {
            Action::Handler(_) | Action::Exit => self.disposition.catch(sig),
            Action::Ignore => self.disposition.ignore(sig),
            Action::Default => match self.default_behavior(sig) {
                DefaultBehavior::Raise => self.disposition.catch(sig),
                DefaultBehavior::Ignore => self.disposition.ignore(sig),
                DefaultBehavior::System => self.disposition.system_default(sig),
            },
            Action::Unset => match self.default_behavior(sig) {
                DefaultBehavior::Raise => self.disposition.adopt(sig),
                DefaultBehavior::Ignore | DefaultBehavior::System => self.disposition.release(sig),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::constants::*;
    use crate::signal::receiver::Detached;
    use crate::signal::types::TrapHandler;
    use spin::Mutex;
    use std::sync::Arc;

    fn target(name: &str) -> TrapTarget {
        TrapTarget::Signal(SigNum::from_name(name).unwrap())
    }

    /// Records every disposition change instead of calling the OS
    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<(&'static str, i32)>>>);

    impl Disposition for Recorder {
        fn catch(&self, sig: SigNum) -> Result<(), TrapError> {
            self.0.lock().push(("catch", sig.as_i32()));
            Ok(())
        }

        fn ignore(&self, sig: SigNum) -> Result<(), TrapError> {
            self.0.lock().push(("ignore", sig.as_i32()));
            Ok(())
        }

        fn system_default(&self, sig: SigNum) -> Result<(), TrapError> {
            self.0.lock().push(("default", sig.as_i32()));
            Ok(())
        }

        fn release(&self, sig: SigNum) -> Result<(), TrapError> {
            self.0.lock().push(("release", sig.as_i32()));
            Ok(())
        }

        fn adopt(&self, sig: SigNum) -> Result<(), TrapError> {
            self.0.lock().push(("adopt", sig.as_i32()));
            Ok(())
        }
    }

    /// Refuses every change
    struct Refuser;

    impl Disposition for Refuser {
        fn catch(&self, sig: SigNum) -> Result<(), TrapError> {
            Err(TrapError::Os {
                signal: sig,
                source: std::io::Error::from_raw_os_error(libc::EINVAL),
            })
        }

        fn ignore(&self, sig: SigNum) -> Result<(), TrapError> {
            self.catch(sig)
        }

        fn system_default(&self, sig: SigNum) -> Result<(), TrapError> {
            self.catch(sig)
        }

        fn release(&self, sig: SigNum) -> Result<(), TrapError> {
            self.catch(sig)
        }
    }

    #[test]
    fn test_install_returns_previous() {
        let table = TrapTable::new(Box::new(Detached));
        let handler = TrapHandler::new(|_| Ok(()));

        let prev = table.install(target("INT"), TrapSpec::from(handler.clone())).unwrap();
        assert_eq!(prev, Action::Unset);

        let prev = table.install(target("INT"), TrapSpec::from("IGNORE")).unwrap();
        assert_eq!(prev, Action::Handler(handler.clone()));

        // Round trip: restoring the returned action restores the entry
        let prev = table.install(target("INT"), TrapSpec::from(prev)).unwrap();
        assert_eq!(prev, Action::Ignore);
        assert_eq!(table.lookup(target("INT")), Action::Handler(handler));
    }

    #[test]
    fn test_reserved_signals_rejected_for_any_action() {
        let table = TrapTable::new(Box::new(Detached));
        for name in ["SEGV", "BUS", "ILL", "FPE", "VTALRM", "KILL", "STOP"] {
            for spec in [
                TrapSpec::from(TrapHandler::new(|_| Ok(()))),
                TrapSpec::from("IGNORE"),
                TrapSpec::from("DEFAULT"),
                TrapSpec::Nil,
            ] {
                assert!(matches!(
                    table.install(target(name), spec),
                    Err(TrapError::ReservedSignal(_))
                ));
            }
            assert_eq!(table.lookup(target(name)), Action::Unset);
        }
    }

    #[test]
    fn test_invalid_token_leaves_entry() {
        let table = TrapTable::new(Box::new(Detached));
        table.install(target("HUP"), TrapSpec::from("EXIT")).unwrap();
        assert!(matches!(
            table.install(target("HUP"), TrapSpec::from("xxxxxx")),
            Err(TrapError::InvalidActionToken(_))
        ));
        assert_eq!(table.lookup(target("HUP")), Action::Exit);
    }

    #[test]
    fn test_dispositions_follow_actions() {
        let recorder = Recorder::default();
        let log = recorder.0.clone();
        let table = TrapTable::new(Box::new(recorder));

        table.install(target("INT"), TrapSpec::from(TrapHandler::new(|_| Ok(())))).unwrap();
        table.install(target("INT"), TrapSpec::from("SIG_IGN")).unwrap();
        table.install(target("INT"), TrapSpec::from("DEFAULT")).unwrap();
        table.install(target("CHLD"), TrapSpec::from("SYSTEM_DEFAULT")).unwrap();
        table.install(target("PIPE"), TrapSpec::from("DEFAULT")).unwrap();
        table.install(target("INT"), TrapSpec::Restore(Action::Unset)).unwrap();
        table.install(target("CHLD"), TrapSpec::Restore(Action::Unset)).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                ("catch", SIGINT),
                ("ignore", SIGINT),
                ("catch", SIGINT),
                ("default", SIGCHLD),
                ("ignore", SIGPIPE),
                ("adopt", SIGINT),
                ("release", SIGCHLD),
            ]
        );
    }

    #[test]
    fn test_adopt_defaults_covers_untrapped_raise_signals() {
        let recorder = Recorder::default();
        let log = recorder.0.clone();
        let table = TrapTable::new(Box::new(recorder));
        table.install(target("INT"), TrapSpec::from("IGNORE")).unwrap();
        log.lock().clear();

        table.adopt_defaults().unwrap();

        let mut adopted: Vec<i32> = log
            .lock()
            .iter()
            .map(|&(op, sig)| {
                assert_eq!(op, "adopt");
                sig
            })
            .collect();
        adopted.sort_unstable();
        let mut expected = vec![SIGHUP, SIGQUIT, SIGALRM, SIGTERM, SIGUSR1, SIGUSR2];
        expected.sort_unstable();
        assert_eq!(adopted, expected);
        assert_eq!(table.lookup(target("HUP")), Action::Unset);
    }

    #[test]
    fn test_exit_target_never_touches_os() {
        let recorder = Recorder::default();
        let log = recorder.0.clone();
        let table = TrapTable::new(Box::new(recorder));
        let handler = TrapHandler::new(|_| Ok(()));

        let prev = table.install(TrapTarget::Exit, TrapSpec::from(handler.clone())).unwrap();
        assert_eq!(prev, Action::Unset);
        assert_eq!(table.lookup(TrapTarget::Exit), Action::Handler(handler));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_os_failure_keeps_table() {
        let table = TrapTable::new(Box::new(Refuser));
        assert!(matches!(
            table.install(target("USR1"), TrapSpec::from("IGNORE")),
            Err(TrapError::Os { .. })
        ));
        assert_eq!(table.lookup(target("USR1")), Action::Unset);
    }

    #[test]
    fn test_default_behavior_override() {
        let recorder = Recorder::default();
        let log = recorder.0.clone();
        let mut table = TrapTable::new(Box::new(recorder));
        let usr1 = SigNum::from_name("USR1").unwrap();
        assert_eq!(table.default_behavior(usr1), DefaultBehavior::Raise);

        table.set_default_behavior(usr1, DefaultBehavior::System);
        assert_eq!(table.default_behavior(usr1), DefaultBehavior::System);
        table.install(TrapTarget::Signal(usr1), TrapSpec::from("DEFAULT")).unwrap();
        assert_eq!(*log.lock(), vec![("default", SIGUSR1)]);
    }
}
