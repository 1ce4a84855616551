//! Traps driven by real OS signals sent to this process
//!
//! Signal dispositions are process-wide, so every test takes `SERIAL` first
//! and puts back whatever it changed before returning.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use sigtrap::{
    Action, DispatchError, RuntimeConfig, SignalRuntime, TrapError, TrapHandler,
};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn global() -> Result<&'static SignalRuntime> {
    sigtrap::init_global(RuntimeConfig::new()).context("global runtime")
}

/// Sleep in short slices until `done` holds or the attempts run out
fn wait_for(rt: &SignalRuntime, done: impl Fn() -> bool) -> Result<(), DispatchError> {
    for _ in 0..100 {
        if done() {
            return Ok(());
        }
        rt.sleep(Duration::from_millis(10))?;
    }
    Ok(())
}

#[test]
fn handler_sets_flag() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let flag = Arc::new(AtomicI32::new(0));

    let f = flag.clone();
    let old = rt.trap(
        "INT",
        TrapHandler::new(move |_| {
            f.store(2, Ordering::SeqCst);
            Ok(())
        }),
    )?;

    sigtrap::raise("INT")?;
    wait_for(rt, || flag.load(Ordering::SeqCst) == 2)?;
    rt.trap("INT", old)?;

    ensure!(flag.load(Ordering::SeqCst) == 2, "handler did not run");
    Ok(())
}

#[test]
fn handler_error_propagates() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let old = rt.trap("INT", TrapHandler::new(|_| Err("Interrupt".into())))?;

    sigtrap::raise("INT")?;
    let outcome = rt.sleep(Duration::from_secs(2));
    rt.trap("INT", old)?;

    let err = outcome.err().context("handler error was lost")?;
    assert_eq!(err.signal().map(|s| s.as_i32()), Some(libc::SIGINT));
    let source = err.into_handler_error().context("not a handler error")?;
    assert_eq!(source.to_string(), "Interrupt");
    Ok(())
}

#[test]
fn default_raises_signal_exception() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let old = rt.trap("USR1", "DEFAULT")?;

    sigtrap::raise("USR1")?;
    let outcome = rt.sleep(Duration::from_secs(2));
    rt.trap("USR1", old)?;

    match outcome {
        Err(DispatchError::Signal(e)) => {
            assert_eq!(e.signo(), libc::SIGUSR1);
            assert_eq!(e.signm(), "SIGUSR1");
        }
        other => panic!("expected a signal exception, got {:?}", other),
    }
    Ok(())
}

#[test]
fn untrapped_signal_raises_signal_exception() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    assert_eq!(rt.lookup("HUP")?, Action::Unset);

    sigtrap::raise("HUP")?;
    match rt.sleep(Duration::from_secs(2)) {
        Err(DispatchError::Signal(e)) => assert_eq!(e.signo(), libc::SIGHUP),
        other => panic!("expected a signal exception, got {:?}", other),
    }
    Ok(())
}

#[test]
fn repeated_delivery_coalesces() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let calls = Arc::new(AtomicUsize::new(0));

    let c = calls.clone();
    let old = rt.trap(
        "USR2",
        TrapHandler::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )?;

    let before = rt.stats();
    for _ in 0..10 {
        sigtrap::raise("USR2")?;
    }
    wait_for(rt, || rt.stats().delivered - before.delivered >= 10)?;
    rt.checkpoint()?;
    rt.trap("USR2", old)?;

    let calls = calls.load(Ordering::SeqCst);
    let delivered = rt.stats().delivered - before.delivered;
    ensure!(calls >= 1, "handler never ran");
    ensure!(calls as u64 <= delivered, "{} calls for {} deliveries", calls, delivered);
    Ok(())
}

#[test]
fn retrap_before_drain_runs_new_action() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let f = first.clone();
    let old = rt.trap(
        "HUP",
        TrapHandler::new(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )?;
    sigtrap::raise("HUP")?;

    // Wait for the receiver without running a checkpoint
    for _ in 0..100 {
        if rt.has_pending() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let s = second.clone();
    rt.trap(
        "HUP",
        TrapHandler::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )?;
    rt.checkpoint()?;
    rt.trap("HUP", old)?;

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn ignored_signal_never_arrives() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let old = rt.trap("USR2", "SIG_IGN")?;

    let before = rt.stats().delivered;
    sigtrap::raise("USR2")?;
    rt.sleep(Duration::from_millis(50))?;
    rt.trap("USR2", old)?;

    assert_eq!(rt.stats().delivered, before);
    Ok(())
}

#[test]
fn trap_returns_previous_action() -> Result<()> {
    let _serial = serial();
    let rt = global()?;
    let handler = TrapHandler::new(|_| Ok(()));

    let original = rt.trap("TERM", handler.clone())?;
    let replaced = rt.trap("TERM", "IGNORE")?;
    assert_eq!(replaced, Action::Handler(handler.clone()));
    assert_eq!(rt.trap("TERM", replaced)?, Action::Ignore);
    assert_eq!(rt.trap("TERM", original.clone())?, Action::Handler(handler));
    assert_eq!(rt.lookup("TERM")?, original);
    Ok(())
}

#[test]
fn reserved_and_invalid_signals_rejected() {
    let _serial = serial();
    for name in ["SEGV", "BUS", "ILL", "FPE", "VTALRM"] {
        let err = sigtrap::trap(name, TrapHandler::new(|_| Ok(()))).unwrap_err();
        assert!(matches!(err, TrapError::ReservedSignal(_)), "{}: {}", name, err);
    }
    assert!(matches!(
        sigtrap::trap("XXXXXXXXXX", "IGNORE"),
        Err(TrapError::InvalidSignalName(_))
    ));
    assert!(matches!(
        sigtrap::trap(-1, "IGNORE"),
        Err(TrapError::InvalidSignalNumber(-1))
    ));
    assert!(matches!(
        sigtrap::kill(std::process::id() as libc::pid_t, "XXXXXXXXXX"),
        Err(TrapError::InvalidSignalName(_))
    ));
}
