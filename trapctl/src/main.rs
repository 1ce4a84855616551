use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sigtrap::{ExitRequest, RuntimeConfig, SignalRuntime, TrapHandler};

/// Install traps, signal this process and exit through the trap machinery.
#[derive(Parser)]
#[command(name = "trapctl")]
struct Args {
    /// Install a trap. ACTION is a trap token (IGNORE, DEFAULT, EXIT, ...),
    /// `print` (print "trapped NAME"), `name` (print NAME and exit 0) or
    /// `fail:MSG` (the handler fails with MSG).
    #[arg(long = "trap", value_name = "SIG=ACTION", value_parser = parse_trap)]
    traps: Vec<TrapArg>,
    /// Send a signal to this process after the traps are installed
    #[arg(long = "kill", value_name = "SIG")]
    kills: Vec<String>,
    /// Dispatch signals for this long before exiting
    #[arg(long = "sleep-ms", value_name = "N", default_value_t = 0)]
    sleep_ms: u64,
    /// Print MSG on orderly exit
    #[arg(long = "at-exit", value_name = "MSG")]
    at_exit: Vec<String>,
    /// Print every signal name with its number and exit
    #[arg(long)]
    list: bool,
}

#[derive(Debug, Clone)]
struct TrapArg {
    signal: String,
    action: String,
}

fn parse_trap(arg: &str) -> Result<TrapArg, String> {
    match arg.split_once('=') {
        Some((signal, action)) if !signal.is_empty() => Ok(TrapArg {
            signal: signal.to_owned(),
            action: action.to_owned(),
        }),
        _ => Err(format!("expected SIG=ACTION, got '{}'", arg)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    sigtrap::logger::init_from_env();

    if args.list {
        for (name, number) in sigtrap::list_signals() {
            println!("{} {}", name, number);
        }
        return Ok(());
    }

    let rt = sigtrap::init_global(RuntimeConfig::new()).context("signal runtime")?;
    for arg in &args.traps {
        install(rt, arg).with_context(|| format!("--trap {}={}", arg.signal, arg.action))?;
    }
    for msg in args.at_exit.iter().cloned() {
        rt.at_exit(move || println!("{}", msg));
    }
    for sig in &args.kills {
        sigtrap::raise(sig.as_str()).with_context(|| format!("--kill {}", sig))?;
    }

    let outcome = if args.sleep_ms > 0 {
        rt.sleep(Duration::from_millis(args.sleep_ms)).map(|_| ())
    } else {
        Ok(())
    };
    sigtrap::terminate(outcome)
}

fn install(rt: &SignalRuntime, arg: &TrapArg) -> Result<()> {
    let signal = arg.signal.as_str();
    match arg.action.as_str() {
        "print" => rt.trap(
            signal,
            TrapHandler::new(|signo| {
                println!("trapped {}", label(signo));
                Ok(())
            }),
        )?,
        "name" => rt.trap(
            signal,
            TrapHandler::new(|signo| {
                println!("{}", label(signo));
                Err(ExitRequest::code(0).into())
            }),
        )?,
        action => match action.strip_prefix("fail:") {
            Some(msg) => {
                let msg = msg.to_owned();
                rt.trap(signal, TrapHandler::new(move |_| Err(msg.clone().into())))?
            }
            None => rt.trap(signal, action)?,
        },
    };
    log::debug!("installed {}={}", arg.signal, arg.action);
    Ok(())
}

fn label(signo: i32) -> String {
    match sigtrap::signal_name(signo) {
        Some(name) => name.to_owned(),
        None if signo == 0 => "EXIT".to_owned(),
        None => signo.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trap() {
        let arg = parse_trap("INT=fail:a=b").unwrap();
        assert_eq!(arg.signal, "INT");
        assert_eq!(arg.action, "fail:a=b");
        assert_eq!(parse_trap("HUP=").unwrap().action, "");
        assert!(parse_trap("INT").is_err());
        assert!(parse_trap("=EXIT").is_err());
    }

    #[test]
    fn test_label() {
        assert_eq!(label(libc::SIGINT), "INT");
        assert_eq!(label(0), "EXIT");
    }
}
