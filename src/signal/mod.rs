//! Signal handling infrastructure
//!
//! This module implements deferred signal handling:
//! - Signal constants, names and reserved status
//! - The async-signal-safe receiver and OS dispositions
//! - The trap table mapping each signal to its action
//! - Dispatch of pending signals at checkpoints
//! - Signals surfaced as exceptions
//!
//! Nothing registered here runs at the instant a signal arrives; the receiver
//! only records it, and the dispatcher runs the action at the next
//! checkpoint.

pub mod constants;
pub mod delivery;
pub mod exception;
pub mod pending;
pub mod receiver;
pub mod table;
pub mod types;

pub use types::*;
