//! Pending signal bitmap shared by the receiver and the dispatcher
//!
//! Bit `n - 1` stands for signal `n`. The receiver only ever sets bits and
//! the dispatcher only ever takes them, both with single atomic operations,
//! so the set can be touched from signal context.

use core::sync::atomic::{AtomicU64, Ordering};

use super::types::SigNum;

/// A plain bit-set of signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigSet {
    bits: u64,
}

impl SigSet {
    pub const fn new_empty() -> Self {
        SigSet { bits: 0 }
    }

    pub const fn from_bits(bits: u64) -> Self {
        SigSet { bits }
    }

    pub const fn as_u64(&self) -> u64 {
        self.bits
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn contains(&self, sig: SigNum) -> bool {
        self.bits & sig.mask() != 0
    }

    pub fn add_signal(&mut self, sig: SigNum) {
        self.bits |= sig.mask();
    }

    pub fn remove_signal(&mut self, sig: SigNum) {
        self.bits &= !sig.mask();
    }

    /// Remove and return the lowest-numbered signal
    pub fn pop_lowest(&mut self) -> Option<SigNum> {
        if self.bits == 0 {
            return None;
        }
        let bit = self.bits.trailing_zeros();
        self.bits &= !(1u64 << bit);
        Some(SigNum::from_bit(bit))
    }
}

impl From<SigNum> for SigSet {
    fn from(sig: SigNum) -> Self {
        SigSet { bits: sig.mask() }
    }
}

impl Iterator for SigSet {
    type Item = SigNum;

    fn next(&mut self) -> Option<SigNum> {
        self.pop_lowest()
    }
}

/// Signals delivered since the last drain
pub struct PendingSet(AtomicU64);

impl Default for PendingSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingSet {
    pub const fn new() -> Self {
        PendingSet(AtomicU64::new(0))
    }

    /// Mark a signal as pending.
    ///
    /// Returns true if the signal was not already pending. Safe to call from
    /// signal context.
    #[inline]
    pub fn raise(&self, sig: SigNum) -> bool {
        let mask = sig.mask();
        self.0.fetch_or(mask, Ordering::AcqRel) & mask == 0
    }

    /// Take every pending signal, leaving the set empty
    #[inline]
    pub fn take_all(&self) -> SigSet {
        SigSet::from_bits(self.0.swap(0, Ordering::AcqRel))
    }

    /// Put signals back, e.g. those a failed drain did not get to
    pub fn restore(&self, set: SigSet) {
        if !set.is_empty() {
            self.0.fetch_or(set.as_u64(), Ordering::AcqRel);
        }
    }

    pub fn snapshot(&self) -> SigSet {
        SigSet::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_pending(&self, sig: SigNum) -> bool {
        self.snapshot().contains(sig)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::constants::{MAX_SIGNAL, SIGHUP, SIGINT, SIGTERM};

    fn sig(n: i32) -> SigNum {
        SigNum::try_from(n).unwrap()
    }

    #[test]
    fn test_raise_coalesces() {
        let pending = PendingSet::new();
        assert!(pending.raise(sig(SIGINT)));
        assert!(!pending.raise(sig(SIGINT)));
        assert!(!pending.raise(sig(SIGINT)));
        let taken = pending.take_all();
        assert_eq!(taken.count(), 1);
        assert!(taken.contains(sig(SIGINT)));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pop_lowest_order() {
        let mut set = SigSet::new_empty();
        set.add_signal(sig(SIGTERM));
        set.add_signal(sig(SIGHUP));
        set.add_signal(sig(MAX_SIGNAL));
        let order: Vec<i32> = set.map(SigNum::as_i32).collect();
        assert_eq!(order, vec![SIGHUP, SIGTERM, MAX_SIGNAL]);
    }

    #[test]
    fn test_restore_merges() {
        let pending = PendingSet::new();
        pending.raise(sig(SIGINT));
        let mut rest = SigSet::new_empty();
        rest.add_signal(sig(SIGHUP));
        pending.restore(rest);
        assert!(pending.is_pending(sig(SIGINT)));
        assert!(pending.is_pending(sig(SIGHUP)));
        assert!(!pending.is_pending(sig(SIGTERM)));
    }
}
