//! Registration counters.
//!
//! Lock-free counters recording what the manager did with each request.
//! Because registration is fire-and-forget, these counters are the only way
//! for a host to see how many calls were dispatched, skipped or failed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared between the manager and its result handler.
#[derive(Debug, Default)]
pub struct RegistrationStats {
    registers_dispatched: AtomicU64,
    unregisters_dispatched: AtomicU64,
    skipped: AtomicU64,
    permission_faults: AtomicU64,
    rejected: AtomicU64,
    completed_ok: AtomicU64,
    completed_failed: AtomicU64,
}

impl RegistrationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_dispatched(&self) {
        self.registers_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unregister_dispatched(&self) {
        self.unregisters_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn permission_fault(&self) {
        self.permission_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn completed(&self, success: bool) {
        if success {
            self.completed_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registers_dispatched: self.registers_dispatched.load(Ordering::Relaxed),
            unregisters_dispatched: self.unregisters_dispatched.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            permission_faults: self.permission_faults.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed_ok: self.completed_ok.load(Ordering::Relaxed),
            completed_failed: self.completed_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RegistrationStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub registers_dispatched: u64,
    pub unregisters_dispatched: u64,
    /// Calls skipped because a precondition was not met.
    pub skipped: u64,
    pub permission_faults: u64,
    /// Calls refused synchronously for reasons other than permission.
    pub rejected: u64,
    pub completed_ok: u64,
    pub completed_failed: u64,
}

impl StatsSnapshot {
    /// Calls dispatched to the backend in total.
    pub fn dispatched(&self) -> u64 {
        self.registers_dispatched + self.unregisters_dispatched
    }

    /// Dispatched calls whose completion has not been observed yet.
    ///
    /// Lost calls (never completed by the backend) stay in flight forever.
    pub fn in_flight(&self) -> u64 {
        self.dispatched()
            .saturating_sub(self.completed_ok + self.completed_failed)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "register: {}, unregister: {}, skipped: {}, permission faults: {}, rejected: {}, ok: {}, failed: {}, in flight: {}",
            self.registers_dispatched,
            self.unregisters_dispatched,
            self.skipped,
            self.permission_faults,
            self.rejected,
            self.completed_ok,
            self.completed_failed,
            self.in_flight()
        )
    }
}
