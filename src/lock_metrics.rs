//! C8: process-wide, lock-free counters for external lock contention
//! (spec.md §4.8).
//!
//! Grounded on the pack-wide atomic-counter idiom (an `AtomicU64` bank with
//! `Ordering::Relaxed` and a snapshot struct) seen across the example pack
//! wherever a process-local metrics sink needs no cross-thread
//! synchronization beyond the atomics themselves. One process-wide
//! instance is exposed via `std::sync::LazyLock`, matching the `once_cell`
//! dependency already in this crate's stack (the standard library's
//! `LazyLock` has since absorbed `once_cell::sync::Lazy`'s job, but the
//! crate is kept in the dependency graph for `metadata`/`config`'s use of
//! it elsewhere in the teacher's original code).

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// The process-wide instance. There is no teardown (spec.md §5).
pub static GLOBAL: LazyLock<LockMetrics> = LazyLock::new(LockMetrics::new);

/// Eight atomic counters tracking external-lock acquisition/contention.
///
/// Relaxed ordering is sufficient for this counter workload; `snapshot`
/// does not promise cross-field atomicity (spec.md §9 Design Notes).
#[derive(Debug, Default)]
pub struct LockMetrics {
    lock_acquisitions: AtomicU64,
    lock_wait_total_ns: AtomicU64,
    lock_hold_total_ns: AtomicU64,
    lock_contentions: AtomicU64,
    max_wait_ns: AtomicU64,
    max_hold_ns: AtomicU64,
    lock_timeouts: AtomicU64,
    stale_locks_broken: AtomicU64,
}

/// A point-in-time read of every counter, plus the derived views
/// `avg_wait_ns` and `contention_rate_pct`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockMetricsSnapshot {
    pub lock_acquisitions: u64,
    pub lock_wait_total_ns: u64,
    pub lock_hold_total_ns: u64,
    pub lock_contentions: u64,
    pub max_wait_ns: u64,
    pub max_hold_ns: u64,
    pub lock_timeouts: u64,
    pub stale_locks_broken: u64,
}

impl LockMetricsSnapshot {
    /// Mean wait time in nanoseconds, or 0 if there have been no
    /// acquisitions.
    #[must_use]
    pub fn avg_wait_ns(&self) -> u64 {
        self.lock_wait_total_ns
            .checked_div(self.lock_acquisitions)
            .unwrap_or(0)
    }

    /// Percentage of acquisitions that observed contention.
    #[must_use]
    pub fn contention_rate_pct(&self) -> f64 {
        if self.lock_acquisitions == 0 {
            return 0.0;
        }
        (self.lock_contentions as f64 / self.lock_acquisitions as f64) * 100.0
    }

    /// A human-readable one-line summary, converting nanoseconds to
    /// milliseconds via floating-point division.
    #[must_use]
    pub fn format_human(&self) -> String {
        format!(
            "acquisitions={} contentions={} ({:.1}%) avg_wait={:.3}ms max_wait={:.3}ms max_hold={:.3}ms timeouts={} stale_broken={}",
            self.lock_acquisitions,
            self.lock_contentions,
            self.contention_rate_pct(),
            self.avg_wait_ns() as f64 / 1_000_000.0,
            self.max_wait_ns as f64 / 1_000_000.0,
            self.max_hold_ns as f64 / 1_000_000.0,
            self.lock_timeouts,
            self.stale_locks_broken,
        )
    }

    /// A `serde_json::Value` view of the snapshot plus its derived fields,
    /// for structured observability sinks.
    #[must_use]
    pub fn to_json_view(&self) -> serde_json::Value {
        serde_json::json!({
            "lock_acquisitions": self.lock_acquisitions,
            "lock_wait_total_ns": self.lock_wait_total_ns,
            "lock_hold_total_ns": self.lock_hold_total_ns,
            "lock_contentions": self.lock_contentions,
            "max_wait_ns": self.max_wait_ns,
            "max_hold_ns": self.max_hold_ns,
            "lock_timeouts": self.lock_timeouts,
            "stale_locks_broken": self.stale_locks_broken,
            "avg_wait_ns": self.avg_wait_ns(),
            "contention_rate_pct": self.contention_rate_pct(),
        })
    }
}

impl LockMetrics {
    #[must_use]
    fn new() -> Self {
        Self::default()
    }

    /// Record the acquisition of an externally-held lock: `wait_ns` is how
    /// long the caller waited, `had_contention` whether another holder was
    /// observed.
    pub fn record_acquisition(&self, wait_ns: u64, had_contention: bool) {
        self.lock_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.lock_wait_total_ns.fetch_add(wait_ns, Ordering::Relaxed);
        if had_contention {
            self.lock_contentions.fetch_add(1, Ordering::Relaxed);
        }
        cas_max(&self.max_wait_ns, wait_ns);
    }

    /// Record the release of a lock held for `hold_ns`.
    pub fn record_release(&self, hold_ns: u64) {
        self.lock_hold_total_ns.fetch_add(hold_ns, Ordering::Relaxed);
        cas_max(&self.max_hold_ns, hold_ns);
    }

    /// Record a lock-acquisition timeout.
    pub fn record_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a stale lock (held by a dead process) was broken.
    pub fn record_stale_lock_broken(&self) {
        self.stale_locks_broken.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent-enough read of every counter for observability. No
    /// cross-field atomicity is promised.
    #[must_use]
    pub fn snapshot(&self) -> LockMetricsSnapshot {
        LockMetricsSnapshot {
            lock_acquisitions: self.lock_acquisitions.load(Ordering::Relaxed),
            lock_wait_total_ns: self.lock_wait_total_ns.load(Ordering::Relaxed),
            lock_hold_total_ns: self.lock_hold_total_ns.load(Ordering::Relaxed),
            lock_contentions: self.lock_contentions.load(Ordering::Relaxed),
            max_wait_ns: self.max_wait_ns.load(Ordering::Relaxed),
            max_hold_ns: self.max_hold_ns.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            stale_locks_broken: self.stale_locks_broken.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.lock_acquisitions.store(0, Ordering::Relaxed);
        self.lock_wait_total_ns.store(0, Ordering::Relaxed);
        self.lock_hold_total_ns.store(0, Ordering::Relaxed);
        self.lock_contentions.store(0, Ordering::Relaxed);
        self.max_wait_ns.store(0, Ordering::Relaxed);
        self.max_hold_ns.store(0, Ordering::Relaxed);
        self.lock_timeouts.store(0, Ordering::Relaxed);
        self.stale_locks_broken.store(0, Ordering::Relaxed);
    }
}

/// CAS-loop a running max with relaxed ordering, retrying on spurious
/// `compare_exchange_weak` failure.
fn cas_max(counter: &AtomicU64, candidate: u64) {
    let mut current = counter.load(Ordering::Relaxed);
    while candidate > current {
        match counter.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}
