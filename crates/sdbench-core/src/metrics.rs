//! Global atomic counters for SDBench observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a benchmark run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Process-wide run counters.
pub struct Metrics {
    encounters_run: AtomicU64,
    encounters_crashed: AtomicU64,
    turns_dispatched: AtomicU64,
    call_retries: AtomicU64,
    call_failures: AtomicU64,
    call_panics: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            encounters_run: AtomicU64::new(0),
            encounters_crashed: AtomicU64::new(0),
            turns_dispatched: AtomicU64::new(0),
            call_retries: AtomicU64::new(0),
            call_failures: AtomicU64::new(0),
            call_panics: AtomicU64::new(0),
        }
    }

    pub fn inc_encounters(&self) {
        self.encounters_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "encounters_run", "counter incremented");
    }

    pub fn inc_crashes(&self) {
        self.encounters_crashed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "encounters_crashed", "counter incremented");
    }

    pub fn inc_turns(&self) {
        self.turns_dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "turns_dispatched", "counter incremented");
    }

    pub fn inc_call_retries(&self) {
        self.call_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "call_retries", "counter incremented");
    }

    pub fn inc_call_failures(&self) {
        self.call_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "call_failures", "counter incremented");
    }

    pub fn inc_call_panics(&self) {
        self.call_panics.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "call_panics", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            encounters_run = self.encounters_run(),
            encounters_crashed = self.encounters_crashed(),
            turns_dispatched = self.turns_dispatched(),
            call_retries = self.call_retries(),
            call_failures = self.call_failures(),
            call_panics = self.call_panics(),
        );
    }

    pub fn encounters_run(&self) -> u64 {
        self.encounters_run.load(Ordering::Relaxed)
    }

    pub fn encounters_crashed(&self) -> u64 {
        self.encounters_crashed.load(Ordering::Relaxed)
    }

    pub fn turns_dispatched(&self) -> u64 {
        self.turns_dispatched.load(Ordering::Relaxed)
    }

    pub fn call_retries(&self) -> u64 {
        self.call_retries.load(Ordering::Relaxed)
    }

    pub fn call_failures(&self) -> u64 {
        self.call_failures.load(Ordering::Relaxed)
    }

    pub fn call_panics(&self) -> u64 {
        self.call_panics.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.encounters_run.store(0, Ordering::Relaxed);
        self.encounters_crashed.store(0, Ordering::Relaxed);
        self.turns_dispatched.store(0, Ordering::Relaxed);
        self.call_retries.store(0, Ordering::Relaxed);
        self.call_failures.store(0, Ordering::Relaxed);
        self.call_panics.store(0, Ordering::Relaxed);
    }
}
