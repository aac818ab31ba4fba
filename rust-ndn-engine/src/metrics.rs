//! Engine metrics: packet and table counters.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate engine metrics
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct EngineMetrics {
    // Consumer side
    pub interests_sent: Counter,
    pub interests_satisfied: Counter,
    pub interests_timed_out: Counter,
    pub interests_nacked: Counter,
    pub interests_cancelled: Counter,
    pub pending_interests: Gauge,

    // Producer side
    pub interests_received: Counter,
    pub interests_dropped: Counter,
    pub data_sent: Counter,
    pub data_received: Counter,

    // Transport
    pub bytes_sent: Counter,
    pub bytes_received: Counter,
    pub decode_errors: Counter,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
