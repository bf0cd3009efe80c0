//! Metrics module - control loop latency tracking and statistics

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// LOOP METRICS - Thread-safe latency tracking
// ============================================================================

#[derive(Clone)]
pub struct LoopMetrics {
    update_hist: Arc<Mutex<Histogram<u64>>>,
    e2e_hist: Arc<Mutex<Histogram<u64>>>,
    // Jitter tracking (variation between consecutive cycle times)
    last_cycle_time_ns: Arc<AtomicU64>,
    jitter_hist: Arc<Mutex<Histogram<u64>>>,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self {
            update_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
            e2e_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
            last_cycle_time_ns: Arc::new(AtomicU64::new(0)),
            jitter_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
        }
    }

    /// Records the time one PID update computation took.
    pub fn record_update(&self, duration: Duration) {
        self.update_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Records how old a measurement was when its command went out.
    pub fn record_e2e(&self, duration: Duration) {
        self.e2e_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Records jitter between consecutive cycle durations.
    pub fn record_cycle_jitter(&self, cycle_duration_ns: u64) {
        let last = self.last_cycle_time_ns.swap(cycle_duration_ns, Ordering::Relaxed);
        if last > 0 {
            let jitter = cycle_duration_ns.abs_diff(last);
            self.jitter_hist.lock().record(jitter).ok();
        }
    }

    pub fn report(&self) -> MetricsReport {
        let update = self.update_hist.lock();
        let e2e = self.e2e_hist.lock();
        let jitter = self.jitter_hist.lock();

        MetricsReport {
            update_p50: Duration::from_nanos(update.value_at_quantile(0.5)),
            update_p99: Duration::from_nanos(update.value_at_quantile(0.99)),
            e2e_p50: Duration::from_nanos(e2e.value_at_quantile(0.5)),
            e2e_p99: Duration::from_nanos(e2e.value_at_quantile(0.99)),
            jitter_p50: Duration::from_nanos(jitter.value_at_quantile(0.5)),
            jitter_p99: Duration::from_nanos(jitter.value_at_quantile(0.99)),
        }
    }
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// METRICS REPORT - Summary statistics
// ============================================================================

#[derive(Debug)]
pub struct MetricsReport {
    pub update_p50: Duration,
    pub update_p99: Duration,
    pub e2e_p50: Duration,
    pub e2e_p99: Duration,
    pub jitter_p50: Duration,
    pub jitter_p99: Duration,
}
