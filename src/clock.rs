//! Clock module - monotonic time sources for the controller

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source read once per controller update.
pub trait TimeSource {
    fn now(&self) -> Instant;
}

// ============================================================================
// MONOTONIC CLOCK - Production time source
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl TimeSource for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ============================================================================
// MANUAL CLOCK - Hand-advanced time source for deterministic tests
// ============================================================================

/// Cloneable clock whose time only moves when [`ManualClock::advance`] is
/// called. One clone goes into the controller, the other stays with the test.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
