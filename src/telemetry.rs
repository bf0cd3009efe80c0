//! Telemetry module - structured diagnostic events and the shared event log

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CONTROL EVENTS - Diagnostic signals emitted by the controller
// ============================================================================

/// Tunable parameter named by a [`ControlEvent::GainChanged`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainParam {
    Kp,
    Ki,
    Kd,
    WindupGuard,
}

impl fmt::Display for GainParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GainParam::Kp => write!(f, "Kp"),
            GainParam::Ki => write!(f, "Ki"),
            GainParam::Kd => write!(f, "Kd"),
            GainParam::WindupGuard => write!(f, "windup guard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// Sample arrived later than the staleness window and was skipped.
    StaleSample { delta_time: f64 },
    /// Integral term hit the positive windup bound.
    WindupPositive,
    /// Integral term hit the negative windup bound.
    WindupNegative,
    /// A tuning setter was invoked at runtime.
    GainChanged { param: GainParam, value: f64 },
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEvent::StaleSample { delta_time } => {
                write!(f, "stale sample skipped (delta {:.3}s)", delta_time)
            }
            ControlEvent::WindupPositive => write!(f, "windup guard saturated (+)"),
            ControlEvent::WindupNegative => write!(f, "windup guard saturated (-)"),
            ControlEvent::GainChanged { param, value } => {
                write!(f, "set {} to {}", param, value)
            }
        }
    }
}

// ============================================================================
// EVENT LOG - Thread-safe bounded event record sink
// ============================================================================

/// Bounded event sink shared between a controller and whoever routes its
/// diagnostics. Oldest entries are dropped once `max_size` is reached.
#[derive(Clone)]
pub struct EventLog {
    entries: Arc<RwLock<VecDeque<ControlEvent>>>,
    max_size: usize,
}

impl EventLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    pub fn push(&self, event: ControlEvent) {
        let mut log = self.entries.write();
        log.push_back(event);
        if log.len() > self.max_size {
            log.pop_front();
        }
    }

    pub fn read_all(&self) -> Vec<ControlEvent> {
        self.entries.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
