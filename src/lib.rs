//! Single-loop PID controller with windup protection, sample-time
//! throttling, staleness detection and structured diagnostics, plus a
//! threaded demo loop driving it against a simulated plant.

pub mod clock;
pub mod config;
pub mod metrics;
pub mod pid;
pub mod plant;
pub mod runner;
pub mod telemetry;

pub use clock::{ManualClock, MonotonicClock, TimeSource};
pub use config::{load_config, RuntimeConfig};
pub use metrics::{LoopMetrics, MetricsReport};
pub use pid::{PIDController, UpdateParams};
pub use plant::SimulatedPlant;
pub use runner::{GainSettings, LoopChannels, LoopStats, SharedGains};
pub use telemetry::{ControlEvent, EventLog, GainParam};
