//! Configuration loading for the controller and the demo loop

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub setpoint: f64,
    /// Minimum interval between effective recomputations, in milliseconds.
    pub sample_time_ms: f64,
    /// Staleness window, in milliseconds.
    pub stale_after_ms: f64,
    pub windup_guard: f64,
    /// Plant sampling interval for the demo loop, in milliseconds.
    pub loop_interval_ms: u64,
    /// Per-cycle control computation deadline, in milliseconds.
    pub control_deadline_ms: f64,
    /// Demo run length, in seconds.
    pub run_duration_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kp: 0.2,
            ki: 0.0,
            kd: 0.0,
            setpoint: 0.0,
            sample_time_ms: 0.0,
            stale_after_ms: 1000.0,
            windup_guard: 100.0,
            loop_interval_ms: 10,
            control_deadline_ms: 0.2,
            run_duration_secs: 10,
        }
    }
}

impl RuntimeConfig {
    pub fn sample_time(&self) -> Duration {
        Duration::from_secs_f64(self.sample_time_ms / 1000.0)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs_f64(self.stale_after_ms / 1000.0)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }
}

/// Loads a TOML config file, falling back to defaults if the file is missing
/// or malformed.
pub fn load_config(path: &str) -> RuntimeConfig {
    match std::fs::read_to_string(path) {
        Ok(s) => toml::from_str::<RuntimeConfig>(&s).unwrap_or_default(),
        Err(_) => RuntimeConfig::default(),
    }
}
