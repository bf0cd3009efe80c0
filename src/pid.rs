//! PID controller module - single-loop control with windup protection,
//! sample-time throttling and staleness detection

use std::time::{Duration, Instant};

use crate::clock::{MonotonicClock, TimeSource};
use crate::config::RuntimeConfig;
use crate::telemetry::{ControlEvent, EventLog, GainParam};

// ============================================================================
// UPDATE PARAMETERS - Per-sample options
// ============================================================================

/// Options for a single [`PIDController::update_with`] call.
#[derive(Debug, Clone, Copy)]
pub struct UpdateParams {
    /// Whether the controlled system is active. A grounded loop accumulates
    /// no integral action and zeroes what it has.
    pub in_flight: bool,
    /// Scale applied to the proportional and derivative contributions only;
    /// the integral term passes through unscaled.
    pub coef: f64,
    /// Symmetric clamp bound on the raw error. The magnitude of the bound is
    /// used, so a negative value behaves like its absolute value.
    pub max_error: Option<f64>,
}

impl Default for UpdateParams {
    fn default() -> Self {
        Self {
            in_flight: true,
            coef: 1.0,
            max_error: None,
        }
    }
}

// ============================================================================
// PID CONTROLLER - Proportional-Integral-Derivative control
// ============================================================================

/// Single-loop PID controller driven by one owner calling
/// [`update`](PIDController::update) once per control cycle.
///
/// Output after every effective update is
/// `coef * p_term + i_term + coef * d_term`, with `i_term` clamped to
/// `[-windup_guard, +windup_guard]`. Samples arriving later than
/// `stale_after` since the previous one are skipped without touching the
/// output; samples arriving sooner than `sample_time` are ignored entirely.
pub struct PIDController<C: TimeSource = MonotonicClock> {
    kp: f64,
    ki: f64,
    kd: f64,

    setpoint: f64,
    sample_time: Duration,
    stale_after: Duration,
    windup_guard: f64,

    p_term: f64,
    i_term: f64,
    d_term: f64,
    output: f64,

    integral_error: f64,
    last_error: f64,
    delta_error: f64,
    last_time: Instant,

    clock: C,
    events: Option<EventLog>,
}

impl PIDController {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self::with_clock(kp, ki, kd, MonotonicClock)
    }

    /// Builds a controller from a loaded runtime configuration.
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        let mut pid = Self::new(cfg.kp, cfg.ki, cfg.kd);
        pid.setpoint = cfg.setpoint;
        pid.sample_time = cfg.sample_time();
        pid.stale_after = cfg.stale_after();
        pid.windup_guard = cfg.windup_guard;
        pid
    }
}

impl Default for PIDController {
    fn default() -> Self {
        Self::new(0.2, 0.0, 0.0)
    }
}

impl<C: TimeSource> PIDController<C> {
    /// Builds a controller around an explicit time source. Tests use this
    /// with [`ManualClock`](crate::clock::ManualClock) for deterministic
    /// time deltas.
    pub fn with_clock(kp: f64, ki: f64, kd: f64, clock: C) -> Self {
        let now = clock.now();
        let mut pid = Self {
            kp,
            ki,
            kd,
            setpoint: 0.0,
            sample_time: Duration::ZERO,
            stale_after: Duration::from_secs(1),
            windup_guard: 100.0,
            p_term: 0.0,
            i_term: 0.0,
            d_term: 0.0,
            output: 0.0,
            integral_error: 0.0,
            last_error: 0.0,
            delta_error: 0.0,
            last_time: now,
            clock,
            events: None,
        };
        pid.reset();
        pid
    }

    /// Routes diagnostic events into `log` from now on. Without an attached
    /// log, events are dropped.
    pub fn attach_event_log(&mut self, log: EventLog) {
        self.events = Some(log);
    }

    /// Full reset: setpoint, accumulated terms, windup guard and output go
    /// back to their defaults. Gains and sample time are left untouched.
    pub fn reset(&mut self) {
        self.setpoint = 0.0;
        self.p_term = 0.0;
        self.i_term = 0.0;
        self.d_term = 0.0;
        self.last_error = 0.0;
        self.delta_error = 0.0;
        self.integral_error = 0.0;
        self.windup_guard = 100.0;
        self.output = 0.0;
    }

    /// Clears error, integral and output state only; setpoint, gains and
    /// windup guard survive.
    pub fn reset_terms(&mut self) {
        self.last_error = 0.0;
        self.delta_error = 0.0;
        self.integral_error = 0.0;
        self.output = 0.0;
    }

    /// One control cycle with default options (in flight, unit coefficient,
    /// no error clamp). Returns the current output.
    pub fn update(&mut self, feedback_value: f64) -> f64 {
        self.update_with(feedback_value, UpdateParams::default())
    }

    /// One control cycle. Reads the clock exactly once, applies the
    /// staleness and sample-time guards, then recomputes the three terms and
    /// the output. Returns the current output, which is the previous one
    /// whenever a guard skipped recomputation.
    pub fn update_with(&mut self, feedback_value: f64, params: UpdateParams) -> f64 {
        let mut error = self.setpoint - feedback_value;
        if let Some(bound) = params.max_error {
            let bound = bound.abs();
            error = error.clamp(-bound, bound);
        }

        let now = self.clock.now();
        let delta_time = now.duration_since(self.last_time).as_secs_f64();

        // Too long since the last sample: keep the previous output, but
        // advance the baseline so the next cycle gets a fresh delta and a
        // fresh derivative reference.
        if delta_time > self.stale_after.as_secs_f64() {
            self.last_time = now;
            self.last_error = error;
            self.emit(ControlEvent::StaleSample { delta_time });
            return self.output;
        }

        if delta_time >= self.sample_time.as_secs_f64() {
            self.p_term = self.kp * error;

            if params.in_flight {
                self.integral_error += error * delta_time;
                self.i_term = self.ki * self.integral_error;
                if self.i_term > self.windup_guard {
                    self.i_term = self.windup_guard;
                    self.emit(ControlEvent::WindupPositive);
                } else if self.i_term < -self.windup_guard {
                    self.i_term = -self.windup_guard;
                    self.emit(ControlEvent::WindupNegative);
                }
            } else {
                // Grounded: no integral action accumulates while inactive.
                self.integral_error = 0.0;
                self.i_term = 0.0;
            }

            self.d_term = 0.0;
            if delta_time > 0.0 {
                self.delta_error = error - self.last_error;
                self.d_term = self.kd * self.delta_error / delta_time;
            }

            self.last_time = now;
            self.last_error = error;

            self.output = params.coef * self.p_term + self.i_term + params.coef * self.d_term;
        }

        self.output
    }

    fn emit(&self, event: ControlEvent) {
        if let Some(log) = &self.events {
            log.push(event);
        }
    }

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    pub fn set_kp(&mut self, proportional_gain: f64) {
        self.kp = proportional_gain;
        self.emit(ControlEvent::GainChanged {
            param: GainParam::Kp,
            value: proportional_gain,
        });
    }

    pub fn set_ki(&mut self, integral_gain: f64) {
        self.ki = integral_gain;
        self.emit(ControlEvent::GainChanged {
            param: GainParam::Ki,
            value: integral_gain,
        });
    }

    pub fn set_kd(&mut self, derivative_gain: f64) {
        self.kd = derivative_gain;
        self.emit(ControlEvent::GainChanged {
            param: GainParam::Kd,
            value: derivative_gain,
        });
    }

    pub fn set_windup_guard(&mut self, windup_guard: f64) {
        self.windup_guard = windup_guard;
        self.emit(ControlEvent::GainChanged {
            param: GainParam::WindupGuard,
            value: windup_guard,
        });
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// Minimum interval between effective recomputations. Takes effect on
    /// the next update call.
    pub fn set_sample_time(&mut self, sample_time: Duration) {
        self.sample_time = sample_time;
    }

    /// Window after which a sample is considered too stale to act on.
    pub fn set_stale_after(&mut self, stale_after: Duration) {
        self.stale_after = stale_after;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn kp(&self) -> f64 {
        self.kp
    }

    pub fn ki(&self) -> f64 {
        self.ki
    }

    pub fn kd(&self) -> f64 {
        self.kd
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn p_term(&self) -> f64 {
        self.p_term
    }

    pub fn i_term(&self) -> f64 {
        self.i_term
    }

    pub fn d_term(&self) -> f64 {
        self.d_term
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    pub fn integral_error(&self) -> f64 {
        self.integral_error
    }

    pub fn windup_guard(&self) -> f64 {
        self.windup_guard
    }

    pub fn sample_time(&self) -> Duration {
        self.sample_time
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }
}
