//! Integration tests for the PID controller and the demo control loop

use pid_loop::runner::{spawn_control_thread, spawn_plant_thread};
use pid_loop::{
    ControlEvent, EventLog, GainParam, GainSettings, LoopChannels, LoopMetrics, LoopStats,
    ManualClock, PIDController, RuntimeConfig, SharedGains, UpdateParams,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn controller_with_clock(kp: f64, ki: f64, kd: f64) -> (PIDController<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let pid = PIDController::with_clock(kp, ki, kd, clock.clone());
    (pid, clock)
}

// ============================================================================
// PROPORTIONAL TERM
// ============================================================================

#[test]
fn proportional_only_output_tracks_error() {
    let (mut pid, clock) = controller_with_clock(2.0, 0.0, 0.0);
    pid.set_setpoint(15.0);

    clock.advance(Duration::from_millis(10));
    let output = pid.update(10.0);

    assert_eq!(output, 10.0, "output should be Kp * (setpoint - feedback)");
    assert_eq!(pid.p_term(), 10.0);
    assert_eq!(pid.i_term(), 0.0);
    assert_eq!(pid.d_term(), 0.0);
}

#[test]
fn defaults_match_construction_contract() {
    let pid = PIDController::default();
    assert_eq!(pid.kp(), 0.2);
    assert_eq!(pid.ki(), 0.0);
    assert_eq!(pid.kd(), 0.0);
    assert_eq!(pid.setpoint(), 0.0);
    assert_eq!(pid.windup_guard(), 100.0);
    assert_eq!(pid.sample_time(), Duration::ZERO);
    assert_eq!(pid.stale_after(), Duration::from_secs(1));
    assert_eq!(pid.output(), 0.0);
}

// ============================================================================
// WINDUP GUARD
// ============================================================================

#[test]
fn windup_guard_clamps_integral_term() {
    let (mut pid, clock) = controller_with_clock(0.0, 1.0, 0.0);
    let log = EventLog::new(100);
    pid.attach_event_log(log.clone());
    pid.set_setpoint(1000.0);

    // Sustained large error: integral would reach 500 on the first step
    for _ in 0..5 {
        clock.advance(Duration::from_millis(500));
        pid.update(0.0);
    }

    assert_eq!(pid.i_term(), 100.0, "i_term must sit exactly at the guard");
    assert!(
        log.read_all().contains(&ControlEvent::WindupPositive),
        "positive saturation signal should be observed"
    );
}

#[test]
fn windup_guard_clamps_negative_integral() {
    let (mut pid, clock) = controller_with_clock(0.0, 1.0, 0.0);
    let log = EventLog::new(100);
    pid.attach_event_log(log.clone());
    pid.set_setpoint(-1000.0);

    clock.advance(Duration::from_millis(500));
    pid.update(0.0);

    assert_eq!(pid.i_term(), -100.0);
    assert!(log.read_all().contains(&ControlEvent::WindupNegative));
}

// ============================================================================
// GROUNDED VS IN-FLIGHT
// ============================================================================

#[test]
fn grounded_update_resets_integral() {
    let (mut pid, clock) = controller_with_clock(0.5, 1.0, 0.0);
    pid.set_setpoint(10.0);

    // Accumulate some integral action while in flight
    clock.advance(Duration::from_millis(100));
    pid.update(0.0);
    assert!(pid.integral_error() > 0.0);

    // Grounded call zeroes it and keeps it at zero
    for _ in 0..3 {
        clock.advance(Duration::from_millis(100));
        pid.update_with(
            0.0,
            UpdateParams {
                in_flight: false,
                ..Default::default()
            },
        );
        assert_eq!(pid.integral_error(), 0.0);
        assert_eq!(pid.i_term(), 0.0);
    }
}

// ============================================================================
// STALENESS GUARD
// ============================================================================

#[test]
fn stale_sample_retains_previous_output() {
    let (mut pid, clock) = controller_with_clock(1.0, 0.0, 0.0);
    let log = EventLog::new(100);
    pid.attach_event_log(log.clone());
    pid.set_setpoint(5.0);

    clock.advance(Duration::from_millis(100));
    let first = pid.update(0.0);
    assert_eq!(first, 5.0);

    // 1.5 s gap: sample is too stale to act on
    clock.advance(Duration::from_millis(1500));
    let second = pid.update(3.0);

    assert_eq!(second, first, "stale sample must not change the output");
    assert_eq!(pid.last_error(), 2.0, "derivative baseline still advances");

    let events = log.read_all();
    match events.last() {
        Some(ControlEvent::StaleSample { delta_time }) => {
            assert!((delta_time - 1.5).abs() < 1e-9, "observed delta {}", delta_time);
        }
        other => panic!("expected a staleness signal, got {:?}", other),
    }
}

#[test]
fn staleness_window_is_configurable() {
    let (mut pid, clock) = controller_with_clock(1.0, 0.0, 0.0);
    let log = EventLog::new(100);
    pid.attach_event_log(log.clone());
    pid.set_setpoint(5.0);
    pid.set_stale_after(Duration::from_secs(5));

    // 2 s would be stale under the default window, not under 5 s
    clock.advance(Duration::from_secs(2));
    let output = pid.update(0.0);

    assert_eq!(output, 5.0);
    assert!(log.is_empty(), "no staleness signal expected");
}

#[test]
fn stale_recovery_uses_fresh_delta() {
    let (mut pid, clock) = controller_with_clock(1.0, 1.0, 0.0);
    pid.set_setpoint(10.0);

    clock.advance(Duration::from_millis(1500));
    pid.update(0.0); // stale, advances the baseline
    let integral_after_stale = pid.integral_error();

    clock.advance(Duration::from_millis(100));
    pid.update(0.0);

    // The effective update only integrates over the 0.1 s since the stale
    // call, not the 1.6 s since construction.
    let added = pid.integral_error() - integral_after_stale;
    assert!((added - 1.0).abs() < 1e-9, "integrated {} over 0.1s", added);
}

// ============================================================================
// SAMPLE-TIME THROTTLE
// ============================================================================

#[test]
fn sample_time_throttles_recomputation() {
    let (mut pid, clock) = controller_with_clock(1.0, 1.0, 0.1);
    pid.set_setpoint(10.0);
    pid.set_sample_time(Duration::from_millis(500));

    clock.advance(Duration::from_millis(600));
    let first = pid.update(2.0);
    let (p, i, d) = (pid.p_term(), pid.i_term(), pid.d_term());
    let integral = pid.integral_error();
    let last_error = pid.last_error();

    // Within the sample interval: nothing changes, not even the baseline
    clock.advance(Duration::from_millis(100));
    let second = pid.update(7.0);

    assert_eq!(second, first);
    assert_eq!(pid.p_term(), p);
    assert_eq!(pid.i_term(), i);
    assert_eq!(pid.d_term(), d);
    assert_eq!(pid.integral_error(), integral);
    assert_eq!(pid.last_error(), last_error);

    // Another 0.4 s brings the delta since the last effective update to
    // 0.5 s, which passes the throttle again.
    clock.advance(Duration::from_millis(400));
    let third = pid.update(7.0);
    assert_ne!(third, first);
}

// ============================================================================
// ERROR CLAMP
// ============================================================================

#[test]
fn max_error_clamps_before_all_terms() {
    let (mut pid, clock) = controller_with_clock(1.0, 0.0, 0.0);
    pid.set_setpoint(100.0);

    clock.advance(Duration::from_millis(10));
    pid.update_with(
        0.0,
        UpdateParams {
            max_error: Some(10.0),
            ..Default::default()
        },
    );

    assert_eq!(pid.p_term(), 10.0, "error must be clamped to +max_error");
    assert_eq!(pid.last_error(), 10.0);
}

#[test]
fn negative_max_error_bound_acts_by_magnitude() {
    let (mut pid, clock) = controller_with_clock(1.0, 0.0, 0.0);
    pid.set_setpoint(-100.0);

    clock.advance(Duration::from_millis(10));
    pid.update_with(
        0.0,
        UpdateParams {
            max_error: Some(-10.0),
            ..Default::default()
        },
    );

    assert_eq!(pid.p_term(), -10.0, "clamp must stay symmetric");
}

// ============================================================================
// COEFFICIENT SCALING
// ============================================================================

#[test]
fn coef_scales_p_and_d_but_not_i() {
    let (mut pid, clock) = controller_with_clock(2.0, 0.5, 0.01);
    pid.set_setpoint(10.0);

    clock.advance(Duration::from_millis(100));
    let output = pid.update_with(
        0.0,
        UpdateParams {
            coef: 0.5,
            ..Default::default()
        },
    );

    let expected = 0.5 * pid.p_term() + pid.i_term() + 0.5 * pid.d_term();
    assert_eq!(output, expected);
    assert_eq!(pid.p_term(), 20.0, "p_term itself stays unscaled");
}

// ============================================================================
// RESETS
// ============================================================================

#[test]
fn full_reset_restores_defaults_but_keeps_gains() {
    let (mut pid, clock) = controller_with_clock(2.0, 1.0, 0.1);
    pid.set_setpoint(50.0);
    pid.set_windup_guard(10.0);
    pid.set_sample_time(Duration::from_millis(20));
    clock.advance(Duration::from_millis(100));
    pid.update(0.0);

    pid.reset();

    assert_eq!(pid.setpoint(), 0.0);
    assert_eq!(pid.windup_guard(), 100.0);
    assert_eq!(pid.output(), 0.0);
    assert_eq!(pid.integral_error(), 0.0);
    assert_eq!(pid.kp(), 2.0, "gains survive a full reset");
    assert_eq!(pid.sample_time(), Duration::from_millis(20));
}

#[test]
fn reset_terms_preserves_setpoint_and_guard() {
    let (mut pid, clock) = controller_with_clock(2.0, 1.0, 0.1);
    pid.set_setpoint(50.0);
    pid.set_windup_guard(10.0);
    clock.advance(Duration::from_millis(100));
    pid.update(0.0);

    pid.reset_terms();

    assert_eq!(pid.setpoint(), 50.0);
    assert_eq!(pid.windup_guard(), 10.0);
    assert_eq!(pid.output(), 0.0);
    assert_eq!(pid.integral_error(), 0.0);
    assert_eq!(pid.last_error(), 0.0);
}

// ============================================================================
// DIAGNOSTIC EVENTS
// ============================================================================

#[test]
fn gain_setters_emit_change_events() {
    let (mut pid, _clock) = controller_with_clock(0.2, 0.0, 0.0);
    let log = EventLog::new(100);
    pid.attach_event_log(log.clone());

    pid.set_kp(1.5);
    pid.set_ki(0.3);
    pid.set_kd(0.05);
    pid.set_windup_guard(50.0);

    let events = log.read_all();
    assert_eq!(events.len(), 4);
    assert_eq!(
        events[0],
        ControlEvent::GainChanged {
            param: GainParam::Kp,
            value: 1.5
        }
    );
    assert_eq!(
        events[3],
        ControlEvent::GainChanged {
            param: GainParam::WindupGuard,
            value: 50.0
        }
    );
}

#[test]
fn event_log_drops_oldest_when_full() {
    let log = EventLog::new(2);
    log.push(ControlEvent::WindupPositive);
    log.push(ControlEvent::WindupNegative);
    log.push(ControlEvent::StaleSample { delta_time: 2.0 });

    let events = log.read_all();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], ControlEvent::WindupNegative);
}

// ============================================================================
// INPUT POLICY
// ============================================================================

#[test]
fn nan_feedback_propagates_arithmetically() {
    let (mut pid, clock) = controller_with_clock(1.0, 0.0, 0.0);
    pid.set_setpoint(5.0);

    clock.advance(Duration::from_millis(10));
    let output = pid.update(f64::NAN);

    assert!(output.is_nan(), "NaN input is not rejected, it propagates");
}

// ============================================================================
// LIVE CONTROL LOOP
// ============================================================================

#[test]
fn control_loop_runs_and_counts_cycles() {
    let cfg = RuntimeConfig {
        kp: 5.0,
        setpoint: 1.0,
        loop_interval_ms: 5,
        ..Default::default()
    };

    let channels = LoopChannels::new(64);
    let metrics = LoopMetrics::new();
    let stats = LoopStats::new();
    let gains = SharedGains::new(GainSettings::from_config(&cfg));
    let pid = PIDController::from_config(&cfg);

    let plant_handle = spawn_plant_thread(channels.clone(), cfg.loop_interval(), stats.clone());
    let control_handle = spawn_control_thread(
        channels.clone(),
        pid,
        gains,
        metrics.clone(),
        stats.clone(),
        cfg.control_deadline_ms,
    );

    std::thread::sleep(Duration::from_millis(400));
    stats.shutdown.store(true, Ordering::Relaxed);
    plant_handle.join().unwrap();
    control_handle.join().unwrap();

    let cycles = stats.total_cycles.load(Ordering::Relaxed);
    assert!(cycles > 10, "expected sustained cycling, got {}", cycles);

    let report = metrics.report();
    assert!(report.e2e_p50 > Duration::ZERO, "e2e latency should be recorded");
}
