use std::sync::atomic::Ordering;
use std::time::Duration;

use pid_loop::runner::{spawn_control_thread, spawn_plant_thread};
use pid_loop::{
    load_config, ControlEvent, EventLog, GainSettings, LoopChannels, LoopMetrics, LoopStats,
    PIDController, SharedGains,
};

fn main() {
    println!("===========================================");
    println!("Starting PID Control Loop Demo");
    println!("===========================================\n");

    // Load runtime config from file
    let cfg = load_config("config/controller.toml");

    let channels = LoopChannels::new(256);
    let event_log = EventLog::new(2000);
    let metrics = LoopMetrics::new();
    let stats = LoopStats::new();
    let gains = SharedGains::new(GainSettings::from_config(&cfg));

    let mut pid = PIDController::from_config(&cfg);
    pid.attach_event_log(event_log.clone());

    let plant_handle = spawn_plant_thread(channels.clone(), cfg.loop_interval(), stats.clone());
    let control_handle = spawn_control_thread(
        channels.clone(),
        pid,
        gains.clone(),
        metrics.clone(),
        stats.clone(),
        cfg.control_deadline_ms,
    );

    // Regulate around the configured setpoint for the first half of the run,
    // then step it to show live re-tuning through the shared buffer.
    let half = Duration::from_secs(cfg.run_duration_secs.max(2) / 2);
    println!("System running for {} seconds...\n", cfg.run_duration_secs);
    std::thread::sleep(half);

    let step_target = cfg.setpoint + 5.0;
    println!("Stepping setpoint to {:.1}", step_target);
    gains.update(|g| g.setpoint = step_target);
    std::thread::sleep(half);

    println!("\n===========================================");
    println!("Run completed - initiating shutdown");
    stats.shutdown.store(true, Ordering::Relaxed);
    let _ = plant_handle.join();
    let _ = control_handle.join();

    let total_cycles = stats.total_cycles.load(Ordering::Relaxed);
    let missed = stats.missed_deadlines.load(Ordering::Relaxed);
    let compliance = if total_cycles > 0 {
        ((total_cycles - missed) as f64 / total_cycles as f64) * 100.0
    } else {
        100.0
    };

    println!("===========================================");
    println!("FINAL CONTROL LOOP RESULTS");
    println!("===========================================");
    println!("Total Cycles: {}", total_cycles);
    println!("Deadline Compliance: {:.2}% ({} missed)", compliance, missed);

    let mut stale = 0u64;
    let mut windup_pos = 0u64;
    let mut windup_neg = 0u64;
    let mut gain_changes = 0u64;
    for event in event_log.read_all() {
        match event {
            ControlEvent::StaleSample { .. } => stale += 1,
            ControlEvent::WindupPositive => windup_pos += 1,
            ControlEvent::WindupNegative => windup_neg += 1,
            ControlEvent::GainChanged { .. } => gain_changes += 1,
        }
    }
    println!("\n=== Controller Events ===");
    println!("Stale samples: {}", stale);
    println!(
        "Windup saturation: {} positive, {} negative",
        windup_pos, windup_neg
    );
    println!("Gain changes: {}", gain_changes);

    let report = metrics.report();
    println!("\n=== Performance Metrics ===");
    println!(
        "Update P50: {:?}, P99: {:?}",
        report.update_p50, report.update_p99
    );
    println!("E2E P50: {:?}, P99: {:?}", report.e2e_p50, report.e2e_p99);
    println!(
        "Jitter P50: {:?}, P99: {:?}",
        report.jitter_p50, report.jitter_p99
    );
}
