//! Runner module - threaded demo loop driving a controller against the
//! simulated plant

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::RuntimeConfig;
use crate::metrics::LoopMetrics;
use crate::pid::PIDController;
use crate::plant::SimulatedPlant;

// ============================================================================
// LOOP CHANNELS - Communication between plant and control threads
// ============================================================================

#[derive(Clone, Debug)]
pub struct Measurement {
    pub timestamp: Instant,
    pub value: f64,
    pub sequence_id: u64,
}

#[derive(Clone, Debug)]
pub struct Command {
    pub output: f64,
    pub sequence_id: u64,
}

#[derive(Clone)]
pub struct LoopChannels {
    // Plant -> Controller
    pub measurement_tx: Sender<Measurement>,
    pub measurement_rx: Arc<Receiver<Measurement>>,

    // Controller -> Plant
    pub command_tx: Sender<Command>,
    pub command_rx: Arc<Receiver<Command>>,
}

impl LoopChannels {
    pub fn new(buffer_size: usize) -> Self {
        let (measurement_tx, measurement_rx) = bounded(buffer_size);
        let (command_tx, command_rx) = bounded(buffer_size);

        Self {
            measurement_tx,
            measurement_rx: Arc::new(measurement_rx),
            command_tx,
            command_rx: Arc::new(command_rx),
        }
    }
}

// ============================================================================
// SHARED GAINS - Live re-tuning from outside the control thread
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct GainSettings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub setpoint: f64,
}

impl GainSettings {
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            setpoint: cfg.setpoint,
        }
    }
}

/// The controller itself is single-owner; this buffer is the external
/// serialization point for setters invoked from other threads.
#[derive(Clone)]
pub struct SharedGains {
    data: Arc<Mutex<GainSettings>>,
}

impl SharedGains {
    pub fn new(initial: GainSettings) -> Self {
        Self {
            data: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut GainSettings),
    {
        let mut settings = self.data.lock();
        f(&mut settings);
    }

    pub fn get(&self) -> GainSettings {
        self.data.lock().clone()
    }
}

// ============================================================================
// LOOP STATS - Cycle counters shared with the main thread
// ============================================================================

pub struct LoopStats {
    pub total_cycles: AtomicU64,
    pub missed_deadlines: AtomicU64,
    pub shutdown: AtomicBool,
}

impl LoopStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_cycles: AtomicU64::new(0),
            missed_deadlines: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// THREADS
// ============================================================================

/// Samples the plant at a fixed interval, applying the most recent command
/// between samples.
pub fn spawn_plant_thread(
    channels: LoopChannels,
    interval: Duration,
    stats: Arc<LoopStats>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut plant = SimulatedPlant::new(42);
        let mut control = 0.0;
        let mut sequence_id = 0u64;
        let dt = interval.as_secs_f64();

        loop {
            if stats.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let cycle_start = Instant::now();

            // Apply the latest command; stale ones in the buffer are skipped.
            while let Ok(command) = channels.command_rx.try_recv() {
                control = command.output;
            }
            plant.apply(control, dt);

            sequence_id += 1;
            let measurement = Measurement {
                timestamp: Instant::now(),
                value: plant.measure(),
                sequence_id,
            };
            if channels.measurement_tx.send(measurement).is_err() {
                break;
            }

            let elapsed = cycle_start.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
    })
}

/// Runs the controller over incoming measurements, sending one command per
/// sample and recording loop metrics. Gain changes arriving through
/// `SharedGains` are applied between cycles.
pub fn spawn_control_thread(
    channels: LoopChannels,
    mut pid: PIDController,
    gains: SharedGains,
    metrics: LoopMetrics,
    stats: Arc<LoopStats>,
    deadline_ms: f64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut applied = gains.get();

        loop {
            if stats.shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Receive with timeout to allow shutdown checks
            let measurement = match channels
                .measurement_rx
                .recv_timeout(Duration::from_millis(100))
            {
                Ok(m) => m,
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => continue,
                Err(_) => break,
            };

            let wanted = gains.get();
            if wanted != applied {
                if wanted.kp != applied.kp {
                    pid.set_kp(wanted.kp);
                }
                if wanted.ki != applied.ki {
                    pid.set_ki(wanted.ki);
                }
                if wanted.kd != applied.kd {
                    pid.set_kd(wanted.kd);
                }
                if wanted.setpoint != applied.setpoint {
                    pid.set_setpoint(wanted.setpoint);
                }
                applied = wanted;
            }

            let cycle_start = Instant::now();
            let output = pid.update(measurement.value);
            let update_duration = cycle_start.elapsed();

            metrics.record_update(update_duration);
            metrics.record_e2e(measurement.timestamp.elapsed());
            metrics.record_cycle_jitter(update_duration.as_nanos() as u64);

            stats.total_cycles.fetch_add(1, Ordering::Relaxed);
            if update_duration.as_secs_f64() * 1000.0 > deadline_ms {
                stats.missed_deadlines.fetch_add(1, Ordering::Relaxed);
            }

            let command = Command {
                output,
                sequence_id: measurement.sequence_id,
            };
            if channels.command_tx.send(command).is_err() {
                break;
            }
        }
    })
}
