//! Plant module - simulated first-order plant for the demo loop and tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// SIMULATED PLANT - Integrates control input, measured with seeded noise
// ============================================================================

pub struct SimulatedPlant {
    rng: StdRng,
    value: f64,
    pub gain: f64,
    pub noise_amplitude: f64,
}

impl SimulatedPlant {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            value: 0.0,
            gain: 1.0,
            noise_amplitude: 0.05,
        }
    }

    /// Advances the plant by `dt` seconds under the given control input.
    pub fn apply(&mut self, control: f64, dt: f64) {
        self.value += self.gain * control * dt;
    }

    /// Reads the plant output with measurement noise.
    pub fn measure(&mut self) -> f64 {
        let noise = self
            .rng
            .gen_range(-self.noise_amplitude..self.noise_amplitude);
        self.value + noise
    }

    /// True plant state, without measurement noise.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Shifts the plant state, e.g. to model an external load change.
    pub fn inject_disturbance(&mut self, offset: f64) {
        self.value += offset;
    }
}
