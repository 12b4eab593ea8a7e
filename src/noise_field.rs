//! Flow field for Swirl Search
//! Smooth, deterministic 3D noise turned into a per-point flow direction.
//! The third axis is the frame tick, so the pattern drifts over time.

use noise::{NoiseFn, OpenSimplex};
use std::f32::consts::TAU;

use crate::config::FieldConfig;

pub struct FlowField {
    noise: OpenSimplex,
    x_off: f64,
    y_off: f64,
    z_off: f64,
    steps: f32,
}

impl FlowField {
    pub fn new(seed: u32, config: &FieldConfig) -> Self {
        Self {
            noise: OpenSimplex::new(seed),
            x_off: config.x_off,
            y_off: config.y_off,
            z_off: config.z_off,
            steps: config.noise_steps,
        }
    }

    /// Raw noise value at a canvas position and tick.
    pub fn sample(&self, x: f32, y: f32, tick: u64) -> f32 {
        self.noise.get([
            x as f64 * self.x_off,
            y as f64 * self.y_off,
            tick as f64 * self.z_off,
        ]) as f32
    }

    /// Flow direction in radians.
    pub fn angle(&self, x: f32, y: f32, tick: u64) -> f32 {
        self.sample(x, y, tick) * self.steps * TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_is_deterministic() {
        let config = FieldConfig::default();
        let a = FlowField::new(11, &config);
        let b = FlowField::new(11, &config);

        for i in 0..50 {
            let x = i as f32 * 13.7;
            let y = i as f32 * 7.3;
            assert_eq!(a.angle(x, y, i), b.angle(x, y, i));
        }
    }

    #[test]
    fn test_neighbouring_samples_are_close() {
        let field = FlowField::new(3, &FieldConfig::default());
        let mut x = 10.5;
        while x < 1000.0 {
            let here = field.sample(x, 240.25, 17);
            let next = field.sample(x + 1.0, 240.25, 17);
            assert!(here.is_finite());
            assert!((here - next).abs() < 0.05, "jump at x={x}: {here} -> {next}");
            x += 37.0;
        }
    }

    #[test]
    fn test_consecutive_ticks_drift_smoothly() {
        let field = FlowField::new(5, &FieldConfig::default());
        for tick in 0..100 {
            let now = field.sample(321.5, 123.25, tick);
            let later = field.sample(321.5, 123.25, tick + 1);
            assert!((now - later).abs() < 0.05);
        }
    }
}
