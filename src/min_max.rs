//! Adaptive min-max scaling
//!
//! Rescales a stream into [0, 1] using running estimates of its minimum and
//! maximum. In infinite mode the extremes are hard running min/max; with a
//! finite time window they additionally decay toward the current sample so old
//! extremes fade out. Smoothed copies of min/max are used for the actual
//! mapping to avoid visible jumps when a new extreme shows up.

use serde::{Deserialize, Serialize};

use crate::ema::{ema_alpha, ema_update, DecayConfig, SampleCounter};
use crate::estimator::AdaptiveEstimator;

/// Output emitted while min and max coincide
const NEUTRAL_OUTPUT: f32 = 0.5;

/// Running min/max scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    decay: DecayConfig,
    /// Raw running minimum (sentinel `f32::MAX` before the first sample)
    min_value: f32,
    /// Raw running maximum (sentinel `-f32::MAX` before the first sample)
    max_value: f32,
    smoothed_min: f32,
    smoothed_max: f32,
    /// Last output in [0, 1]
    value: f32,
    n: SampleCounter,
}

impl Default for MinMaxScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl MinMaxScaler {
    /// Scaler with an infinite time window (no decay)
    pub fn new() -> Self {
        Self::with_time_window(0.0)
    }

    /// Scaler with the given time window in seconds; `<= 0` selects infinite mode
    pub fn with_time_window(seconds: f64) -> Self {
        let mut scaler = Self {
            decay: DecayConfig::from_window(seconds),
            min_value: 0.0,
            max_value: 0.0,
            smoothed_min: NEUTRAL_OUTPUT,
            smoothed_max: NEUTRAL_OUTPUT,
            value: NEUTRAL_OUTPUT,
            n: SampleCounter::default(),
        };
        scaler.init_states();
        scaler
    }

    /// Smoothed minimum used as the low end of the mapping
    pub fn smoothed_min(&self) -> f32 {
        self.smoothed_min
    }

    /// Smoothed maximum used as the high end of the mapping
    pub fn smoothed_max(&self) -> f32 {
        self.smoothed_max
    }

    /// Samples seen since the last reset
    pub fn sample_count(&self) -> u32 {
        self.n.get()
    }

    fn init_states(&mut self) {
        // No valid extremes until the first sample arrives
        self.min_value = f32::MAX;
        self.max_value = -f32::MAX;
        self.smoothed_min = NEUTRAL_OUTPUT;
        self.smoothed_max = NEUTRAL_OUTPUT;
        self.value = NEUTRAL_OUTPUT;
    }
}

impl AdaptiveEstimator for MinMaxScaler {
    fn put(&mut self, x: f32, dt_seconds: f64) -> f32 {
        if !x.is_finite() {
            return self.value;
        }

        // First sample: seed everything from data
        if self.n.is_zero() {
            self.min_value = x;
            self.max_value = x;
            self.smoothed_min = x;
            self.smoothed_max = x;
            self.value = NEUTRAL_OUTPUT;
            self.n.increment();
            return self.value;
        }

        if x < self.min_value {
            self.min_value = x;
        }
        if x > self.max_value {
            self.max_value = x;
        }

        let alpha = ema_alpha(
            self.decay.is_infinite(),
            self.decay.tau_seconds(),
            self.n.get(),
            dt_seconds,
        );

        // Old extremes fade toward the current sample
        if !self.decay.is_infinite() {
            ema_update(&mut self.min_value, x, alpha);
            ema_update(&mut self.max_value, x, alpha);
        }

        ema_update(&mut self.smoothed_min, self.min_value, alpha);
        ema_update(&mut self.smoothed_max, self.max_value, alpha);

        self.n.increment();

        let lo = self.smoothed_min;
        let hi = self.smoothed_max;

        self.value = if hi <= lo {
            NEUTRAL_OUTPUT
        } else {
            ((x - lo) / (hi - lo)).clamp(0.0, 1.0)
        };

        self.value
    }

    fn reset(&mut self) {
        self.n.reset();
        self.init_states();
    }

    fn set_time_window(&mut self, seconds: f64) {
        if self.decay.set_window(seconds) {
            tracing::debug!("min-max scaler switched to infinite window, reseeding");
            self.reset();
        }
    }

    fn time_window(&self) -> f64 {
        self.decay.window()
    }

    fn time_window_is_infinite(&self) -> bool {
        self.decay.is_infinite()
    }

    fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_first_sample_is_neutral() {
        let mut scaler = MinMaxScaler::new();
        assert_eq!(scaler.put(42.0, 0.01), 0.5);
        assert_eq!(scaler.value(), 0.5);
        assert_eq!(scaler.smoothed_min(), 42.0);
        assert_eq!(scaler.smoothed_max(), 42.0);
    }

    #[test]
    fn test_infinite_window_trace() {
        // alpha = 1/2, 1/3, 1/4 for samples 2..4
        // sample 2: min 1, max 5 -> smoothed (3, 5)   -> x=1 maps below 0
        // sample 3: min 1, max 9 -> smoothed (7/3, 19/3) -> x=9 maps above 1
        // sample 4: min 1, max 9 -> smoothed (2, 7)   -> x=3 maps to 0.2
        let mut scaler = MinMaxScaler::new();
        let outputs: Vec<f32> = [5.0, 1.0, 9.0, 3.0]
            .iter()
            .map(|&x| scaler.put(x, 1.0))
            .collect();

        assert_eq!(outputs[0], 0.5);
        assert_eq!(outputs[1], 0.0);
        assert_eq!(outputs[2], 1.0);
        assert_relative_eq!(outputs[3], 0.2, epsilon = 1e-5);
        assert_relative_eq!(scaler.smoothed_min(), 2.0, epsilon = 1e-5);
        assert_relative_eq!(scaler.smoothed_max(), 7.0, epsilon = 1e-5);
    }

    #[test]
    fn test_flat_signal_pins_to_neutral() {
        let mut scaler = MinMaxScaler::with_time_window(0.5);
        for _ in 0..100 {
            assert_eq!(scaler.put(3.0, 0.01), 0.5);
        }
    }

    #[test]
    fn test_finite_window_forgets_old_extremes() {
        let mut scaler = MinMaxScaler::with_time_window(0.5);
        scaler.put(0.0, 0.01);
        scaler.put(100.0, 0.01);

        // Long stretch oscillating in [0, 1]; the 100 spike should fade away
        for i in 0..2000 {
            scaler.put((i % 2) as f32, 0.01);
        }
        assert!(scaler.smoothed_max() < 2.0);

        // Infinite window keeps the spike forever
        let mut hard = MinMaxScaler::new();
        hard.put(0.0, 0.01);
        hard.put(100.0, 0.01);
        for i in 0..2000 {
            hard.put((i % 2) as f32, 0.01);
        }
        assert!(hard.smoothed_max() > 90.0);
    }

    #[test]
    fn test_reset_equivalence() {
        let inputs = [0.3, -2.0, 5.5, 1.0, 7.25, -0.5, 2.0];

        let mut fresh = MinMaxScaler::with_time_window(0.2);
        let expected: Vec<f32> = inputs.iter().map(|&x| fresh.put(x, 0.05)).collect();

        let mut reused = MinMaxScaler::with_time_window(0.2);
        for x in [100.0, -100.0, 3.0] {
            reused.put(x, 0.05);
        }
        reused.reset();
        let actual: Vec<f32> = inputs.iter().map(|&x| reused.put(x, 0.05)).collect();

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_mode_switch_reseeds() {
        let phase_c = [4.0, 6.0, 5.0, 8.0];

        let mut fresh = MinMaxScaler::new();
        let expected: Vec<f32> = phase_c.iter().map(|&x| fresh.put(x, 0.1)).collect();

        let mut scaler = MinMaxScaler::new();
        for x in [1.0, 2.0, 3.0] {
            scaler.put(x, 0.1);
        }
        scaler.set_time_window(1.0);
        for x in [-50.0, 50.0, 20.0] {
            scaler.put(x, 0.1);
        }
        scaler.set_time_window(0.0);
        assert_eq!(scaler.sample_count(), 0);

        let actual: Vec<f32> = phase_c.iter().map(|&x| scaler.put(x, 0.1)).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_time_window_accessors() {
        let mut scaler = MinMaxScaler::with_time_window(2.5);
        assert_eq!(scaler.time_window(), 2.5);
        assert!(!scaler.time_window_is_infinite());

        scaler.set_time_window(-1.0);
        assert_eq!(scaler.time_window(), 0.0);
        assert!(scaler.time_window_is_infinite());
    }

    #[test]
    fn test_non_finite_input_is_ignored() {
        let mut scaler = MinMaxScaler::new();
        assert_eq!(scaler.put(f32::NAN, 0.1), 0.5);
        assert_eq!(scaler.sample_count(), 0);

        scaler.put(1.0, 0.1);
        let before = scaler.clone();
        scaler.put(f32::INFINITY, 0.1);
        assert_eq!(before, scaler);
    }

    proptest! {
        #[test]
        fn prop_output_bounded_and_contained(
            inputs in prop::collection::vec(-1.0e6f32..1.0e6f32, 1..200),
            window in 0.0f64..2.0,
            dt in 0.0f64..0.2,
        ) {
            let mut scaler = MinMaxScaler::with_time_window(window);
            for x in inputs {
                let y = scaler.put(x, dt);
                prop_assert!((0.0..=1.0).contains(&y));
                let tolerance = 1e-4 * (1.0 + scaler.smoothed_max().abs());
                prop_assert!(scaler.smoothed_min() <= scaler.smoothed_max() + tolerance);
            }
        }
    }
}
