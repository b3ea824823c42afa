//! Adaptive quantile scaling
//!
//! Tracks a low and a high quantile of the stream with Robbins-Monro updates
//! and maps each sample into [0, 1] between them. Unlike [`MinMaxScaler`] a
//! handful of outliers does not stretch the output range.
//!
//! The step size is scaled by a running estimate of the deviation from the
//! mid-quantile, so the estimator adapts to the signal's spread instead of
//! needing a fixed learning rate.
//!
//! [`MinMaxScaler`]: crate::min_max::MinMaxScaler

use serde::{Deserialize, Serialize};

use crate::ema::{ema_alpha, ema_update, DecayConfig, SampleCounter};
use crate::estimator::AdaptiveEstimator;
use crate::helpers::map_clamped;

/// Smallest allowed low-quantile level
pub const MIN_QUANTILE_LEVEL: f32 = 1e-4;

/// Largest allowed low-quantile level (median)
pub const MAX_QUANTILE_LEVEL: f32 = 0.5;

/// Default span, 0.5% tails on each side
pub const DEFAULT_SPAN: f32 = 0.99;

/// Standard deviations covering the full range of a normal distribution
const STDDEV_TO_RANGE: f32 = 6.0;

/// Convert a low-quantile level to the covered span
pub fn low_quantile_level_to_span(level: f32) -> f32 {
    let level = level.clamp(MIN_QUANTILE_LEVEL, MAX_QUANTILE_LEVEL);
    (1.0 - 2.0 * level).clamp(0.0, 1.0)
}

/// Convert a span in [0, 1] to the matching low-quantile level
pub fn span_to_low_quantile_level(span: f32) -> f32 {
    let span = span.clamp(0.0, 1.0);
    (0.5 * (1.0 - span)).clamp(MIN_QUANTILE_LEVEL, MAX_QUANTILE_LEVEL)
}

/// Robbins-Monro quantile scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileScaler {
    decay: DecayConfig,
    low_quantile_level: f32,
    low_quantile: f32,
    high_quantile: f32,
    /// Running deviation from the mid-quantile
    stddev: f32,
    value: f32,
    n: SampleCounter,
}

impl Default for QuantileScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantileScaler {
    /// Infinite window, default span
    pub fn new() -> Self {
        Self::with_time_window(0.0, DEFAULT_SPAN)
    }

    pub fn with_time_window(seconds: f64, span: f32) -> Self {
        let mut scaler = Self {
            decay: DecayConfig::from_window(seconds),
            low_quantile_level: span_to_low_quantile_level(span),
            low_quantile: 0.0,
            high_quantile: 0.0,
            stddev: 0.0,
            value: 0.5,
            n: SampleCounter::default(),
        };
        scaler.init_states();
        scaler
    }

    pub fn set_span(&mut self, span: f32) {
        self.low_quantile_level = span_to_low_quantile_level(span);
    }

    pub fn span(&self) -> f32 {
        low_quantile_level_to_span(self.low_quantile_level)
    }

    pub fn set_low_quantile_level(&mut self, level: f32) {
        self.low_quantile_level = level.clamp(MIN_QUANTILE_LEVEL, MAX_QUANTILE_LEVEL);
    }

    /// Symmetric coverage: `high = 1 - low`
    pub fn set_high_quantile_level(&mut self, level: f32) {
        self.set_low_quantile_level(1.0 - level);
    }

    pub fn low_quantile_level(&self) -> f32 {
        self.low_quantile_level
    }

    pub fn high_quantile_level(&self) -> f32 {
        1.0 - self.low_quantile_level
    }

    pub fn low_quantile(&self) -> f32 {
        self.low_quantile
    }

    pub fn high_quantile(&self) -> f32 {
        self.high_quantile
    }

    /// Running deviation estimate used to scale the update step
    pub fn stddev(&self) -> f32 {
        self.stddev
    }

    pub fn sample_count(&self) -> u32 {
        self.n.get()
    }

    fn init_states(&mut self) {
        self.low_quantile = f32::MAX;
        self.high_quantile = -f32::MAX;
        self.stddev = 0.0;
        self.value = 0.5;
    }
}

impl AdaptiveEstimator for QuantileScaler {
    fn put(&mut self, x: f32, dt_seconds: f64) -> f32 {
        if !x.is_finite() {
            return self.value;
        }

        if self.n.is_zero() {
            self.low_quantile = x;
            self.high_quantile = x;
            self.stddev = 0.0;
            self.value = 0.5;
            self.n.increment();
            return self.value;
        }

        let alpha = ema_alpha(
            self.decay.is_infinite(),
            self.decay.tau_seconds(),
            self.n.get(),
            dt_seconds,
        );

        let mid_quantile = 0.5 * (self.low_quantile + self.high_quantile);
        let deviation = (x - mid_quantile).abs();

        // Snap on the first real update instead of warming up from zero
        if self.n.get() == 1 && self.stddev == 0.0 {
            self.stddev = deviation;
        } else {
            ema_update(&mut self.stddev, deviation, alpha);
        }

        let eta = (alpha * STDDEV_TO_RANGE * self.stddev).max(0.0);
        let eta_level = eta * self.low_quantile_level;

        if x <= self.low_quantile {
            // Below both: the nearer (low) quantile moves faster
            self.low_quantile -= eta - eta_level;
            self.high_quantile -= eta_level;
            self.low_quantile = self.low_quantile.max(x);
            self.high_quantile = self.high_quantile.max(x);
        } else if x <= self.high_quantile {
            // Inside: contract toward the center
            self.low_quantile += eta_level;
            self.high_quantile -= eta_level;
            self.low_quantile = self.low_quantile.min(x);
            self.high_quantile = self.high_quantile.max(x);
        } else {
            self.low_quantile += eta_level;
            self.high_quantile += eta - eta_level;
            self.low_quantile = self.low_quantile.min(x);
            self.high_quantile = self.high_quantile.min(x);
        }

        if !self.decay.is_infinite() {
            ema_update(&mut self.low_quantile, mid_quantile, alpha);
            ema_update(&mut self.high_quantile, mid_quantile, alpha);
        }

        if self.low_quantile > self.high_quantile {
            let mid = 0.5 * (self.low_quantile + self.high_quantile);
            self.low_quantile = mid;
            self.high_quantile = mid;
        }

        self.n.increment();

        self.value = map_clamped(x, self.low_quantile, self.high_quantile, 0.0, 1.0);
        self.value
    }

    fn reset(&mut self) {
        self.n.reset();
        self.init_states();
    }

    fn set_time_window(&mut self, seconds: f64) {
        if self.decay.set_window(seconds) {
            tracing::debug!("quantile scaler switched to infinite window, reseeding");
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
