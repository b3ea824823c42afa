//! Adaptive normalization
//!
//! Tracks the running mean `E[x]` and second moment `E[x²]` of a stream, either
//! cumulatively or over an exponentially decaying time window, and remaps each
//! sample onto a target distribution:
//! - z-score against the running statistics
//! - rescale to the target mean and standard deviation
//! - optional clamp to `target_mean ± n·target_std`

use serde::{Deserialize, Serialize};

use crate::ema::{ema_update, AlphaPolicy, DecayConfig, SampleCounter};
use crate::estimator::AdaptiveEstimator;

/// Default target mean of the output distribution
pub const DEFAULT_TARGET_MEAN: f32 = 0.0;

/// Default target standard deviation of the output distribution
pub const DEFAULT_TARGET_STD_DEV: f32 = 1.0;

/// Default clamp range in target standard deviations
pub const DEFAULT_CLAMP_SIGMAS: f32 = 3.0;

/// Standard deviation below which the signal is considered flat
const MIN_STD_DEV: f32 = 1e-12;

/// Hard floor of the adaptive coefficient of variation
pub const CV_EPSILON: f32 = 1e-6;

/// How statistics are seeded on the first sample of a finite window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Start from the target distribution so early output is sensible
    #[default]
    TargetPrior,
    /// Start from the first sample, like infinite mode
    FirstSample,
}

/// Streaming normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    decay: DecayConfig,
    alpha_policy: AlphaPolicy,
    seed_policy: SeedPolicy,
    target_mean: f32,
    target_std: f32,
    do_clamp: bool,
    clamp_sigmas: f32,
    /// E[x]
    m1: f32,
    /// E[x²]
    m2: f32,
    /// Last output
    y: f32,
    n: SampleCounter,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_MEAN, DEFAULT_TARGET_STD_DEV)
    }
}

impl Normalizer {
    /// Normalizer with an infinite (cumulative) window
    pub fn new(target_mean: f32, target_std: f32) -> Self {
        Self::with_time_window(0.0, target_mean, target_std)
    }

    /// Normalizer with the given time window in seconds; `<= 0` selects infinite mode
    pub fn with_time_window(seconds: f64, target_mean: f32, target_std: f32) -> Self {
        let mut normalizer = Self {
            decay: DecayConfig::from_window(seconds),
            alpha_policy: AlphaPolicy::default(),
            seed_policy: SeedPolicy::default(),
            target_mean,
            target_std: target_std.abs(),
            do_clamp: true,
            clamp_sigmas: DEFAULT_CLAMP_SIGMAS,
            m1: 0.0,
            m2: 0.0,
            y: target_mean,
            n: SampleCounter::default(),
        };
        normalizer.init_states();
        normalizer
    }

    /// Use a different EMA coefficient policy
    pub fn with_alpha_policy(mut self, policy: AlphaPolicy) -> Self {
        self.alpha_policy = policy;
        self
    }

    /// Use a different finite-window seeding policy
    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    pub fn alpha_policy(&self) -> AlphaPolicy {
        self.alpha_policy
    }

    pub fn set_alpha_policy(&mut self, policy: AlphaPolicy) {
        self.alpha_policy = policy;
    }

    pub fn seed_policy(&self) -> SeedPolicy {
        self.seed_policy
    }

    pub fn set_seed_policy(&mut self, policy: SeedPolicy) {
        self.seed_policy = policy;
    }

    // ---- Targets ----

    pub fn set_target_mean(&mut self, mean: f32) {
        self.target_mean = mean;
    }

    pub fn target_mean(&self) -> f32 {
        self.target_mean
    }

    pub fn set_target_std_dev(&mut self, std_dev: f32) {
        self.target_std = std_dev.abs();
    }

    pub fn target_std_dev(&self) -> f32 {
        self.target_std
    }

    // ---- Clamp ----

    /// Clamp output to `target_mean ± n_std_dev · target_std`
    pub fn set_clamp(&mut self, n_std_dev: f32) {
        self.do_clamp = true;
        self.clamp_sigmas = n_std_dev.abs();
    }

    pub fn no_clamp(&mut self) {
        self.do_clamp = false;
    }

    pub fn is_clamped(&self) -> bool {
        self.do_clamp
    }

    pub fn clamp_sigmas(&self) -> f32 {
        self.clamp_sigmas
    }

    // ---- Statistics ----

    /// Running mean of the input
    pub fn mean(&self) -> f32 {
        self.m1
    }

    /// Running variance of the input, never negative
    pub fn variance(&self) -> f32 {
        (self.m2 - self.m1 * self.m1).max(0.0)
    }

    /// Running standard deviation of the input
    pub fn stddev(&self) -> f32 {
        let variance = self.variance();
        if variance > 0.0 {
            variance.sqrt()
        } else {
            0.0
        }
    }

    /// Whether `value` lies at least `n_std_dev` standard deviations away from
    /// the running mean, measured in raw signal space
    pub fn is_outlier(&self, value: f32, n_std_dev: f32) -> bool {
        let sd = self.stddev();
        if !(sd > 0.0) {
            return false;
        }
        (value - self.m1).abs() >= n_std_dev.abs() * sd
    }

    /// Lower outlier bound in output space
    pub fn low_outlier_threshold(&self, n_std_dev: f32) -> f32 {
        self.target_mean - n_std_dev.abs() * self.target_std
    }

    /// Upper outlier bound in output space
    pub fn high_outlier_threshold(&self, n_std_dev: f32) -> f32 {
        self.target_mean + n_std_dev.abs() * self.target_std
    }

    /// Coefficient of variation of the input, see [`adaptive_cv`]
    pub fn coefficient_of_variation(&self, sensitivity: f32) -> f32 {
        adaptive_cv(self.mean(), self.stddev(), CV_EPSILON, sensitivity)
    }

    /// Samples seen since the last reset
    pub fn sample_count(&self) -> u32 {
        self.n.get()
    }

    // ---- Helpers ----

    fn init_states(&mut self) {
        self.m1 = 0.0;
        self.m2 = 0.0;
        self.y = self.target_mean;
    }

    fn update_stats(&mut self, x: f32, dt_seconds: f64) {
        let squared = x * x;
        if !squared.is_finite() {
            tracing::debug!(x, "sample out of range for the second moment, skipped");
            return;
        }

        // First sample after reset / reseed
        if self.n.is_zero() {
            if self.decay.is_infinite() || self.seed_policy == SeedPolicy::FirstSample {
                self.m1 = x;
                self.m2 = squared;
            } else {
                self.m1 = self.target_mean;
                self.m2 = self.target_mean * self.target_mean + self.target_std * self.target_std;
            }
            self.n.increment();
            return;
        }

        let alpha = self.alpha_policy.alpha(&self.decay, self.n.get(), dt_seconds);

        let (m1, m2) = (self.m1, self.m2);
        ema_update(&mut self.m1, x, alpha);
        ema_update(&mut self.m2, squared, alpha);
        if !(self.m1.is_finite() && self.m2.is_finite()) {
            self.m1 = m1;
            self.m2 = m2;
            return;
        }

        self.n.increment();
    }

    fn finalize(&mut self, x: f32) -> f32 {
        let sd = self.stddev();
        let z = if sd > MIN_STD_DEV {
            (x - self.m1) / sd
        } else {
            0.0
        };

        let mut y = self.target_mean + z * self.target_std;

        if self.do_clamp {
            let radius = self.clamp_sigmas * self.target_std;
            y = y.clamp(self.target_mean - radius, self.target_mean + radius);
        }

        self.y = y;
        self.y
    }
}

impl AdaptiveEstimator for Normalizer {
    fn put(&mut self, x: f32, dt_seconds: f64) -> f32 {
        if !x.is_finite() {
            return self.y;
        }
        self.update_stats(x, dt_seconds);
        self.finalize(x)
    }

    fn reset(&mut self) {
        self.n.reset();
        self.init_states();
    }

    fn set_time_window(&mut self, seconds: f64) {
        if self.decay.set_window(seconds) {
            tracing::debug!("normalizer switched to infinite window, reseeding");
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
        self.y
    }
}

/// Coefficient of variation that stays bounded near a zero-crossing mean.
///
/// Classic `sd / |mean|` while `|mean| >= rel·sd + eps`; otherwise `sd / rms`
/// with `rms = sqrt(sd² + mean²)`, which lies in [0, 1].
pub fn adaptive_cv(mean: f32, sd: f32, eps: f32, rel: f32) -> f32 {
    if !(sd > 0.0) {
        return 0.0;
    }

    let abs_mean = mean.abs();
    if abs_mean >= rel * sd + eps {
        return sd / abs_mean;
    }

    let rms = (sd * sd + mean * mean).sqrt();
    if !(rms > 0.0) {
        return 0.0;
    }
    sd / rms
}
