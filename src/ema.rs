//! Exponential moving average helpers
//!
//! Every estimator in this crate keeps its running statistics with the same
//! update rule and derives its smoothing coefficient (alpha) from a time window,
//! the number of samples seen since the last reseed, and the elapsed time since
//! the previous sample.
//!
//! - **Infinite window** (cumulative): `alpha = 1/(n+1)`, a plain running average
//! - **Finite window**: running average during warm-up, then the EMA span formula
//!   `alpha = 2/(N+1)` with `N = tau / dt`

use serde::{Deserialize, Serialize};

/// Policy used to turn (window, sample count, dt) into an EMA coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaPolicy {
    /// Warm-up running average, then `2/(N+1)`
    #[default]
    Adaptive,
    /// `1 - exp(-dt/tau)`, exact for irregular sampling intervals
    ContinuousTime,
}

impl AlphaPolicy {
    /// Coefficient for the next update under this policy
    pub fn alpha(&self, decay: &DecayConfig, n: u32, dt_seconds: f64) -> f32 {
        match self {
            AlphaPolicy::Adaptive => {
                ema_alpha(decay.is_infinite(), decay.tau_seconds(), n, dt_seconds)
            }
            AlphaPolicy::ContinuousTime => {
                continuous_alpha(decay.is_infinite(), decay.tau_seconds(), n, dt_seconds)
            }
        }
    }
}

/// Adaptive EMA coefficient.
///
/// # Arguments
/// * `infinite` - cumulative mode, `tau_seconds` is ignored
/// * `tau_seconds` - time window in seconds
/// * `n` - samples seen since the last reset
/// * `dt_seconds` - elapsed time since the previous sample
pub fn ema_alpha(infinite: bool, tau_seconds: f64, n: u32, dt_seconds: f64) -> f32 {
    if infinite || tau_seconds < 0.0 {
        return running_average_alpha(n);
    }

    // No timing information: immediate update
    if dt_seconds <= 0.0 {
        return 1.0;
    }

    let sample_rate = (1.0 / dt_seconds) as f32;
    let target_samples = tau_seconds as f32 * sample_rate;

    if (n as f32) < target_samples - 1.0 {
        // Warm-up: behave like a running average until the window fills
        running_average_alpha(n)
    } else if target_samples > 1.0 {
        2.0 / (target_samples + 1.0)
    } else {
        // Window shorter than one sample period
        1.0
    }
}

/// Continuous-time EMA coefficient, `1 - exp(-dt/tau)`.
///
/// Infinite mode and missing timing information behave exactly like
/// [`ema_alpha`].
pub fn continuous_alpha(infinite: bool, tau_seconds: f64, n: u32, dt_seconds: f64) -> f32 {
    if infinite || tau_seconds < 0.0 {
        return running_average_alpha(n);
    }
    if !(dt_seconds > 0.0) || !dt_seconds.is_finite() || tau_seconds == 0.0 {
        return 1.0;
    }

    (1.0 - (-dt_seconds / tau_seconds).exp()) as f32
}

/// Apply one EMA step: `value <- value - alpha * (value - sample)`
#[inline]
pub fn ema_update(value: &mut f32, sample: f32, alpha: f32) {
    *value -= alpha * (*value - sample);
}

#[inline]
fn running_average_alpha(n: u32) -> f32 {
    1.0 / (n as f32 + 1.0)
}

/// Decay configuration shared by the adaptive estimators.
///
/// A window `<= 0` (or NaN) selects infinite mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    infinite: bool,
    tau_seconds: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self::infinite()
    }
}

impl DecayConfig {
    /// Cumulative mode (no forgetting)
    pub fn infinite() -> Self {
        Self {
            infinite: true,
            tau_seconds: 1.0,
        }
    }

    /// Build from a time window in seconds
    pub fn from_window(seconds: f64) -> Self {
        let mut config = Self::infinite();
        config.set_window(seconds);
        config
    }

    /// Change the time window.
    ///
    /// Returns `true` when the change switched from a finite window to the
    /// infinite one; the caller must then reseed its statistics.
    pub fn set_window(&mut self, seconds: f64) -> bool {
        let was_infinite = self.infinite;

        self.infinite = !(seconds > 0.0);
        self.tau_seconds = if self.infinite { 1.0 } else { seconds };

        !was_infinite && self.infinite
    }

    /// Time window in seconds, `0.0` when infinite
    pub fn window(&self) -> f64 {
        if self.infinite {
            0.0
        } else {
            self.tau_seconds
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    pub fn tau_seconds(&self) -> f64 {
        self.tau_seconds
    }
}

/// Saturating count of samples since the last reset or reseed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounter(u32);

impl SampleCounter {
    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_infinite_alpha_is_running_average() {
        assert_eq!(ema_alpha(true, 5.0, 0, 0.1), 1.0);
        assert_relative_eq!(ema_alpha(true, 5.0, 3, 0.1), 0.25);
        // dt is irrelevant in cumulative mode
        assert_relative_eq!(ema_alpha(true, 5.0, 3, 0.0), 0.25);
    }

    #[test]
    fn test_finite_alpha_warmup_then_steady() {
        // tau = 1s at 10 Hz -> N = 10
        assert_eq!(ema_alpha(false, 1.0, 0, 0.1), 1.0);
        assert_relative_eq!(ema_alpha(false, 1.0, 5, 0.1), 1.0 / 6.0);
        assert_relative_eq!(ema_alpha(false, 1.0, 9, 0.1), 2.0 / 11.0, epsilon = 1e-5);
        assert_relative_eq!(ema_alpha(false, 1.0, 500, 0.1), 2.0 / 11.0, epsilon = 1e-5);
    }

    #[test]
    fn test_finite_alpha_without_timing() {
        assert_eq!(ema_alpha(false, 1.0, 7, 0.0), 1.0);
        assert_eq!(ema_alpha(false, 1.0, 7, -0.5), 1.0);
    }

    #[test]
    fn test_window_shorter_than_sample_period() {
        // N = 0.5 -> no smoothing possible
        assert_eq!(ema_alpha(false, 0.05, 0, 0.1), 1.0);
        assert_eq!(ema_alpha(false, 0.05, 10, 0.1), 1.0);
    }

    #[test]
    fn test_continuous_alpha() {
        assert_relative_eq!(
            continuous_alpha(false, 1.0, 10, 0.1),
            1.0 - (-0.1f64).exp() as f32,
            epsilon = 1e-6
        );
        assert_eq!(continuous_alpha(false, 1.0, 10, 0.0), 1.0);
        assert_relative_eq!(continuous_alpha(true, 1.0, 1, 0.1), 0.5);
    }

    #[test]
    fn test_ema_update() {
        let mut value = 10.0;
        ema_update(&mut value, 20.0, 0.25);
        assert_relative_eq!(value, 12.5);

        ema_update(&mut value, 0.0, 1.0);
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_decay_config_window_switching() {
        let mut decay = DecayConfig::from_window(2.0);
        assert!(!decay.is_infinite());
        assert_eq!(decay.window(), 2.0);

        // finite -> finite
        assert!(!decay.set_window(3.0));
        // finite -> infinite requires reseed
        assert!(decay.set_window(0.0));
        assert!(decay.is_infinite());
        assert_eq!(decay.window(), 0.0);
        // infinite -> infinite
        assert!(!decay.set_window(-1.0));
        // infinite -> finite does not
        assert!(!decay.set_window(1.0));
    }

    #[test]
    fn test_decay_config_nan_window_is_infinite() {
        let decay = DecayConfig::from_window(f64::NAN);
        assert!(decay.is_infinite());
    }

    #[test]
    fn test_sample_counter_saturates() {
        let mut n = SampleCounter(u32::MAX - 1);
        n.increment();
        n.increment();
        assert_eq!(n.get(), u32::MAX);

        n.reset();
        assert!(n.is_zero());
    }

    #[test]
    fn test_policy_dispatch() {
        let decay = DecayConfig::from_window(1.0);
        assert_relative_eq!(
            AlphaPolicy::Adaptive.alpha(&decay, 20, 0.1),
            ema_alpha(false, 1.0, 20, 0.1)
        );
        assert_relative_eq!(
            AlphaPolicy::ContinuousTime.alpha(&decay, 20, 0.1),
            continuous_alpha(false, 1.0, 20, 0.1)
        );
    }
}
