//! Common interface of the adaptive estimators
//!
//! [`MinMaxScaler`](crate::min_max::MinMaxScaler),
//! [`Normalizer`](crate::normalizer::Normalizer) and
//! [`QuantileScaler`](crate::quantile::QuantileScaler) all consume one sample
//! per tick together with the elapsed time, and share the same decay controls.

/// A single-stream estimator with infinite or time-windowed memory
pub trait AdaptiveEstimator {
    /// Push one sample and return the mapped output.
    ///
    /// `dt_seconds` is the time elapsed since the previous sample. In
    /// finite-window mode a non-positive `dt_seconds` falls back to an
    /// immediate update.
    fn put(&mut self, x: f32, dt_seconds: f64) -> f32;

    /// Clear accumulated statistics back to the pre-first-sample state
    fn reset(&mut self);

    /// Set the time window in seconds; `<= 0` selects infinite mode
    fn set_time_window(&mut self, seconds: f64);

    /// Time window in seconds, `0.0` in infinite mode
    fn time_window(&self) -> f64;

    fn time_window_is_infinite(&self) -> bool;

    /// Last output
    fn value(&self) -> f32;
}
