//! Per-stream processors
//!
//! A processor owns its estimators and receives the full parameter set on every
//! tick, the way a host passes knob values. Parameter changes are detected with
//! [`ParameterWatcher`](crate::watcher::ParameterWatcher)s and applied before
//! the sample is processed.
//!
//! Each processor accepts either an explicit time step in seconds
//! (`process`) or a host [`Tick`](crate::types::Tick) (`process_tick`).
//! An input of `None` means no new value arrived this tick.

pub mod normalization;
pub mod peak_detection;
pub mod rate_of_change;
pub mod scaler;
pub mod smoother;

pub use normalization::NormalizationProcessor;
pub use peak_detection::PeakDetectionProcessor;
pub use rate_of_change::RateOfChangeProcessor;
pub use scaler::ScalerProcessor;
pub use smoother::SmootherProcessor;
