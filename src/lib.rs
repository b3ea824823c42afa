//! Synheart Flux signals - Adaptive streaming statistics for real-time control signals
//!
//! Flux turns a raw stream of samples into stable control values through small,
//! allocation-free estimators updated one sample at a time:
//! running min/max scaling → quantile scaling → z-score normalization
//! → peak detection → rate of change → smoothing.
//!
//! ## Modules
//!
//! - **Estimators**: [`MinMaxScaler`], [`QuantileScaler`], [`Normalizer`],
//!   [`PeakDetector`], [`RateOfChange`], [`Smoother`]
//! - **Processors**: per-stream wrappers that take the full parameter set on
//!   every tick and apply changes as they happen
//! - **Pipeline**: [`SignalProcessor`], JSON configuration, record timing and
//!   state persistence, exposed over a C ABI and the `flux` CLI

pub mod config;
pub mod ema;
pub mod error;
pub mod estimator;
pub mod helpers;
pub mod min_max;
pub mod normalizer;
pub mod peak;
pub mod pipeline;
pub mod processors;
pub mod quantile;
pub mod rate_of_change;
pub mod smoother;
pub mod types;
pub mod watcher;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{PipelineConfig, ProcessorConfig, ProcessorKind};
pub use error::FluxError;
pub use estimator::AdaptiveEstimator;
pub use pipeline::SignalProcessor;

// Estimator exports
pub use min_max::MinMaxScaler;
pub use normalizer::Normalizer;
pub use peak::{PeakDetector, PeakMode};
pub use quantile::QuantileScaler;
pub use rate_of_change::{RateOfChange, RateUnit, WindowMode};
pub use smoother::Smoother;

/// Flux version recorded in saved processor state
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");
