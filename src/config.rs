//! Processor configuration
//!
//! Parameter structs deserialize from JSON with every field optional; missing
//! fields take the defaults below. A [`PipelineConfig`] selects one processor
//! through the `"processor"` tag:
//!
//! ```json
//! {"processor": "normalization", "target_mean": 0.5, "time_window": 2.0, "sample_rate": 100.0}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ema::AlphaPolicy;
use crate::error::FluxError;
use crate::normalizer::SeedPolicy;
use crate::rate_of_change::{RateUnit, WindowMode};

/// Default interval used when a record carries no timing information (seconds)
pub const DEFAULT_FALLBACK_DT: f64 = 0.01;

fn ensure_finite_f32(name: &str, value: f32) -> Result<(), FluxError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FluxError::invalid_parameter(name, "must be finite"))
    }
}

fn ensure_finite_f64(name: &str, value: f64) -> Result<(), FluxError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FluxError::invalid_parameter(name, "must be finite"))
    }
}

/// Time window in seconds, `0` when the infinite toggle is on
fn effective_window(infinite: bool, time_window: f64) -> f64 {
    if infinite {
        0.0
    } else {
        time_window
    }
}

// ============================================================================
// Scaler
// ============================================================================

/// Scaling engine used by the scaler processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    MinMax,
    Quantile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerParams {
    pub mode: ScaleMode,
    /// Memory of the running statistics (seconds)
    pub time_window: f64,
    /// Ignore `time_window` and accumulate forever
    pub infinite: bool,
    pub out_low: f32,
    pub out_high: f32,
    /// Central fraction of the distribution covered in quantile mode
    pub span: f32,
}

impl Default for ScalerParams {
    fn default() -> Self {
        Self {
            mode: ScaleMode::MinMax,
            time_window: 1.0,
            infinite: false,
            out_low: 0.0,
            out_high: 1.0,
            span: crate::quantile::DEFAULT_SPAN,
        }
    }
}

impl ScalerParams {
    pub fn effective_window(&self) -> f64 {
        effective_window(self.infinite, self.time_window)
    }

    pub fn validate(&self) -> Result<(), FluxError> {
        ensure_finite_f64("time_window", self.time_window)?;
        ensure_finite_f32("out_low", self.out_low)?;
        ensure_finite_f32("out_high", self.out_high)?;
        ensure_finite_f32("span", self.span)?;
        Ok(())
    }
}

// ============================================================================
// Normalization
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationParams {
    pub target_mean: f32,
    pub target_std: f32,
    pub time_window: f64,
    pub infinite: bool,
    /// Outlier distance in standard deviations
    pub outlier_threshold: f32,
    pub clamp: bool,
    /// Clamp radius in target standard deviations
    pub clamp_sigmas: f32,
    /// How large `|mean|` must be relative to the stddev for the classic CV
    pub cv_sensitivity: f32,
    pub alpha_policy: AlphaPolicy,
    pub seed_policy: SeedPolicy,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            target_mean: 0.5,
            target_std: 0.15,
            time_window: 1.0,
            infinite: false,
            outlier_threshold: 1.5,
            clamp: true,
            clamp_sigmas: 3.33,
            cv_sensitivity: 0.05,
            alpha_policy: AlphaPolicy::default(),
            seed_policy: SeedPolicy::default(),
        }
    }
}

impl NormalizationParams {
    pub fn effective_window(&self) -> f64 {
        effective_window(self.infinite, self.time_window)
    }

    pub fn validate(&self) -> Result<(), FluxError> {
        ensure_finite_f32("target_mean", self.target_mean)?;
        ensure_finite_f32("target_std", self.target_std)?;
        ensure_finite_f64("time_window", self.time_window)?;
        ensure_finite_f32("outlier_threshold", self.outlier_threshold)?;
        ensure_finite_f32("clamp_sigmas", self.clamp_sigmas)?;
        ensure_finite_f32("cv_sensitivity", self.cv_sensitivity)?;
        Ok(())
    }
}

// ============================================================================
// Peak detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakParams {
    /// Level that starts detection
    pub trigger_threshold: f32,
    /// Level the signal must pass before the next detection
    pub reload_threshold: f32,
    /// Retrace from the apex, as a fraction of apex-to-reload, confirming a peak
    pub fallback_tolerance: f32,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.5,
            reload_threshold: 0.35,
            fallback_tolerance: 0.1,
        }
    }
}

impl PeakParams {
    pub fn validate(&self) -> Result<(), FluxError> {
        ensure_finite_f32("trigger_threshold", self.trigger_threshold)?;
        ensure_finite_f32("reload_threshold", self.reload_threshold)?;
        ensure_finite_f32("fallback_tolerance", self.fallback_tolerance)?;
        Ok(())
    }
}

// ============================================================================
// Rate of change
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateOfChangeParams {
    pub window_mode: WindowMode,
    pub sample_count: usize,
    pub time_window: f64,
    pub units: RateUnit,
}

impl Default for RateOfChangeParams {
    fn default() -> Self {
        Self {
            window_mode: WindowMode::SampleCount,
            sample_count: crate::rate_of_change::DEFAULT_SAMPLE_COUNT,
            time_window: crate::rate_of_change::DEFAULT_TIME_WINDOW,
            units: RateUnit::PerSecond,
        }
    }
}

impl RateOfChangeParams {
    pub fn validate(&self) -> Result<(), FluxError> {
        if self.sample_count < 2 {
            return Err(FluxError::invalid_parameter(
                "sample_count",
                format!("must be at least 2, got {}", self.sample_count),
            ));
        }
        ensure_finite_f64("time_window", self.time_window)?;
        if self.time_window <= 0.0 {
            return Err(FluxError::invalid_parameter(
                "time_window",
                "must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Smoother
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherParams {
    pub alpha: f32,
    /// Time constant (seconds)
    pub tau: f32,
    /// Cutoff frequency (Hz)
    pub cutoff: f32,
    /// Running average over everything since the toggle was switched on
    pub cumulative: bool,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            tau: 1.0,
            cutoff: 2.0,
            cumulative: false,
        }
    }
}

impl SmootherParams {
    pub fn validate(&self) -> Result<(), FluxError> {
        ensure_finite_f32("alpha", self.alpha)?;
        ensure_finite_f32("cutoff", self.cutoff)?;
        // tau may be +inf (no smoothing progress), never NaN
        if self.tau.is_nan() {
            return Err(FluxError::invalid_parameter("tau", "must not be NaN"));
        }
        Ok(())
    }
}

// ============================================================================
// Processor selection
// ============================================================================

/// Processor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    Scaler,
    Normalization,
    PeakDetection,
    RateOfChange,
    Smoother,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 5] = [
        ProcessorKind::Scaler,
        ProcessorKind::Normalization,
        ProcessorKind::PeakDetection,
        ProcessorKind::RateOfChange,
        ProcessorKind::Smoother,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorKind::Scaler => "scaler",
            ProcessorKind::Normalization => "normalization",
            ProcessorKind::PeakDetection => "peak_detection",
            ProcessorKind::RateOfChange => "rate_of_change",
            ProcessorKind::Smoother => "smoother",
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorKind {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FluxError::UnknownProcessor(s.to_string()))
    }
}

/// Parameters of one processor, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "processor", rename_all = "snake_case")]
pub enum ProcessorConfig {
    Scaler(ScalerParams),
    Normalization(NormalizationParams),
    PeakDetection(PeakParams),
    RateOfChange(RateOfChangeParams),
    Smoother(SmootherParams),
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig::Scaler(ScalerParams::default())
    }
}

impl ProcessorConfig {
    /// Default parameters for a processor kind
    pub fn default_for(kind: ProcessorKind) -> Self {
        match kind {
            ProcessorKind::Scaler => ProcessorConfig::Scaler(ScalerParams::default()),
            ProcessorKind::Normalization => {
                ProcessorConfig::Normalization(NormalizationParams::default())
            }
            ProcessorKind::PeakDetection => ProcessorConfig::PeakDetection(PeakParams::default()),
            ProcessorKind::RateOfChange => {
                ProcessorConfig::RateOfChange(RateOfChangeParams::default())
            }
            ProcessorKind::Smoother => ProcessorConfig::Smoother(SmootherParams::default()),
        }
    }

    pub fn kind(&self) -> ProcessorKind {
        match self {
            ProcessorConfig::Scaler(_) => ProcessorKind::Scaler,
            ProcessorConfig::Normalization(_) => ProcessorKind::Normalization,
            ProcessorConfig::PeakDetection(_) => ProcessorKind::PeakDetection,
            ProcessorConfig::RateOfChange(_) => ProcessorKind::RateOfChange,
            ProcessorConfig::Smoother(_) => ProcessorKind::Smoother,
        }
    }

    pub fn validate(&self) -> Result<(), FluxError> {
        match self {
            ProcessorConfig::Scaler(p) => p.validate(),
            ProcessorConfig::Normalization(p) => p.validate(),
            ProcessorConfig::PeakDetection(p) => p.validate(),
            ProcessorConfig::RateOfChange(p) => p.validate(),
            ProcessorConfig::Smoother(p) => p.validate(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Processor selection plus stream timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub processor: ProcessorConfig,
    /// Host sample rate (Hz) used to turn `frames` into a time step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    /// Time step used when a record has no timing information (seconds)
    #[serde(default = "default_fallback_dt")]
    pub fallback_dt: f64,
}

fn default_fallback_dt() -> f64 {
    DEFAULT_FALLBACK_DT
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl PipelineConfig {
    pub fn new(processor: ProcessorConfig) -> Self {
        Self {
            processor,
            sample_rate: None,
            fallback_dt: DEFAULT_FALLBACK_DT,
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, FluxError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), FluxError> {
        self.processor.validate()?;

        if let Some(rate) = self.sample_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(FluxError::invalid_parameter(
                    "sample_rate",
                    format!("must be a non-negative finite number, got {rate}"),
                ));
            }
        }

        ensure_finite_f64("fallback_dt", self.fallback_dt)?;
        if self.fallback_dt < 0.0 {
            return Err(FluxError::invalid_parameter(
                "fallback_dt",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = PipelineConfig::from_json(r#"{"processor": "normalization"}"#).unwrap();

        assert_eq!(
            config,
            PipelineConfig::new(ProcessorConfig::Normalization(NormalizationParams::default()))
        );
        assert_eq!(config.fallback_dt, DEFAULT_FALLBACK_DT);
    }

    #[test]
    fn test_partial_params_override() {
        let config = PipelineConfig::from_json(
            r#"{"processor": "scaler", "mode": "quantile", "span": 0.9, "sample_rate": 100.0}"#,
        )
        .unwrap();

        let expected = ScalerParams {
            mode: ScaleMode::Quantile,
            span: 0.9,
            ..ScalerParams::default()
        };
        assert_eq!(config.processor, ProcessorConfig::Scaler(expected));
        assert_eq!(config.sample_rate, Some(100.0));
    }

    #[test]
    fn test_enum_params_deserialize() {
        let config = PipelineConfig::from_json(
            r#"{"processor": "rate_of_change", "window_mode": "time_window", "units": "per_minute"}"#,
        )
        .unwrap();

        match config.processor {
            ProcessorConfig::RateOfChange(p) => {
                assert_eq!(p.window_mode, WindowMode::TimeWindow);
                assert_eq!(p.units, RateUnit::PerMinute);
                assert_eq!(p.sample_count, 50);
            }
            other => panic!("unexpected processor: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_processor_rejected() {
        let result = PipelineConfig::from_json(r#"{"processor": "fft"}"#);
        assert!(matches!(result, Err(FluxError::JsonError(_))));

        let kind = "fft".parse::<ProcessorKind>();
        assert!(matches!(kind, Err(FluxError::UnknownProcessor(_))));
    }

    #[test]
    fn test_validation_errors() {
        let result = PipelineConfig::from_json(r#"{"processor": "rate_of_change", "sample_count": 1}"#);
        assert!(matches!(
            result,
            Err(FluxError::InvalidParameter { ref name, .. }) if name == "sample_count"
        ));

        let result = PipelineConfig::from_json(r#"{"processor": "scaler", "sample_rate": -1.0}"#);
        assert!(matches!(
            result,
            Err(FluxError::InvalidParameter { ref name, .. }) if name == "sample_rate"
        ));

        let params = NormalizationParams {
            target_std: f32::NAN,
            ..NormalizationParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in ProcessorKind::ALL {
            assert_eq!(kind.as_str().parse::<ProcessorKind>().unwrap(), kind);
            assert_eq!(ProcessorConfig::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_to_json_is_tagged() {
        let config = PipelineConfig::new(ProcessorConfig::default_for(ProcessorKind::PeakDetection));
        let value: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

        assert_eq!(value["processor"], "peak_detection");
        assert_eq!(value["trigger_threshold"], 0.5);
        assert!(value.get("sample_rate").is_none());
    }

    #[test]
    fn test_effective_window() {
        let params = ScalerParams {
            infinite: true,
            ..ScalerParams::default()
        };
        assert_eq!(params.effective_window(), 0.0);
        assert_eq!(ScalerParams::default().effective_window(), 1.0);
    }
}
