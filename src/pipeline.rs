//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Flux signals. A
//! [`SignalProcessor`] owns one configured processor, resolves the time step of
//! each incoming record and can persist its full state as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{
    NormalizationParams, PeakParams, PipelineConfig, ProcessorConfig, ProcessorKind,
    RateOfChangeParams, ScalerParams, SmootherParams,
};
use crate::error::FluxError;
use crate::processors::{
    NormalizationProcessor, PeakDetectionProcessor, RateOfChangeProcessor, ScalerProcessor,
    SmootherProcessor,
};
use crate::types::{ProcessorOutput, SampleClock, StreamRecord, Tick, TimeStep};

/// A processor together with the parameters it is driven with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "processor", rename_all = "snake_case")]
pub enum ProcessorEngine {
    Scaler {
        params: ScalerParams,
        state: ScalerProcessor,
    },
    Normalization {
        params: NormalizationParams,
        state: NormalizationProcessor,
    },
    PeakDetection {
        params: PeakParams,
        state: PeakDetectionProcessor,
    },
    RateOfChange {
        params: RateOfChangeParams,
        state: RateOfChangeProcessor,
    },
    Smoother {
        params: SmootherParams,
        state: SmootherProcessor,
    },
}

impl ProcessorEngine {
    pub fn new(config: ProcessorConfig) -> Self {
        match config {
            ProcessorConfig::Scaler(params) => ProcessorEngine::Scaler {
                state: ScalerProcessor::new(&params),
                params,
            },
            ProcessorConfig::Normalization(params) => ProcessorEngine::Normalization {
                state: NormalizationProcessor::new(&params),
                params,
            },
            ProcessorConfig::PeakDetection(params) => ProcessorEngine::PeakDetection {
                state: PeakDetectionProcessor::new(&params),
                params,
            },
            ProcessorConfig::RateOfChange(params) => ProcessorEngine::RateOfChange {
                state: RateOfChangeProcessor::new(&params),
                params,
            },
            ProcessorConfig::Smoother(params) => ProcessorEngine::Smoother {
                state: SmootherProcessor::new(&params),
                params,
            },
        }
    }

    pub fn kind(&self) -> ProcessorKind {
        match self {
            ProcessorEngine::Scaler { .. } => ProcessorKind::Scaler,
            ProcessorEngine::Normalization { .. } => ProcessorKind::Normalization,
            ProcessorEngine::PeakDetection { .. } => ProcessorKind::PeakDetection,
            ProcessorEngine::RateOfChange { .. } => ProcessorKind::RateOfChange,
            ProcessorEngine::Smoother { .. } => ProcessorKind::Smoother,
        }
    }

    /// Current parameters
    pub fn config(&self) -> ProcessorConfig {
        match self {
            ProcessorEngine::Scaler { params, .. } => ProcessorConfig::Scaler(params.clone()),
            ProcessorEngine::Normalization { params, .. } => {
                ProcessorConfig::Normalization(params.clone())
            }
            ProcessorEngine::PeakDetection { params, .. } => {
                ProcessorConfig::PeakDetection(params.clone())
            }
            ProcessorEngine::RateOfChange { params, .. } => {
                ProcessorConfig::RateOfChange(params.clone())
            }
            ProcessorEngine::Smoother { params, .. } => ProcessorConfig::Smoother(params.clone()),
        }
    }

    /// Replace the parameters of a processor of the same kind, keeping its
    /// state; a different kind starts a fresh processor
    pub fn reconfigure(&mut self, config: ProcessorConfig) {
        match (self, config) {
            (ProcessorEngine::Scaler { params, .. }, ProcessorConfig::Scaler(new)) => *params = new,
            (ProcessorEngine::Normalization { params, .. }, ProcessorConfig::Normalization(new)) => {
                *params = new
            }
            (ProcessorEngine::PeakDetection { params, .. }, ProcessorConfig::PeakDetection(new)) => {
                *params = new
            }
            (ProcessorEngine::RateOfChange { params, .. }, ProcessorConfig::RateOfChange(new)) => {
                *params = new
            }
            (ProcessorEngine::Smoother { params, .. }, ProcessorConfig::Smoother(new)) => {
                *params = new
            }
            (engine, config) => {
                tracing::debug!(from = %engine.kind(), to = %config.kind(), "switching processor");
                *engine = ProcessorEngine::new(config);
            }
        }
    }

    /// Run one tick
    pub fn process(&mut self, input: Option<f32>, step: TimeStep) -> ProcessorOutput {
        match self {
            ProcessorEngine::Scaler { params, state } => ProcessorOutput::Scaler(match step {
                TimeStep::Seconds(dt) => state.process(params, input, dt),
                TimeStep::Tick(tick) => state.process_tick(params, input, tick),
            }),
            ProcessorEngine::Normalization { params, state } => {
                ProcessorOutput::Normalization(match step {
                    TimeStep::Seconds(dt) => state.process(params, input, dt),
                    TimeStep::Tick(tick) => state.process_tick(params, input, tick),
                })
            }
            ProcessorEngine::PeakDetection { params, state } => {
                ProcessorOutput::PeakDetection(state.process(params, input))
            }
            ProcessorEngine::RateOfChange { params, state } => {
                ProcessorOutput::RateOfChange(match step {
                    TimeStep::Seconds(dt) => state.process(params, input, dt),
                    TimeStep::Tick(tick) => state.process_tick(params, input, tick),
                })
            }
            ProcessorEngine::Smoother { params, state } => ProcessorOutput::Smoother(match step {
                TimeStep::Seconds(dt) => state.process(params, input, dt),
                TimeStep::Tick(tick) => state.process_tick(params, input, tick),
            }),
        }
    }

    pub fn reset(&mut self) {
        match self {
            ProcessorEngine::Scaler { state, .. } => state.reset(),
            ProcessorEngine::Normalization { state, .. } => state.reset(),
            ProcessorEngine::PeakDetection { state, .. } => state.reset(),
            ProcessorEngine::RateOfChange { state, .. } => state.reset(),
            ProcessorEngine::Smoother { state, .. } => state.reset(),
        }
    }
}

/// Persisted processor state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorSnapshot {
    /// Crate version that wrote the snapshot
    pub flux_version: String,
    pub saved_at: DateTime<Utc>,
    pub engine: ProcessorEngine,
    pub clock: SampleClock,
}

/// Stateful processor for one signal stream.
///
/// Feed it one record per tick; state (running statistics, detector states,
/// windows) persists between calls and can be saved and restored.
#[derive(Debug, Clone)]
pub struct SignalProcessor {
    engine: ProcessorEngine,
    sample_rate: Option<f64>,
    fallback_dt: f64,
    clock: SampleClock,
}

impl SignalProcessor {
    /// Create a processor from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self, FluxError> {
        config.validate()?;
        tracing::debug!(processor = %config.processor.kind(), "creating signal processor");
        Ok(Self {
            engine: ProcessorEngine::new(config.processor),
            sample_rate: config.sample_rate,
            fallback_dt: config.fallback_dt,
            clock: SampleClock::new(),
        })
    }

    /// Create a processor from JSON configuration
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        Self::new(PipelineConfig::from_json(json)?)
    }

    /// Processor with default parameters for `kind`
    pub fn with_defaults(kind: ProcessorKind) -> Self {
        Self {
            engine: ProcessorEngine::new(ProcessorConfig::default_for(kind)),
            sample_rate: None,
            fallback_dt: crate::config::DEFAULT_FALLBACK_DT,
            clock: SampleClock::new(),
        }
    }

    pub fn kind(&self) -> ProcessorKind {
        self.engine.kind()
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            processor: self.engine.config(),
            sample_rate: self.sample_rate,
            fallback_dt: self.fallback_dt,
        }
    }

    pub fn engine(&self) -> &ProcessorEngine {
        &self.engine
    }

    /// Push one value with an explicit time step (seconds)
    pub fn put(&mut self, value: f32, dt: f64) -> ProcessorOutput {
        self.engine.process(Some(value), TimeStep::Seconds(dt))
    }

    /// Advance one tick without a new value
    pub fn hold(&mut self, dt: f64) -> ProcessorOutput {
        self.engine.process(None, TimeStep::Seconds(dt))
    }

    /// Push one value for a host block
    pub fn process_tick(&mut self, input: Option<f32>, tick: Tick) -> ProcessorOutput {
        self.engine.process(input, TimeStep::Tick(tick))
    }

    /// Process one record, deriving the time step from its timing fields
    pub fn process_record(&mut self, record: &StreamRecord) -> ProcessorOutput {
        let step = self
            .clock
            .resolve(record, self.sample_rate, self.fallback_dt);
        self.engine.process(record.value, step)
    }

    /// Process one NDJSON line and return the output as JSON
    pub fn process_json_line(&mut self, line: &str) -> Result<String, FluxError> {
        let record = StreamRecord::from_json(line)?;
        let output = self.process_record(&record);
        Ok(serde_json::to_string(&output)?)
    }

    /// Apply a new configuration.
    ///
    /// Parameters of the same processor kind take effect on the next tick
    /// without losing state; a different kind starts from scratch.
    pub fn reconfigure(&mut self, config: PipelineConfig) -> Result<(), FluxError> {
        config.validate()?;
        self.engine.reconfigure(config.processor);
        self.sample_rate = config.sample_rate;
        self.fallback_dt = config.fallback_dt;
        Ok(())
    }

    /// Clear all accumulated state, keeping the configuration
    pub fn reset(&mut self) {
        self.engine.reset();
        self.clock.reset();
    }

    /// Save processor state to JSON
    pub fn save_state(&self) -> Result<String, FluxError> {
        let snapshot = ProcessorSnapshot {
            flux_version: crate::FLUX_VERSION.to_string(),
            saved_at: Utc::now(),
            engine: self.engine.clone(),
            clock: self.clock.clone(),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// Load processor state from JSON.
    ///
    /// The snapshot must come from a processor of the same kind. Its saved
    /// parameters are replaced by the current ones, which the processor picks up
    /// as a parameter change on the next tick.
    pub fn load_state(&mut self, json: &str) -> Result<(), FluxError> {
        let snapshot: ProcessorSnapshot = serde_json::from_str(json)?;

        let found = snapshot.engine.kind();
        if found != self.kind() {
            return Err(FluxError::StateMismatch {
                expected: self.kind().to_string(),
                found: found.to_string(),
            });
        }

        let current = self.engine.config();
        let mut engine = snapshot.engine;
        engine.reconfigure(current);

        tracing::debug!(
            processor = %found,
            saved_at = %snapshot.saved_at,
            version = %snapshot.flux_version,
            "loaded processor state"
        );

        self.engine = engine;
        self.clock = snapshot.clock;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScaleMode, DEFAULT_FALLBACK_DT};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn record(value: Option<f32>) -> StreamRecord {
        StreamRecord {
            value,
            ..StreamRecord::default()
        }
    }

    #[test]
    fn test_from_json_and_put() {
        let mut processor =
            SignalProcessor::from_json(r#"{"processor": "scaler", "infinite": true}"#).unwrap();
        assert_eq!(processor.kind(), ProcessorKind::Scaler);

        let outputs: Vec<f32> = [5.0, 1.0, 9.0, 3.0]
            .iter()
            .map(|&x| processor.put(x, 1.0).primary())
            .collect();
        assert_eq!(outputs[0], 0.5);
        assert_eq!(outputs[1], 0.0);
        assert_eq!(outputs[2], 1.0);
        assert_relative_eq!(outputs[3], 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_config() {
        let result = SignalProcessor::from_json(r#"{"processor": "rate_of_change", "sample_count": 0}"#);
        assert!(result.is_err());

        let result = SignalProcessor::from_json("not valid json");
        assert!(matches!(result, Err(FluxError::JsonError(_))));
    }

    #[test]
    fn test_process_json_line() {
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::RateOfChange);
        processor.process_json_line(r#"{"value": 0.0, "dt": 0.5}"#).unwrap();
        let line = processor
            .process_json_line(r#"{"value": 1.0, "dt": 0.5}"#)
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["processor"], "rate_of_change");
        assert_eq!(value["rate"], 2.0);
        assert_eq!(value["samples"], 2);

        assert!(processor.process_json_line("{").is_err());
    }

    #[test]
    fn test_frames_use_sample_rate() {
        let config = PipelineConfig {
            sample_rate: Some(1000.0),
            ..PipelineConfig::new(ProcessorConfig::default_for(ProcessorKind::RateOfChange))
        };
        let mut processor = SignalProcessor::new(config).unwrap();

        let framed = |value| StreamRecord {
            value: Some(value),
            frames: Some(250),
            ..StreamRecord::default()
        };
        processor.process_record(&framed(0.0));
        let out = processor.process_record(&framed(1.0));
        assert_relative_eq!(out.primary(), 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_missing_timing_uses_fallback_dt() {
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::RateOfChange);
        processor.process_record(&record(Some(0.0)));
        let out = processor.process_record(&record(Some(1.0)));
        assert_relative_eq!(out.primary(), (1.0 / DEFAULT_FALLBACK_DT) as f32, epsilon = 1e-2);
    }

    #[test]
    fn test_null_value_holds() {
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::Smoother);
        processor.process_record(&record(Some(2.0)));
        let out = processor.process_record(&record(None));
        assert_eq!(out.primary(), 2.0);
    }

    #[test]
    fn test_reconfigure_same_kind_keeps_state() {
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::Scaler);
        for x in [0.0, 10.0, 5.0] {
            processor.put(x, 0.01);
        }

        let mut config = processor.config();
        if let ProcessorConfig::Scaler(params) = &mut config.processor {
            params.out_high = 100.0;
        }
        processor.reconfigure(config).unwrap();

        // Statistics survive, only the output range changed
        let out = processor.put(10.0, 0.01).primary();
        assert!(out > 1.0);
        match processor.engine() {
            ProcessorEngine::Scaler { state, .. } => {
                assert_eq!(state.min_max().sample_count(), 4);
                assert_eq!(state.mode(), ScaleMode::MinMax);
            }
            other => panic!("unexpected engine: {other:?}"),
        }
    }

    #[test]
    fn test_reconfigure_other_kind_rebuilds() {
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::Scaler);
        processor.put(1.0, 0.01);

        let config = PipelineConfig::new(ProcessorConfig::default_for(ProcessorKind::PeakDetection));
        processor.reconfigure(config).unwrap();
        assert_eq!(processor.kind(), ProcessorKind::PeakDetection);
        assert!(matches!(processor.put(0.0, 0.01), ProcessorOutput::PeakDetection(_)));
    }

    #[test]
    fn test_state_round_trip() {
        let inputs = [0.2, 0.9, 0.4, 0.7, 0.1, 0.8];
        let tail = [0.3, 0.6, 0.5];

        let mut first = SignalProcessor::with_defaults(ProcessorKind::Normalization);
        for x in inputs {
            first.put(x, 0.01);
        }
        let saved = first.save_state().unwrap();

        let mut restored = SignalProcessor::with_defaults(ProcessorKind::Normalization);
        restored.load_state(&saved).unwrap();

        for x in tail {
            assert_eq!(first.put(x, 0.01), restored.put(x, 0.01));
        }
    }

    #[test]
    fn test_state_kind_mismatch() {
        let saved = SignalProcessor::with_defaults(ProcessorKind::Smoother)
            .save_state()
            .unwrap();
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::Scaler);

        let result = processor.load_state(&saved);
        assert!(matches!(result, Err(FluxError::StateMismatch { .. })));
        assert!(processor.load_state("not json").is_err());
    }

    #[test]
    fn test_reset() {
        let mut processor = SignalProcessor::with_defaults(ProcessorKind::Scaler);
        for x in [3.0, 8.0, 1.0] {
            processor.put(x, 0.01);
        }
        processor.reset();
        assert_eq!(processor.put(42.0, 0.01).primary(), 0.5);
    }
}
