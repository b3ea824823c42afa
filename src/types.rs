//! Core types for the Synheart Flux signal pipeline
//!
//! Input records, host ticks, and the output records emitted by each processor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FluxError;

/// Upper bound of a usable control-rate interval (seconds)
pub const MAX_CONTROL_DT: f64 = 0.1;

/// One input sample of a stream.
///
/// `value: null` (or a missing value) means no new input arrived this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub value: Option<f32>,
    /// Explicit time step (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Frames elapsed since the previous tick, combined with the sample rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,
}

impl StreamRecord {
    pub fn new(value: f32, dt: f64) -> Self {
        Self {
            value: Some(value),
            dt: Some(dt),
            ..Self::default()
        }
    }

    /// Parse one NDJSON line
    pub fn from_json(line: &str) -> Result<Self, FluxError> {
        let record: StreamRecord = serde_json::from_str(line)?;
        if let Some(dt) = record.dt {
            if dt.is_nan() {
                return Err(FluxError::InvalidRecord("dt must not be NaN".to_string()));
            }
        }
        Ok(record)
    }
}

/// Host tick: a block of frames at a sample rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub frames: u32,
    pub sample_rate: f64,
}

impl Tick {
    pub fn new(frames: u32, sample_rate: f64) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    /// Block duration in seconds, `0` for an unusable sample rate
    pub fn dt(&self) -> f64 {
        if self.sample_rate > 0.0 && self.sample_rate.is_finite() {
            (self.frames as f64 / self.sample_rate).max(0.0)
        } else {
            0.0
        }
    }

    /// Block duration if it looks like a control-rate step (`0 < dt < 100 ms`),
    /// otherwise `0`
    pub fn control_dt(&self) -> f64 {
        let dt = self.dt();
        if dt > 0.0 && dt < MAX_CONTROL_DT {
            dt
        } else {
            0.0
        }
    }
}

/// Time step for a record, before processor-specific guards
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    Seconds(f64),
    Tick(Tick),
}

/// Derives the time step of successive records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleClock {
    last_timestamp: Option<DateTime<Utc>>,
}

impl SampleClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the step: explicit `dt`, then `frames` at `sample_rate`, then
    /// the timestamp difference, then `fallback_dt`
    pub fn resolve(
        &mut self,
        record: &StreamRecord,
        sample_rate: Option<f64>,
        fallback_dt: f64,
    ) -> TimeStep {
        let from_timestamp = record.timestamp.and_then(|ts| {
            let previous = self.last_timestamp.replace(ts)?;
            let seconds = (ts - previous).num_microseconds()? as f64 / 1e6;
            if seconds < 0.0 {
                tracing::warn!(%ts, %previous, "timestamp went backwards, ignoring");
                return None;
            }
            Some(seconds)
        });

        if let Some(dt) = record.dt {
            return TimeStep::Seconds(dt.max(0.0));
        }
        if let (Some(frames), Some(rate)) = (record.frames, sample_rate) {
            return TimeStep::Tick(Tick::new(frames, rate));
        }
        TimeStep::Seconds(from_timestamp.unwrap_or(fallback_dt))
    }

    pub fn reset(&mut self) {
        self.last_timestamp = None;
    }
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerOutput {
    /// Scaled value in `[out_low, out_high]`
    pub value: f32,
    /// Low end of the active engine's range (smoothed min or low quantile)
    pub range_low: f32,
    /// High end of the active engine's range
    pub range_high: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationOutput {
    pub value: f32,
    pub mean: f32,
    pub stddev: f32,
    pub outlier: bool,
    pub coefficient_of_variation: f32,
}

/// Per-tick peak events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakEvents {
    pub peak_max: bool,
    pub peak_min: bool,
    pub peak_rising: bool,
    pub peak_falling: bool,
}

impl PeakEvents {
    /// Bit mask: max = 1, min = 2, rising = 4, falling = 8
    pub fn bits(&self) -> u8 {
        (self.peak_max as u8)
            | (self.peak_min as u8) << 1
            | (self.peak_rising as u8) << 2
            | (self.peak_falling as u8) << 3
    }

    pub fn any(&self) -> bool {
        self.bits() != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOfChangeOutput {
    /// Rate in the configured unit
    pub rate: f32,
    /// Samples in the analysis window
    pub samples: usize,
    /// Time covered by the window (seconds)
    pub window_span: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmootherOutput {
    pub value: f32,
    /// Coefficient applied this tick
    pub alpha: f32,
}

/// Output of one processor tick, tagged by processor kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "processor", rename_all = "snake_case")]
pub enum ProcessorOutput {
    Scaler(ScalerOutput),
    Normalization(NormalizationOutput),
    PeakDetection(PeakEvents),
    RateOfChange(RateOfChangeOutput),
    Smoother(SmootherOutput),
}

impl ProcessorOutput {
    /// Main scalar of the output; peak events as their bit mask
    pub fn primary(&self) -> f32 {
        match self {
            ProcessorOutput::Scaler(o) => o.value,
            ProcessorOutput::Normalization(o) => o.value,
            ProcessorOutput::PeakDetection(o) => o.bits() as f32,
            ProcessorOutput::RateOfChange(o) => o.rate,
            ProcessorOutput::Smoother(o) => o.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn test_tick_dt() {
        assert_relative_eq!(Tick::new(64, 48_000.0).dt(), 64.0 / 48_000.0);
        assert_eq!(Tick::new(64, 0.0).dt(), 0.0);
        assert_eq!(Tick::new(64, f64::NAN).dt(), 0.0);
    }

    #[test]
    fn test_tick_control_dt_guard() {
        assert_relative_eq!(Tick::new(480, 48_000.0).control_dt(), 0.01);
        // 200 ms block is not a control-rate step
        assert_eq!(Tick::new(9_600, 48_000.0).control_dt(), 0.0);
        assert_eq!(Tick::new(0, 48_000.0).control_dt(), 0.0);
    }

    #[test]
    fn test_record_parsing() {
        let record = StreamRecord::from_json(r#"{"value": 1.5, "dt": 0.02}"#).unwrap();
        assert_eq!(record, StreamRecord::new(1.5, 0.02));

        let record = StreamRecord::from_json(r#"{"value": null}"#).unwrap();
        assert_eq!(record.value, None);

        let record = StreamRecord::from_json(r#"{}"#).unwrap();
        assert_eq!(record, StreamRecord::default());

        assert!(StreamRecord::from_json("not json").is_err());
    }

    #[test]
    fn test_clock_resolution_order() {
        let mut clock = SampleClock::new();

        let explicit = StreamRecord::new(1.0, 0.05);
        assert_eq!(clock.resolve(&explicit, Some(100.0), 0.01), TimeStep::Seconds(0.05));

        let framed = StreamRecord {
            value: Some(1.0),
            frames: Some(2),
            ..StreamRecord::default()
        };
        assert_eq!(
            clock.resolve(&framed, Some(100.0), 0.01),
            TimeStep::Tick(Tick::new(2, 100.0))
        );
        // No sample rate: frames are ignored
        assert_eq!(clock.resolve(&framed, None, 0.01), TimeStep::Seconds(0.01));
    }

    #[test]
    fn test_clock_timestamps() {
        let mut clock = SampleClock::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let record = |ts| StreamRecord {
            value: Some(0.0),
            timestamp: Some(ts),
            ..StreamRecord::default()
        };

        // First timestamp has no predecessor
        assert_eq!(clock.resolve(&record(t0), None, 0.01), TimeStep::Seconds(0.01));

        let t1 = t0 + chrono::Duration::milliseconds(250);
        assert_eq!(clock.resolve(&record(t1), None, 0.01), TimeStep::Seconds(0.25));

        // Going backwards falls back
        assert_eq!(clock.resolve(&record(t0), None, 0.01), TimeStep::Seconds(0.01));
    }

    #[test]
    fn test_peak_bits() {
        let events = PeakEvents {
            peak_max: true,
            peak_falling: true,
            ..PeakEvents::default()
        };
        assert_eq!(events.bits(), 0b1001);
        assert!(events.any());
        assert!(!PeakEvents::default().any());
    }

    #[test]
    fn test_output_is_tagged() {
        let output = ProcessorOutput::RateOfChange(RateOfChangeOutput {
            rate: 2.0,
            samples: 5,
            window_span: 0.4,
        });
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["processor"], "rate_of_change");
        assert_eq!(value["samples"], 5);
        assert_eq!(output.primary(), 2.0);
    }
}
