//! Peak detection processor: four detectors sharing one set of thresholds

use serde::{Deserialize, Serialize};

use crate::config::PeakParams;
use crate::peak::{PeakDetector, PeakMode};
use crate::types::PeakEvents;
use crate::watcher::ParameterWatcher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetectionProcessor {
    /// Indexed in [`PeakMode::ALL`] order
    detectors: [PeakDetector; 4],
    trigger_watch: ParameterWatcher<f32>,
    reload_watch: ParameterWatcher<f32>,
    fallback_watch: ParameterWatcher<f32>,
}

impl PeakDetectionProcessor {
    pub fn new(params: &PeakParams) -> Self {
        let mut processor = Self {
            detectors: PeakMode::ALL.map(|mode| PeakDetector::new(params.trigger_threshold, mode)),
            trigger_watch: ParameterWatcher::new(),
            reload_watch: ParameterWatcher::new(),
            fallback_watch: ParameterWatcher::new(),
        };
        processor.apply_params(params);
        processor
    }

    pub fn detector(&self, mode: PeakMode) -> &PeakDetector {
        &self.detectors[Self::index(mode)]
    }

    /// Feed one sample to every detector.
    ///
    /// No input means no event; the detectors keep their state.
    pub fn process(&mut self, params: &PeakParams, input: Option<f32>) -> PeakEvents {
        self.apply_params(params);

        let Some(x) = input else {
            return PeakEvents::default();
        };

        let mut fired = [false; 4];
        for (flag, detector) in fired.iter_mut().zip(self.detectors.iter_mut()) {
            *flag = detector.put(x);
        }

        PeakEvents {
            peak_max: fired[Self::index(PeakMode::Max)],
            peak_min: fired[Self::index(PeakMode::Min)],
            peak_rising: fired[Self::index(PeakMode::Rising)],
            peak_falling: fired[Self::index(PeakMode::Falling)],
        }
    }

    pub fn reset(&mut self) {
        for detector in &mut self.detectors {
            detector.reset();
        }
    }

    fn index(mode: PeakMode) -> usize {
        match mode {
            PeakMode::Max => 0,
            PeakMode::Min => 1,
            PeakMode::Rising => 2,
            PeakMode::Falling => 3,
        }
    }

    fn apply_params(&mut self, params: &PeakParams) {
        if self.trigger_watch.changed(&params.trigger_threshold) {
            for detector in &mut self.detectors {
                detector.set_trigger_threshold(params.trigger_threshold);
            }
        }
        if self.reload_watch.changed(&params.reload_threshold) {
            for detector in &mut self.detectors {
                detector.set_reload_threshold(params.reload_threshold);
            }
        }
        if self.fallback_watch.changed(&params.fallback_tolerance) {
            for detector in &mut self.detectors {
                detector.set_fallback_tolerance(params.fallback_tolerance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sine(t: f64) -> f32 {
        (0.5 - 0.5 * (2.0 * std::f64::consts::PI * t).cos()) as f32
    }

    fn labels(events: &PeakEvents) -> Vec<&'static str> {
        let mut out = Vec::new();
        if events.peak_rising {
            out.push("rising");
        }
        if events.peak_max {
            out.push("max");
        }
        if events.peak_falling {
            out.push("falling");
        }
        if events.peak_min {
            out.push("min");
        }
        out
    }

    #[test]
    fn test_sine_event_order() {
        let params = PeakParams::default();
        let mut processor = PeakDetectionProcessor::new(&params);

        let mut sequence = Vec::new();
        for k in 0..220 {
            let t = (k as f64 + 0.5) * 0.01;
            let events = processor.process(&params, Some(sine(t)));
            sequence.extend(labels(&events));
        }

        assert_eq!(
            sequence,
            vec!["rising", "max", "falling", "min", "rising", "max", "falling", "min"]
        );
    }

    #[test]
    fn test_params_propagate_to_all_detectors() {
        let mut params = PeakParams::default();
        let mut processor = PeakDetectionProcessor::new(&params);
        for mode in PeakMode::ALL {
            assert_eq!(processor.detector(mode).reload_threshold(), 0.35);
            assert_eq!(processor.detector(mode).mode(), mode);
        }

        params.trigger_threshold = 0.7;
        params.fallback_tolerance = 2.0;
        processor.process(&params, None);
        for mode in PeakMode::ALL {
            assert_eq!(processor.detector(mode).trigger_threshold(), 0.7);
            assert_eq!(processor.detector(mode).fallback_tolerance(), 1.0);
        }
    }

    #[test]
    fn test_missing_input_emits_nothing() {
        let params = PeakParams::default();
        let mut processor = PeakDetectionProcessor::new(&params);
        processor.process(&params, Some(0.0));
        assert_eq!(processor.process(&params, None), PeakEvents::default());
        // Detectors were not disturbed: the next crossing still fires
        assert!(processor.process(&params, Some(0.9)).peak_rising);
    }
}
