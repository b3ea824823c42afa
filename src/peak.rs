//! Threshold based peak detection
//!
//! A [`PeakDetector`] watches a (preferably normalized and smoothed) signal and
//! reports a single-tick event when one of four shapes is recognized:
//!
//! - **Rising**: the signal crosses the trigger threshold upward
//! - **Falling**: the signal crosses the trigger threshold downward
//! - **Max**: an apex above the trigger threshold, confirmed once the signal
//!   has retraced by the fallback tolerance
//! - **Min**: the mirror of max for valleys below the trigger threshold
//!
//! After an event the detector must see the signal come back past the reload
//! threshold before it can fire again (hysteresis).
//!
//! Falling and min detection run on the negated signal; the hysteresis band
//! `trigger - reload` is mirrored around the trigger threshold so one set of
//! thresholds configures all four modes.

use serde::{Deserialize, Serialize};

/// Default fallback tolerance, as a fraction of the apex-to-reload distance
pub const DEFAULT_FALLBACK_TOLERANCE: f32 = 0.1;

/// Shape recognized by a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakMode {
    #[default]
    Max,
    Min,
    Rising,
    Falling,
}

impl PeakMode {
    /// All modes, in output order
    pub const ALL: [PeakMode; 4] = [
        PeakMode::Max,
        PeakMode::Min,
        PeakMode::Rising,
        PeakMode::Falling,
    ];

    /// Whether detection happens on the negated signal
    pub fn is_inverted(&self) -> bool {
        matches!(self, PeakMode::Min | PeakMode::Falling)
    }

    /// Whether the event is a threshold crossing rather than an apex
    pub fn is_crossing(&self) -> bool {
        matches!(self, PeakMode::Rising | PeakMode::Falling)
    }
}

/// Detector state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PeakState {
    /// Waiting for the signal to pass the reload threshold
    AwaitingReload,
    /// Ready to trigger
    Idle,
    /// Above the trigger threshold, tracking the extreme (oriented space)
    Armed { extreme: f32 },
}

/// Single-mode peak detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetector {
    mode: PeakMode,
    trigger_threshold: f32,
    reload_threshold: f32,
    fallback_tolerance: f32,
    state: PeakState,
}

impl PeakDetector {
    /// Detector with `reload = trigger` and the default fallback tolerance
    pub fn new(trigger_threshold: f32, mode: PeakMode) -> Self {
        Self {
            mode,
            trigger_threshold,
            reload_threshold: trigger_threshold,
            fallback_tolerance: DEFAULT_FALLBACK_TOLERANCE,
            state: PeakState::AwaitingReload,
        }
    }

    pub fn mode(&self) -> PeakMode {
        self.mode
    }

    /// Change the detection mode; restarts the state machine
    pub fn set_mode(&mut self, mode: PeakMode) {
        if mode != self.mode {
            self.mode = mode;
            self.reset();
        }
    }

    pub fn trigger_threshold(&self) -> f32 {
        self.trigger_threshold
    }

    pub fn set_trigger_threshold(&mut self, threshold: f32) {
        self.trigger_threshold = threshold;
    }

    pub fn reload_threshold(&self) -> f32 {
        self.reload_threshold
    }

    pub fn set_reload_threshold(&mut self, threshold: f32) {
        self.reload_threshold = threshold;
    }

    pub fn fallback_tolerance(&self) -> f32 {
        self.fallback_tolerance
    }

    /// Clamped to [0, 1]
    pub fn set_fallback_tolerance(&mut self, tolerance: f32) {
        self.fallback_tolerance = if tolerance.is_nan() {
            DEFAULT_FALLBACK_TOLERANCE
        } else {
            tolerance.clamp(0.0, 1.0)
        };
    }

    pub fn state(&self) -> PeakState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = PeakState::AwaitingReload;
    }

    /// Feed one sample; returns `true` on the tick an event is detected
    pub fn put(&mut self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }

        let sign = if self.mode.is_inverted() { -1.0 } else { 1.0 };
        let v = sign * value;
        let trigger = sign * self.trigger_threshold;
        let band = (self.trigger_threshold - self.reload_threshold).max(0.0);
        let reload = trigger - band;

        match self.state {
            PeakState::AwaitingReload => {
                if v < reload {
                    self.state = PeakState::Idle;
                }
                false
            }
            PeakState::Idle => {
                if v < trigger {
                    return false;
                }
                if self.mode.is_crossing() {
                    self.state = PeakState::AwaitingReload;
                    true
                } else {
                    self.state = PeakState::Armed { extreme: v };
                    false
                }
            }
            PeakState::Armed { extreme } => {
                let extreme = extreme.max(v);
                let confirm_level = extreme - self.fallback_tolerance * (extreme - reload);
                if v < extreme && v <= confirm_level {
                    self.state = PeakState::AwaitingReload;
                    true
                } else {
                    self.state = PeakState::Armed { extreme };
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(mode: PeakMode) -> PeakDetector {
        let mut det = PeakDetector::new(0.5, mode);
        det.set_reload_threshold(0.35);
        det.set_fallback_tolerance(0.1);
        det
    }

    fn events(det: &mut PeakDetector, signal: &[f32]) -> Vec<usize> {
        signal
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| det.put(x).then_some(i))
            .collect()
    }

    #[test]
    fn test_no_event_on_first_tick_above_trigger() {
        let mut det = detector(PeakMode::Rising);
        assert!(!det.put(0.9));
        assert!(!det.put(0.9));
        assert_eq!(det.state(), PeakState::AwaitingReload);
    }

    #[test]
    fn test_rising_with_hysteresis() {
        let mut det = detector(PeakMode::Rising);
        // Dips to 0.4 do not reload (band is 0.35..0.5)
        let signal = [0.0, 0.6, 0.4, 0.6, 0.2, 0.7];
        assert_eq!(events(&mut det, &signal), vec![1, 5]);
    }

    #[test]
    fn test_falling_mirrors_band() {
        let mut det = detector(PeakMode::Falling);
        // Reload above 0.65, trigger at or below 0.5
        let signal = [1.0, 0.4, 0.6, 0.3, 0.8, 0.5];
        assert_eq!(events(&mut det, &signal), vec![1, 5]);
    }

    #[test]
    fn test_max_fires_after_retrace() {
        let mut det = detector(PeakMode::Max);
        // apex 1.0, confirm at 1.0 - 0.1 * 0.65 = 0.935
        let signal = [0.0, 0.6, 0.9, 1.0, 0.95, 0.93, 0.8];
        assert_eq!(events(&mut det, &signal), vec![5]);
    }

    #[test]
    fn test_min_fires_after_retrace() {
        let mut det = detector(PeakMode::Min);
        // valley 0.0, confirm at 0.065
        let signal = [1.0, 0.4, 0.1, 0.0, 0.05, 0.07, 0.2];
        assert_eq!(events(&mut det, &signal), vec![5]);
    }

    #[test]
    fn test_max_needs_reload_between_peaks() {
        let mut det = detector(PeakMode::Max);
        let signal = [0.0, 0.9, 0.5, 0.9, 0.5, 0.1, 0.9, 0.5];
        assert_eq!(events(&mut det, &signal), vec![2, 7]);
    }

    #[test]
    fn test_zero_tolerance_fires_on_first_decrease() {
        let mut det = detector(PeakMode::Max);
        det.set_fallback_tolerance(0.0);
        let signal = [0.0, 0.6, 0.7, 0.7, 0.69];
        assert_eq!(events(&mut det, &signal), vec![4]);
    }

    #[test]
    fn test_fallback_tolerance_clamped() {
        let mut det = detector(PeakMode::Max);
        det.set_fallback_tolerance(4.0);
        assert_eq!(det.fallback_tolerance(), 1.0);
        det.set_fallback_tolerance(-1.0);
        assert_eq!(det.fallback_tolerance(), 0.0);
    }

    #[test]
    fn test_set_mode_resets() {
        let mut det = detector(PeakMode::Max);
        det.put(0.0);
        det.put(0.8);
        assert!(matches!(det.state(), PeakState::Armed { .. }));

        det.set_mode(PeakMode::Rising);
        assert_eq!(det.state(), PeakState::AwaitingReload);
    }

    #[test]
    fn test_non_finite_input_ignored() {
        let mut det = detector(PeakMode::Rising);
        det.put(0.0);
        assert!(!det.put(f32::NAN));
        assert_eq!(det.state(), PeakState::Idle);
    }
}
