//! Rate-of-change processor

use serde::{Deserialize, Serialize};

use crate::config::RateOfChangeParams;
use crate::rate_of_change::{RateOfChange, WindowMode};
use crate::types::{RateOfChangeOutput, Tick};
use crate::watcher::ParameterWatcher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOfChangeProcessor {
    roc: RateOfChange,
    mode_watch: ParameterWatcher<WindowMode>,
    count_watch: ParameterWatcher<usize>,
    window_watch: ParameterWatcher<f64>,
}

impl RateOfChangeProcessor {
    pub fn new(params: &RateOfChangeParams) -> Self {
        let mut roc = match params.window_mode {
            WindowMode::SampleCount => RateOfChange::with_sample_count(params.sample_count),
            WindowMode::TimeWindow => RateOfChange::with_time_window(params.time_window),
        };
        roc.set_sample_count(params.sample_count);
        roc.set_time_window(params.time_window);

        Self {
            roc,
            mode_watch: ParameterWatcher::primed(params.window_mode),
            count_watch: ParameterWatcher::primed(params.sample_count),
            window_watch: ParameterWatcher::primed(params.time_window),
        }
    }

    pub fn rate_of_change(&self) -> &RateOfChange {
        &self.roc
    }

    /// Process one host block; any non-negative block length is accepted
    pub fn process_tick(
        &mut self,
        params: &RateOfChangeParams,
        input: Option<f32>,
        tick: Tick,
    ) -> RateOfChangeOutput {
        self.process(params, input, tick.dt())
    }

    /// Without input the last value is held so the window keeps advancing
    pub fn process(
        &mut self,
        params: &RateOfChangeParams,
        input: Option<f32>,
        dt: f64,
    ) -> RateOfChangeOutput {
        self.apply_params(params);

        match input {
            Some(x) => self.roc.put(x, dt),
            None => self.roc.hold(dt),
        };

        RateOfChangeOutput {
            rate: self.roc.delta_per(params.units),
            samples: self.roc.len(),
            window_span: self.roc.window_span(),
        }
    }

    pub fn reset(&mut self) {
        self.roc.reset();
    }

    fn apply_params(&mut self, params: &RateOfChangeParams) {
        if self.count_watch.changed(&params.sample_count) {
            self.roc.set_sample_count(params.sample_count);
        }
        if self.window_watch.changed(&params.time_window) {
            self.roc.set_time_window(params.time_window);
        }
        if self.mode_watch.changed(&params.window_mode) {
            self.roc.set_window_mode(params.window_mode);
        }
    }
}
