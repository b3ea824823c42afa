//! Scaler processor: min-max or quantile scaling into an output range

use serde::{Deserialize, Serialize};

use crate::config::{ScaleMode, ScalerParams};
use crate::estimator::AdaptiveEstimator;
use crate::helpers::map;
use crate::min_max::MinMaxScaler;
use crate::quantile::QuantileScaler;
use crate::types::{ScalerOutput, Tick};
use crate::watcher::ParameterWatcher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerProcessor {
    min_max: MinMaxScaler,
    quantile: QuantileScaler,
    mode: ScaleMode,
    mode_watch: ParameterWatcher<ScaleMode>,
    infinite_watch: ParameterWatcher<bool>,
    window_watch: ParameterWatcher<f64>,
    span_watch: ParameterWatcher<f32>,
}

impl ScalerProcessor {
    pub fn new(params: &ScalerParams) -> Self {
        let window = params.effective_window();
        Self {
            min_max: MinMaxScaler::with_time_window(window),
            quantile: QuantileScaler::with_time_window(window, params.span),
            mode: params.mode,
            mode_watch: ParameterWatcher::primed(params.mode),
            infinite_watch: ParameterWatcher::primed(params.infinite),
            window_watch: ParameterWatcher::primed(params.time_window),
            span_watch: ParameterWatcher::primed(params.span),
        }
    }

    pub fn mode(&self) -> ScaleMode {
        self.mode
    }

    pub fn min_max(&self) -> &MinMaxScaler {
        &self.min_max
    }

    pub fn quantile(&self) -> &QuantileScaler {
        &self.quantile
    }

    /// Process one tick; `dt` comes from the host block with the control-rate guard
    pub fn process_tick(
        &mut self,
        params: &ScalerParams,
        input: Option<f32>,
        tick: Tick,
    ) -> ScalerOutput {
        self.process(params, input, tick.control_dt())
    }

    pub fn process(&mut self, params: &ScalerParams, input: Option<f32>, dt: f64) -> ScalerOutput {
        self.apply_params(params);

        let unit = match (input, self.mode) {
            (Some(x), ScaleMode::MinMax) => self.min_max.put(x, dt),
            (Some(x), ScaleMode::Quantile) => self.quantile.put(x, dt),
            (None, ScaleMode::MinMax) => self.min_max.value(),
            (None, ScaleMode::Quantile) => self.quantile.value(),
        };

        let (range_low, range_high) = match self.mode {
            ScaleMode::MinMax => (self.min_max.smoothed_min(), self.min_max.smoothed_max()),
            ScaleMode::Quantile => (self.quantile.low_quantile(), self.quantile.high_quantile()),
        };

        ScalerOutput {
            value: map(unit, 0.0, 1.0, params.out_low, params.out_high),
            range_low,
            range_high,
        }
    }

    pub fn reset(&mut self) {
        self.min_max.reset();
        self.quantile.reset();
    }

    fn apply_params(&mut self, params: &ScalerParams) {
        if self.mode_watch.changed(&params.mode) && params.mode != self.mode {
            tracing::debug!(from = ?self.mode, to = ?params.mode, "scaler mode changed");
            self.mode = params.mode;
            // The newly active engine must not inherit stale statistics
            match self.mode {
                ScaleMode::MinMax => self.min_max.reset(),
                ScaleMode::Quantile => self.quantile.reset(),
            }
        }

        let infinite_changed = self.infinite_watch.changed(&params.infinite);
        let window_changed = self.window_watch.changed(&params.time_window);
        if infinite_changed || window_changed {
            let window = params.effective_window();
            self.min_max.set_time_window(window);
            self.quantile.set_time_window(window);
        }

        if self.span_watch.changed(&params.span) {
            self.quantile.set_span(params.span);
        }
    }
}
