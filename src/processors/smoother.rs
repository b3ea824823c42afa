//! Smoother processor
//!
//! Alpha, time constant and cutoff all describe the same coefficient. The one
//! changed most recently wins; switching cumulative mode off goes back to the
//! last one chosen before it was switched on.

use serde::{Deserialize, Serialize};

use crate::config::SmootherParams;
use crate::smoother::{Smoother, SmoothingControl};
use crate::types::{SmootherOutput, Tick};
use crate::watcher::ParameterWatcher;

/// Step used when the host provides no usable interval (seconds)
pub const DEFAULT_DT: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmootherProcessor {
    smoother: Smoother,
    control: SmoothingControl,
    /// Control to restore when cumulative mode is switched off
    last_non_cumulative: Option<SmoothingControl>,
    alpha_watch: ParameterWatcher<f32>,
    tau_watch: ParameterWatcher<f32>,
    cutoff_watch: ParameterWatcher<f32>,
    cumulative_watch: ParameterWatcher<bool>,
}

impl SmootherProcessor {
    pub fn new(params: &SmootherParams) -> Self {
        Self {
            smoother: Smoother::new(),
            control: SmoothingControl::Alpha,
            last_non_cumulative: None,
            alpha_watch: ParameterWatcher::primed(params.alpha),
            tau_watch: ParameterWatcher::primed(params.tau),
            cutoff_watch: ParameterWatcher::primed(params.cutoff),
            cumulative_watch: ParameterWatcher::primed(params.cumulative),
        }
    }

    /// Parameter currently defining the coefficient
    pub fn control(&self) -> SmoothingControl {
        self.control
    }

    pub fn process_tick(
        &mut self,
        params: &SmootherParams,
        input: Option<f32>,
        tick: Tick,
    ) -> SmootherOutput {
        self.process(params, input, tick.control_dt())
    }

    /// A non-positive `dt` is replaced by [`DEFAULT_DT`]
    pub fn process(
        &mut self,
        params: &SmootherParams,
        input: Option<f32>,
        dt: f64,
    ) -> SmootherOutput {
        let dt = if dt > 0.0 && dt.is_finite() {
            dt as f32
        } else {
            DEFAULT_DT
        };

        self.apply_params(params);

        let Some(x) = input else {
            return SmootherOutput {
                value: self.smoother.value(),
                alpha: 0.0,
            };
        };

        if params.cumulative {
            let alpha = self.smoother.cumulative_alpha();
            SmootherOutput {
                value: self.smoother.put_cumulative(x),
                alpha,
            }
        } else {
            let coefficient = self
                .control
                .resolve(params.alpha, params.tau, params.cutoff, dt);
            SmootherOutput {
                value: self.smoother.put(x, coefficient.alpha),
                alpha: coefficient.alpha,
            }
        }
    }

    pub fn reset(&mut self) {
        self.smoother.reset();
    }

    fn apply_params(&mut self, params: &SmootherParams) {
        if self.cumulative_watch.changed(&params.cumulative) {
            self.control = SmoothingControl::TimeConstant;
            if !params.cumulative {
                if let Some(previous) = self.last_non_cumulative {
                    self.control = previous;
                }
            }
            tracing::debug!(
                cumulative = params.cumulative,
                control = ?self.control,
                "smoother mode changed"
            );
        }
        if self.alpha_watch.changed(&params.alpha) {
            self.select(SmoothingControl::Alpha);
        }
        if self.tau_watch.changed(&params.tau) {
            self.select(SmoothingControl::TimeConstant);
        }
        if self.cutoff_watch.changed(&params.cutoff) {
            self.select(SmoothingControl::Cutoff);
        }
    }

    fn select(&mut self, control: SmoothingControl) {
        self.control = control;
        self.last_non_cumulative = Some(control);
    }
}
