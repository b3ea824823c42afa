//! Normalization processor

use serde::{Deserialize, Serialize};

use crate::config::NormalizationParams;
use crate::estimator::AdaptiveEstimator;
use crate::normalizer::Normalizer;
use crate::types::{NormalizationOutput, Tick};
use crate::watcher::ParameterWatcher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationProcessor {
    normalizer: Normalizer,
    infinite_watch: ParameterWatcher<bool>,
    window_watch: ParameterWatcher<f64>,
    last_outlier: bool,
}

impl NormalizationProcessor {
    pub fn new(params: &NormalizationParams) -> Self {
        let mut normalizer = Normalizer::with_time_window(
            params.effective_window(),
            params.target_mean,
            params.target_std,
        )
        .with_alpha_policy(params.alpha_policy)
        .with_seed_policy(params.seed_policy);
        apply_clamp(&mut normalizer, params);

        Self {
            normalizer,
            infinite_watch: ParameterWatcher::primed(params.infinite),
            window_watch: ParameterWatcher::primed(params.time_window),
            last_outlier: false,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn process_tick(
        &mut self,
        params: &NormalizationParams,
        input: Option<f32>,
        tick: Tick,
    ) -> NormalizationOutput {
        self.process(params, input, tick.control_dt())
    }

    pub fn process(
        &mut self,
        params: &NormalizationParams,
        input: Option<f32>,
        dt: f64,
    ) -> NormalizationOutput {
        self.apply_params(params);

        let value = match input {
            Some(x) => {
                let y = self.normalizer.put(x, dt);
                // Outliers are judged on the raw sample against the updated statistics
                self.last_outlier = self.normalizer.is_outlier(x, params.outlier_threshold);
                y
            }
            None => self.normalizer.value(),
        };

        NormalizationOutput {
            value,
            mean: self.normalizer.mean(),
            stddev: self.normalizer.stddev(),
            outlier: self.last_outlier,
            coefficient_of_variation: self
                .normalizer
                .coefficient_of_variation(params.cv_sensitivity),
        }
    }

    pub fn reset(&mut self) {
        self.normalizer.reset();
        self.last_outlier = false;
    }

    fn apply_params(&mut self, params: &NormalizationParams) {
        // Cheap setters are applied every tick
        self.normalizer.set_target_mean(params.target_mean);
        self.normalizer.set_target_std_dev(params.target_std);
        self.normalizer.set_alpha_policy(params.alpha_policy);
        self.normalizer.set_seed_policy(params.seed_policy);
        apply_clamp(&mut self.normalizer, params);

        let infinite_changed = self.infinite_watch.changed(&params.infinite);
        let window_changed = self.window_watch.changed(&params.time_window);
        if infinite_changed || window_changed {
            tracing::debug!(window = params.effective_window(), "normalization window changed");
            self.normalizer.set_time_window(params.effective_window());
        }
    }
}

fn apply_clamp(normalizer: &mut Normalizer, params: &NormalizationParams) {
    if params.clamp {
        normalizer.set_clamp(params.clamp_sigmas);
    } else {
        normalizer.no_clamp();
    }
}
