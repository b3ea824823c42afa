//! Exponential smoothing (one-pole low-pass)
//!
//! The smoothing strength can be given as a raw coefficient `alpha`, a time
//! constant `tau` in seconds, or a cutoff frequency in Hz. The conversion
//! functions below translate between the three for a given sampling interval.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::ema::{ema_alpha, ema_update, SampleCounter};

/// `tau = -dt / ln(1 - alpha)`
pub fn alpha_to_time_window(alpha: f32, dt: f32) -> f32 {
    if dt <= 0.0 || alpha <= 0.0 {
        return f32::INFINITY;
    }
    if alpha >= 1.0 {
        return 0.0;
    }
    -dt / (1.0 - alpha).ln()
}

/// `alpha = 1 - exp(-dt / tau)`
pub fn time_window_to_alpha(tau: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.5;
    }
    if tau <= 0.0 {
        return 1.0;
    }
    if tau == f32::INFINITY {
        return 0.0;
    }
    1.0 - (-dt / tau).exp()
}

/// `fc = -ln(1 - alpha) / (2π·dt)`
pub fn alpha_to_cutoff(alpha: f32, dt: f32) -> f32 {
    if dt <= 0.0 || alpha <= 0.0 {
        return 0.0;
    }
    if alpha >= 1.0 {
        return f32::INFINITY;
    }
    -(1.0 - alpha).ln() / (2.0 * PI * dt)
}

/// `alpha = 1 - exp(-2π·fc·dt)`
pub fn cutoff_to_alpha(cutoff_hz: f32, dt: f32) -> f32 {
    if dt <= 0.0 || cutoff_hz <= 0.0 {
        return 0.0;
    }
    1.0 - (-2.0 * PI * cutoff_hz * dt).exp()
}

/// `fc = 1 / (2π·tau)`
pub fn time_window_to_cutoff(tau: f32) -> f32 {
    if tau <= 0.0 {
        return f32::INFINITY;
    }
    if tau == f32::INFINITY {
        return 0.0;
    }
    1.0 / (2.0 * PI * tau)
}

/// `tau = 1 / (2π·fc)`
pub fn cutoff_to_time_window(cutoff_hz: f32) -> f32 {
    if cutoff_hz <= 0.0 {
        return f32::INFINITY;
    }
    if cutoff_hz == f32::INFINITY {
        return 0.0;
    }
    1.0 / (2.0 * PI * cutoff_hz)
}

/// Which parameter currently defines the smoothing coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingControl {
    #[default]
    Alpha,
    TimeConstant,
    Cutoff,
}

/// Effective coefficient and time constant for a control choice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficient {
    pub alpha: f32,
    pub tau: f32,
}

impl SmoothingControl {
    /// Resolve the coefficient from whichever parameter this control selects
    pub fn resolve(&self, alpha: f32, tau: f32, cutoff_hz: f32, dt: f32) -> Coefficient {
        match self {
            SmoothingControl::Alpha => {
                let alpha = alpha.clamp(0.0, 1.0);
                Coefficient {
                    alpha,
                    tau: alpha_to_time_window(alpha, dt),
                }
            }
            SmoothingControl::TimeConstant => Coefficient {
                alpha: time_window_to_alpha(tau, dt),
                tau,
            },
            SmoothingControl::Cutoff => Coefficient {
                alpha: cutoff_to_alpha(cutoff_hz, dt),
                tau: cutoff_to_time_window(cutoff_hz),
            },
        }
    }
}

/// One-pole smoother state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Smoother {
    filtered: Option<f32>,
    n: SampleCounter,
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed-coefficient update, `y <- alpha·x + (1 - alpha)·y`
    pub fn put(&mut self, x: f32, alpha: f32) -> f32 {
        self.n.reset();
        if !x.is_finite() {
            return self.value();
        }
        let y = match self.filtered {
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
            None => x,
        };
        self.filtered = Some(y);
        y
    }

    /// Coefficient the next cumulative update will use, `1/(n+1)`
    pub fn cumulative_alpha(&self) -> f32 {
        ema_alpha(true, -1.0, self.n.get(), 0.0)
    }

    /// Cumulative running average since the last reset or finite update
    pub fn put_cumulative(&mut self, x: f32) -> f32 {
        if !x.is_finite() {
            return self.value();
        }
        let alpha = self.cumulative_alpha();
        let y = match self.filtered {
            Some(mut prev) => {
                ema_update(&mut prev, x, alpha);
                prev
            }
            None => x,
        };
        self.filtered = Some(y);
        self.n.increment();
        y
    }

    /// Last output, `0` before the first sample
    pub fn value(&self) -> f32 {
        self.filtered.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.filtered = None;
        self.n.reset();
    }
}
