//! Windowed rate of change
//!
//! Keeps a bounded window of `(value, dt)` samples and reports the slope
//! between the oldest and the newest sample, `(x_new - x_old) / Σdt`, in the
//! requested time unit. The window is either the last N samples or the last
//! T seconds.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Denominator guard for the slope
const DT_EPSILON: f64 = 1e-12;

/// Default hard limit on stored samples
pub const DEFAULT_PHYSICAL_CAPACITY: usize = 1_000_000;

/// Default logical window size in sample-count mode
pub const DEFAULT_SAMPLE_COUNT: usize = 50;

/// Default window length in time-window mode (seconds)
pub const DEFAULT_TIME_WINDOW: f64 = 1.0;

/// Smallest accepted time window (seconds)
pub const MIN_TIME_WINDOW: f64 = 0.001;

/// How the analysis window is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Keep the newest N samples
    #[default]
    SampleCount,
    /// Keep the samples of the last T seconds
    TimeWindow,
}

/// Output time unit of the rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    PerMillisecond,
    #[default]
    PerSecond,
    PerMinute,
    PerHour,
}

impl RateUnit {
    /// Multiplier applied to a per-second rate
    pub fn factor(&self) -> f32 {
        match self {
            RateUnit::PerMillisecond => 1.0 / 1000.0,
            RateUnit::PerSecond => 1.0,
            RateUnit::PerMinute => 60.0,
            RateUnit::PerHour => 3600.0,
        }
    }
}

/// One stored sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f32,
    /// Time since the previous sample (seconds)
    pub dt: f64,
    /// Absolute time since the first sample (seconds)
    pub t: f64,
}

/// Rate-of-change estimator over a sliding window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOfChange {
    samples: VecDeque<Sample>,
    physical_capacity: usize,
    window_mode: WindowMode,
    /// Logical window size for [`WindowMode::SampleCount`]
    capacity: usize,
    /// Window length for [`WindowMode::TimeWindow`]
    max_time: f64,
    /// Σdt over every sample except the oldest
    sum_dt: f64,
    total_time: f64,
    last_value: Option<f32>,
}

impl Default for RateOfChange {
    fn default() -> Self {
        Self::with_sample_count(DEFAULT_SAMPLE_COUNT)
    }
}

impl RateOfChange {
    /// Window of the newest `count` samples (at least 2)
    pub fn with_sample_count(count: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            physical_capacity: DEFAULT_PHYSICAL_CAPACITY,
            window_mode: WindowMode::SampleCount,
            capacity: count.max(2),
            max_time: DEFAULT_TIME_WINDOW,
            sum_dt: 0.0,
            total_time: 0.0,
            last_value: None,
        }
    }

    /// Window of the last `seconds` seconds
    pub fn with_time_window(seconds: f64) -> Self {
        let mut roc = Self::with_sample_count(DEFAULT_SAMPLE_COUNT);
        roc.window_mode = WindowMode::TimeWindow;
        roc.max_time = sanitize_time_window(seconds);
        roc
    }

    /// Limit the number of stored samples regardless of window mode (at least 2)
    pub fn with_physical_capacity(mut self, capacity: usize) -> Self {
        self.physical_capacity = capacity.max(2);
        while self.samples.len() > self.physical_capacity {
            self.drop_oldest();
        }
        self
    }

    // ---- Configuration ----

    pub fn window_mode(&self) -> WindowMode {
        self.window_mode
    }

    pub fn set_window_mode(&mut self, mode: WindowMode) {
        if mode != self.window_mode {
            tracing::debug!(?mode, "rate of change window mode changed");
            self.window_mode = mode;
            self.apply_window_policy();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.capacity
    }

    pub fn set_sample_count(&mut self, count: usize) {
        self.capacity = count.max(2);
        self.apply_window_policy();
    }

    pub fn time_window(&self) -> f64 {
        self.max_time
    }

    pub fn set_time_window(&mut self, seconds: f64) {
        self.max_time = sanitize_time_window(seconds);
        self.apply_window_policy();
    }

    pub fn physical_capacity(&self) -> usize {
        self.physical_capacity
    }

    // ---- Streaming ----

    /// Push a new value and return the per-second rate
    pub fn put(&mut self, value: f32, dt_seconds: f64) -> f32 {
        if !value.is_finite() {
            return self.hold(dt_seconds);
        }
        self.last_value = Some(value);
        self.push(value, dt_seconds);
        self.apply_window_policy();
        self.delta_per(RateUnit::PerSecond)
    }

    /// Repeat the last received value for a tick without new input.
    ///
    /// Before any value has been received only the clock advances.
    pub fn hold(&mut self, dt_seconds: f64) -> f32 {
        match self.last_value {
            Some(value) => self.push(value, dt_seconds),
            None => self.advance(dt_seconds),
        }
        self.apply_window_policy();
        self.delta_per(RateUnit::PerSecond)
    }

    /// Slope across the window in the given unit; `0` with fewer than two
    /// samples or no elapsed time
    pub fn delta_per(&self, unit: RateUnit) -> f32 {
        if self.samples.len() < 2 || !(self.sum_dt > DT_EPSILON) {
            return 0.0;
        }

        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };

        let dx = newest.value as f64 - oldest.value as f64;
        let per_second = dx / self.sum_dt;
        if !per_second.is_finite() {
            return 0.0;
        }

        per_second as f32 * unit.factor()
    }

    /// Last received value
    pub fn last_value(&self) -> Option<f32> {
        self.last_value
    }

    /// Samples currently in the window
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time covered by the window (seconds)
    pub fn window_span(&self) -> f64 {
        self.sum_dt
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.sum_dt = 0.0;
        self.total_time = 0.0;
        self.last_value = None;
    }

    // ---- Helpers ----

    fn advance(&mut self, dt_seconds: f64) {
        self.total_time += sanitize_dt(dt_seconds);
    }

    fn push(&mut self, value: f32, dt_seconds: f64) {
        let dt = sanitize_dt(dt_seconds);

        // The first sample's dt is outside the window
        if self.samples.is_empty() {
            self.samples.push_back(Sample {
                value,
                dt: 0.0,
                t: self.total_time,
            });
            return;
        }

        if self.samples.len() >= self.physical_capacity {
            self.drop_oldest();
        }

        self.total_time += dt;
        self.samples.push_back(Sample {
            value,
            dt,
            t: self.total_time,
        });
        self.sum_dt += dt;
    }

    /// Drop the oldest sample, always keeping at least one
    fn drop_oldest(&mut self) {
        if self.samples.len() <= 1 {
            return;
        }
        self.samples.pop_front();
        if let Some(front) = self.samples.front() {
            // The new oldest no longer contributes its dt
            self.sum_dt -= front.dt;
        }
        if self.sum_dt < 0.0 {
            self.sum_dt = 0.0;
        }
    }

    fn apply_window_policy(&mut self) {
        match self.window_mode {
            WindowMode::SampleCount => {
                while self.samples.len() > self.capacity {
                    self.drop_oldest();
                }
            }
            WindowMode::TimeWindow => self.apply_time_policy(),
        }
    }

    fn apply_time_policy(&mut self) {
        let Some(&newest) = self.samples.back() else {
            return;
        };

        if self.samples.len() == 1 {
            // Lone sample: pair it with itself, no elapsed time yet
            self.samples.push_front(newest);
            if let Some(second) = self.samples.get_mut(1) {
                second.dt = 0.0;
            }
            self.sum_dt = 0.0;
            return;
        }

        // Drop samples that fall outside the window
        while self.samples.len() > 2 {
            match self.samples.front() {
                Some(oldest) if newest.t - oldest.t > self.max_time + DT_EPSILON => {
                    self.drop_oldest()
                }
                _ => break,
            }
        }

        // Two samples further apart than the window: move the oldest to the
        // window edge, holding its value
        if self.samples.len() != 2 {
            return;
        }
        let edge = newest.t - self.max_time;
        let relocated = match self.samples.front_mut() {
            Some(oldest) if oldest.t < edge - DT_EPSILON => {
                oldest.t = edge;
                true
            }
            _ => false,
        };

        if relocated {
            if let Some(sample) = self.samples.get_mut(1) {
                sample.dt = sample.t - edge;
            }
            self.sum_dt = self.max_time;
        }
    }
}

fn sanitize_dt(dt_seconds: f64) -> f64 {
    if dt_seconds.is_finite() && dt_seconds > 0.0 {
        dt_seconds
    } else {
        0.0
    }
}

fn sanitize_time_window(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(MIN_TIME_WINDOW)
    } else {
        DEFAULT_TIME_WINDOW
    }
}
