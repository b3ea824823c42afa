//! Change detection for per-tick parameters

use serde::{Deserialize, Serialize};

/// Remembers the last seen value of a parameter and reports changes.
///
/// A fresh watcher reports a change on the first call; a primed one only when
/// the value differs from the priming value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterWatcher<T> {
    last: Option<T>,
}

impl<T> Default for ParameterWatcher<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: PartialEq + Clone> ParameterWatcher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watcher that treats `value` as already applied
    pub fn primed(value: T) -> Self {
        Self { last: Some(value) }
    }

    /// Record `current`; returns `true` if it differs from the previous value
    pub fn changed(&mut self, current: &T) -> bool {
        if self.last.as_ref() == Some(current) {
            return false;
        }
        self.last = Some(current.clone());
        true
    }

    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }

    /// Forget the last value; the next call reports a change
    pub fn reset(&mut self) {
        self.last = None;
    }
}
