//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnimatorError, Result};

/// Timing and exclusion settings for a [`PlaybackEngine`](crate::PlaybackEngine)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Length of one leg in seconds
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Ticks per second
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    /// Engines sharing a label never play at the same time
    #[serde(default)]
    pub label: Option<String>,
}

fn default_duration() -> f64 {
    1.0
}

fn default_frequency() -> f64 {
    60.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration(),
            frequency_hz: default_frequency(),
            label: None,
        }
    }
}

impl EngineConfig {
    pub fn new(duration_secs: f64, frequency_hz: f64) -> Self {
        Self {
            duration_secs,
            frequency_hz,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Reject durations and frequencies that would divide by zero.
    pub fn validate(&self) -> Result<()> {
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(AnimatorError::InvalidDuration(self.duration_secs));
        }
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(AnimatorError::InvalidFrequency(self.frequency_hz));
        }
        Ok(())
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_secs * 1000.0
    }

    /// Fixed delay between ticks
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }
}
