//! Audio Activity Detection
//!
//! Classifies one analyser window as silence, ambient noise or speech:
//! - Frequency-magnitude mean and max
//! - Peak deviation of the time-domain signal from its midpoint
//! - Fail-open when the audio context is not running

mod classifier;
mod statistics;

pub use classifier::{AudioActivityDetector, SpeechVerdict};
pub use statistics::WindowStats;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Empty {0} buffer")]
    EmptyBuffer(&'static str),
}

/// Audio thresholds, in analyser byte units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Frequency mean above which the window is speech
    pub speech_threshold: f32,
    /// Frequency max above which the window is speech
    pub max_threshold: f32,
    /// Time-domain peak deviation above which the window is speech
    pub time_domain_threshold: f32,
    /// Fraction of `speech_threshold` above which the window is ambient noise
    pub ambient_factor: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 8.0,
            max_threshold: 25.0,
            time_domain_threshold: 10.0,
            ambient_factor: 0.5,
        }
    }
}

impl AudioConfig {
    /// Create strict config (quieter rooms)
    pub fn strict() -> Self {
        Self {
            speech_threshold: 6.0,
            max_threshold: 20.0,
            time_domain_threshold: 8.0,
            ..Default::default()
        }
    }

    /// Create lenient config (noisy environments)
    pub fn lenient() -> Self {
        Self {
            speech_threshold: 12.0,
            max_threshold: 40.0,
            time_domain_threshold: 16.0,
            ..Default::default()
        }
    }
}
