//! Window statistics over analyser buffers

use media_capture::AudioBuffers;
use serde::{Deserialize, Serialize};

use crate::AudioError;

/// Midpoint of an unsigned 8-bit time-domain sample
const TIME_DOMAIN_MIDPOINT: i16 = 128;

/// Statistics for one analyser window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Mean frequency magnitude
    pub mean: f32,
    /// Max frequency magnitude
    pub max: f32,
    /// Largest deviation from the time-domain midpoint
    pub time_domain_peak: f32,
}

impl WindowStats {
    pub fn compute(buffers: &AudioBuffers) -> Result<Self, AudioError> {
        if buffers.frequency.is_empty() {
            return Err(AudioError::EmptyBuffer("frequency"));
        }
        if buffers.time_domain.is_empty() {
            return Err(AudioError::EmptyBuffer("time-domain"));
        }

        let sum: u32 = buffers.frequency.iter().map(|&v| v as u32).sum();
        let mean = sum as f32 / buffers.frequency.len() as f32;
        let max = buffers.frequency.iter().copied().max().unwrap_or(0) as f32;

        let time_domain_peak = buffers
            .time_domain
            .iter()
            .map(|&v| (v as i16 - TIME_DOMAIN_MIDPOINT).abs())
            .max()
            .unwrap_or(0) as f32;

        Ok(Self {
            mean,
            max,
            time_domain_peak,
        })
    }
}
