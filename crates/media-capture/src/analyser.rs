//! Analyser-node style spectrum analysis for microphone input

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Audio analyser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyserConfig {
    /// FFT window size in samples (power of two)
    pub fft_size: usize,
    /// Exponential smoothing between successive spectra (0.0 - 1.0)
    pub smoothing_time_constant: f64,
    /// dB value mapped to byte 0
    pub min_decibels: f64,
    /// dB value mapped to byte 255
    pub max_decibels: f64,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Lifecycle state of the audio processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioContextState {
    Running,
    Suspended,
    Closed,
}

/// One windowed sample of the audio analysis node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffers {
    pub state: AudioContextState,
    /// Byte-scaled frequency magnitudes (fft_size / 2 bins)
    pub frequency: Vec<u8>,
    /// Byte-scaled waveform, 128 is silence
    pub time_domain: Vec<u8>,
}

impl AudioBuffers {
    /// Buffers for a context that is not producing samples
    pub fn inactive(state: AudioContextState) -> Self {
        Self {
            state,
            frequency: Vec::new(),
            time_domain: Vec::new(),
        }
    }
}

/// Spectrum analyser over the most recent `fft_size` PCM samples
pub struct SpectrumAnalyser {
    planner: FftPlanner<f64>,
    config: AnalyserConfig,
    samples: VecDeque<f32>,
    smoothed: Vec<f64>,
}

impl SpectrumAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let fft_size = config.fft_size.max(32);
        Self {
            planner: FftPlanner::new(),
            samples: std::iter::repeat(0.0).take(fft_size).collect(),
            smoothed: vec![0.0; fft_size / 2],
            config: AnalyserConfig { fft_size, ..config },
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Append PCM samples in [-1.0, 1.0], keeping only the latest window
    pub fn push_samples(&mut self, pcm: &[f32]) {
        for &sample in pcm {
            if self.samples.len() == self.config.fft_size {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    /// Blackman window (a = 0.16)
    fn blackman(i: usize, n: usize) -> f64 {
        let x = i as f64 / n as f64;
        let tau = 2.0 * std::f64::consts::PI;
        0.42 - 0.5 * (tau * x).cos() + 0.08 * (2.0 * tau * x).cos()
    }

    /// Smoothed spectrum scaled to bytes over [min_decibels, max_decibels].
    ///
    /// Each call advances the smoothing state.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let n = self.config.fft_size;

        let mut buffer: Vec<Complex<f64>> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, &s)| Complex::new(s as f64 * Self::blackman(i, n), 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let tau = self.config.smoothing_time_constant.clamp(0.0, 1.0);
        let range = self.config.max_decibels - self.config.min_decibels;

        buffer
            .iter()
            .take(n / 2)
            .zip(self.smoothed.iter_mut())
            .map(|(c, prev)| {
                let magnitude = c.norm() / n as f64;
                *prev = tau * *prev + (1.0 - tau) * magnitude;
                if *prev <= 0.0 {
                    return 0;
                }
                let db = 20.0 * prev.log10();
                let scaled = 255.0 / range * (db - self.config.min_decibels);
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Current waveform mapped to bytes, 128 = 0.0
    pub fn byte_time_domain_data(&self) -> Vec<u8> {
        self.samples
            .iter()
            .map(|&s| (128.0 * (1.0 + s as f64)).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Sample both buffers at once
    pub fn snapshot(&mut self, state: AudioContextState) -> AudioBuffers {
        if state != AudioContextState::Running {
            return AudioBuffers::inactive(state);
        }
        AudioBuffers {
            state,
            frequency: self.byte_frequency_data(),
            time_domain: self.byte_time_domain_data(),
        }
    }
}
