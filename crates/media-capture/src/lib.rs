//! Media Capture Library for Integrity Monitoring
//!
//! Provides the frame/audio side of a proctoring session:
//! - RGB video frames sampled from a webcam (640x480 by default)
//! - Analyser-style frequency and time-domain audio buffers
//! - Scoped device acquisition with guaranteed release

pub mod analyser;
pub mod frame;
pub mod source;

pub use analyser::{AnalyserConfig, AudioBuffers, AudioContextState, SpectrumAnalyser};
pub use frame::{GrayPlane, VideoFrame};
pub use source::{AudioTap, ImageSequenceSource, MediaDevice, MediaGuard, MediaSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture error types
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Permission denied for {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Invalid frame: {0}")]
    Format(String),

    #[error("Image decoding failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Device already released")]
    Released,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory of still images used as a camera feed
    pub image_dir: Option<String>,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Audio analyser settings
    pub analyser: AnalyserConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_dir: None,
            width: 640,
            height: 480,
            analyser: AnalyserConfig::default(),
        }
    }
}
