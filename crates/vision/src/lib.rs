//! Vision detectors for integrity monitoring
//!
//! Per-frame analysis of a candidate's webcam feed:
//! - Face presence (ONNX face model, or brightness/contrast fallback)
//! - Head position relative to the frame center
//! - Multiple occupants (region count, or motion-zone clustering)

pub mod analysis;
pub mod config;
pub mod crowd;
pub mod detector;
pub mod ml;
pub mod position;

pub use analysis::{BrightnessStats, DetectionRegion, PresenceReading, PresenceVerdict, RegionSource};
pub use config::VisionConfig;
pub use crowd::{count_motion_zones, CrowdDetector, CrowdVerdict, MotionZone};
pub use detector::{FallbackPresence, HeuristicDetector, PresenceDetector, PresenceStrategy};
pub use ml::{load_presence_detector, MlDetector};
pub use position::{PositionEvaluator, PositionVerdict};

use thiserror::Error;

/// Vision error types
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model loading timed out after {0}ms")]
    ModelLoadTimeout(u64),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Empty frame ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
