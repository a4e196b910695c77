//! Vision configuration

use serde::{Deserialize, Serialize};

/// Vision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// ONNX face model; `None` selects the heuristic detector
    pub model_path: Option<String>,

    /// Upper bound on model loading before falling back (milliseconds)
    pub model_load_timeout_ms: u64,

    /// Model input resolution
    pub model_input_width: u32,
    pub model_input_height: u32,

    /// Face score threshold
    pub score_threshold: f32,

    /// IoU above which overlapping faces are merged
    pub nms_iou_threshold: f32,

    /// Max distance between face center and frame center at 640x480 (pixels)
    pub center_threshold_px: f32,

    /// Central sampling rectangle as a fraction of frame size
    pub heuristic_region_fraction: f32,

    /// Sampling stride for the heuristic (pixels)
    pub heuristic_stride: u32,

    /// Mean brightness below which the camera is considered blocked
    pub min_brightness: f32,

    /// Max-min brightness below which the region is considered empty
    pub min_contrast: f32,

    /// Crowd heuristic downsampling factor
    pub motion_downsample: u32,

    /// Motion grid cell size on the downsampled plane (pixels)
    pub motion_cell_size: u32,

    /// Mean absolute intensity delta for a cell to count as motion
    pub motion_threshold: f32,

    /// More motion zones than this in one tick is suspicious
    pub max_motion_zones: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_load_timeout_ms: 10_000,
            model_input_width: 320,
            model_input_height: 240,
            score_threshold: 0.7,
            nms_iou_threshold: 0.3,
            center_threshold_px: 120.0,
            heuristic_region_fraction: 0.4,
            heuristic_stride: 4,
            min_brightness: 30.0,
            min_contrast: 15.0,
            motion_downsample: 4,
            motion_cell_size: 8,
            motion_threshold: 30.0,
            max_motion_zones: 2,
        }
    }
}

impl VisionConfig {
    /// Create strict config (tighter centering, more sensitive motion)
    pub fn strict() -> Self {
        Self {
            center_threshold_px: 90.0,
            motion_threshold: 20.0,
            ..Default::default()
        }
    }

    /// Create lenient config (looser centering, less sensitive motion)
    pub fn lenient() -> Self {
        Self {
            center_threshold_px: 160.0,
            motion_threshold: 45.0,
            max_motion_zones: 4,
            ..Default::default()
        }
    }
}
