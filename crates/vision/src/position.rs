//! Head position relative to the frame center

use serde::{Deserialize, Serialize};

use crate::analysis::DetectionRegion;
use crate::VisionConfig;

/// Diagonal of the 640x480 frame the pixel threshold is defined against
const REFERENCE_DIAGONAL: f32 = 800.0;

/// Centering classification of a single face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositionVerdict {
    Centered { distance: f32 },
    Decentered { distance: f32 },
}

impl PositionVerdict {
    pub fn is_centered(&self) -> bool {
        matches!(self, PositionVerdict::Centered { .. })
    }

    pub fn distance(&self) -> f32 {
        match self {
            PositionVerdict::Centered { distance } | PositionVerdict::Decentered { distance } => {
                *distance
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionEvaluator {
    threshold_px: f32,
}

impl PositionEvaluator {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            threshold_px: config.center_threshold_px,
        }
    }

    /// Threshold for a given frame size, scaled by diagonal
    pub fn threshold_for(&self, width: u32, height: u32) -> f32 {
        let diagonal = (width as f32).hypot(height as f32);
        self.threshold_px * diagonal / REFERENCE_DIAGONAL
    }

    pub fn evaluate(&self, region: &DetectionRegion, width: u32, height: u32) -> PositionVerdict {
        let (cx, cy) = region.center();
        let distance = (cx - width as f32 / 2.0).hypot(cy - height as f32 / 2.0);

        if distance <= self.threshold_for(width, height) {
            PositionVerdict::Centered { distance }
        } else {
            PositionVerdict::Decentered { distance }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RegionSource;

    fn face_at(cx: f32, cy: f32) -> DetectionRegion {
        DetectionRegion {
            x: cx - 50.0,
            y: cy - 60.0,
            width: 100.0,
            height: 120.0,
            confidence: 0.9,
            source: RegionSource::Ml,
        }
    }

    #[test]
    fn test_reference_threshold() {
        let evaluator = PositionEvaluator::new(&VisionConfig::default());
        assert!((evaluator.threshold_for(640, 480) - 120.0).abs() < 1e-3);
        assert!((evaluator.threshold_for(1280, 960) - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_centered_and_decentered() {
        let evaluator = PositionEvaluator::new(&VisionConfig::default());

        let centered = evaluator.evaluate(&face_at(320.0, 240.0), 640, 480);
        assert!(centered.is_centered());
        assert_eq!(centered.distance(), 0.0);

        let near = evaluator.evaluate(&face_at(320.0 + 70.0, 240.0 + 90.0), 640, 480);
        assert!(near.is_centered());

        // Same offset on a smaller frame falls outside the scaled threshold
        let scaled = evaluator.evaluate(&face_at(160.0 + 70.0, 120.0 + 90.0), 320, 240);
        assert!(!scaled.is_centered());

        let off = evaluator.evaluate(&face_at(560.0, 240.0), 640, 480);
        assert_eq!(off, PositionVerdict::Decentered { distance: 240.0 });
    }
}
