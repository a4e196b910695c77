//! Presence detection strategies

use media_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::{BrightnessStats, DetectionRegion, PresenceReading, PresenceVerdict, RegionSource};
use crate::{VisionConfig, VisionError};

/// Which presence strategy a session runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStrategy {
    Ml,
    Heuristic,
}

/// Face presence detector, selected once per session
pub trait PresenceDetector: Send {
    fn strategy(&self) -> PresenceStrategy;

    fn detect(&mut self, frame: &VideoFrame) -> Result<PresenceReading, VisionError>;
}

/// Brightness/contrast check over the central part of the frame.
///
/// A covered camera or an empty seat is both dark and flat; a present face
/// breaks at least one of the two tests.
#[derive(Debug, Clone)]
pub struct HeuristicDetector {
    region_fraction: f32,
    stride: u32,
    min_brightness: f32,
    min_contrast: f32,
}

impl HeuristicDetector {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            region_fraction: config.heuristic_region_fraction,
            stride: config.heuristic_stride.max(1),
            min_brightness: config.min_brightness,
            min_contrast: config.min_contrast,
        }
    }

    /// Sample the central rectangle at a coarse stride
    pub fn sample_center(&self, frame: &VideoFrame) -> Result<BrightnessStats, VisionError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(VisionError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        let center_x = frame.width as f32 / 2.0;
        let center_y = frame.height as f32 / 2.0;
        let half_w = frame.width as f32 * self.region_fraction / 2.0;
        let half_h = frame.height as f32 * self.region_fraction / 2.0;

        let mut sum = 0.0;
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut samples = 0usize;

        for y in (0..frame.height).step_by(self.stride as usize) {
            if (y as f32 - center_y).abs() > half_h {
                continue;
            }
            for x in (0..frame.width).step_by(self.stride as usize) {
                if (x as f32 - center_x).abs() > half_w {
                    continue;
                }
                if let Some(brightness) = frame.intensity(x, y) {
                    sum += brightness;
                    min = min.min(brightness);
                    max = max.max(brightness);
                    samples += 1;
                }
            }
        }

        if samples == 0 {
            return Err(VisionError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        Ok(BrightnessStats {
            mean: sum / samples as f32,
            min,
            max,
            samples,
        })
    }

    fn center_region(&self, frame: &VideoFrame, confidence: f32) -> DetectionRegion {
        let width = frame.width as f32 * self.region_fraction;
        let height = frame.height as f32 * self.region_fraction;
        DetectionRegion {
            x: (frame.width as f32 - width) / 2.0,
            y: (frame.height as f32 - height) / 2.0,
            width,
            height,
            confidence,
            source: RegionSource::Heuristic,
        }
    }
}

impl PresenceDetector for HeuristicDetector {
    fn strategy(&self) -> PresenceStrategy {
        PresenceStrategy::Heuristic
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<PresenceReading, VisionError> {
        let stats = self.sample_center(frame)?;
        debug!(
            "Heuristic presence: mean={:.1} contrast={:.1} samples={}",
            stats.mean,
            stats.contrast(),
            stats.samples
        );

        let absent = stats.mean < self.min_brightness || stats.contrast() < self.min_contrast;
        let (verdict, regions) = if absent {
            (PresenceVerdict::Absent, Vec::new())
        } else {
            let confidence = (stats.contrast() / 255.0).clamp(0.0, 1.0);
            (PresenceVerdict::Present, vec![self.center_region(frame, confidence)])
        };

        Ok(PresenceReading {
            verdict,
            regions,
            strategy: PresenceStrategy::Heuristic,
            brightness: Some(stats),
        })
    }
}

/// Runs the model first and falls back to the heuristic for any frame the
/// model fails on.
pub struct FallbackPresence {
    primary: Box<dyn PresenceDetector>,
    fallback: HeuristicDetector,
    failures: u64,
}

impl FallbackPresence {
    pub fn new(primary: Box<dyn PresenceDetector>, fallback: HeuristicDetector) -> Self {
        Self {
            primary,
            fallback,
            failures: 0,
        }
    }

    /// Frames the primary detector failed on
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl PresenceDetector for FallbackPresence {
    fn strategy(&self) -> PresenceStrategy {
        self.primary.strategy()
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<PresenceReading, VisionError> {
        match self.primary.detect(frame) {
            Ok(reading) => Ok(reading),
            Err(e) => {
                self.failures += 1;
                warn!("Primary presence detector failed, using heuristic: {}", e);
                self.fallback.detect(frame)
            }
        }
    }
}
