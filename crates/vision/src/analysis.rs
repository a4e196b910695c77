//! Per-frame detection results

use serde::{Deserialize, Serialize};

use crate::detector::PresenceStrategy;

/// Where a region came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSource {
    Ml,
    Heuristic,
}

/// Face bounding box in frame pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub source: RegionSource,
}

impl DetectionRegion {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union
    pub fn iou(&self, other: &DetectionRegion) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Brightness statistics of the sampled central rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrightnessStats {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub samples: usize,
}

impl BrightnessStats {
    pub fn contrast(&self) -> f32 {
        self.max - self.min
    }
}

/// Presence classification for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceVerdict {
    /// No face, or camera blocked
    Absent,
    /// Exactly one face
    Present,
    /// More than one face
    Multiple(usize),
}

/// Complete presence result for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceReading {
    pub verdict: PresenceVerdict,

    /// Detected regions (empty when absent)
    pub regions: Vec<DetectionRegion>,

    /// Strategy that produced this reading
    pub strategy: PresenceStrategy,

    /// Heuristic statistics, if the heuristic ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<BrightnessStats>,
}

impl PresenceReading {
    /// Classify a set of model regions
    pub fn from_regions(regions: Vec<DetectionRegion>) -> Self {
        let verdict = match regions.len() {
            0 => PresenceVerdict::Absent,
            1 => PresenceVerdict::Present,
            n => PresenceVerdict::Multiple(n),
        };
        Self {
            verdict,
            regions,
            strategy: PresenceStrategy::Ml,
            brightness: None,
        }
    }

    /// The single face, when exactly one was found
    pub fn single_region(&self) -> Option<&DetectionRegion> {
        match (self.verdict, self.regions.as_slice()) {
            (PresenceVerdict::Present, [region]) => Some(region),
            _ => None,
        }
    }
}
