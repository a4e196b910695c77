//! Multiple-occupant detection

use media_capture::{GrayPlane, VideoFrame};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::PresenceReading;
use crate::detector::PresenceStrategy;
use crate::VisionConfig;

/// Grid cell whose frame-to-frame change exceeded the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionZone {
    pub x: u32,
    pub y: u32,
    pub motion: f32,
}

/// Occupancy classification for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrowdVerdict {
    /// No previous frame to compare against yet
    Warmup,
    /// One occupant
    Single,
    /// Borderline motion; leaves status as it was
    Ambiguous { zones: usize },
    /// Several faces from the model
    MultiplePersons { count: usize },
    /// Motion in too many places at once
    MotionSuspect { zones: usize },
}

/// Cells of `curr` whose mean absolute delta from `prev` exceeds `threshold`.
///
/// Edge cells smaller than `cell` are averaged over the pixels they have.
pub fn motion_zones(prev: &GrayPlane, curr: &GrayPlane, cell: u32, threshold: f32) -> Vec<MotionZone> {
    let mut zones = Vec::new();
    if !prev.same_size(curr) || cell == 0 {
        return zones;
    }

    for y in (0..curr.height).step_by(cell as usize) {
        for x in (0..curr.width).step_by(cell as usize) {
            let mut sum = 0.0;
            let mut count = 0u32;
            for dy in 0..cell.min(curr.height - y) {
                for dx in 0..cell.min(curr.width - x) {
                    let idx = ((y + dy) * curr.width + (x + dx)) as usize;
                    sum += (curr.data[idx] - prev.data[idx]).abs();
                    count += 1;
                }
            }
            let motion = sum / count as f32;
            if motion > threshold {
                zones.push(MotionZone { x, y, motion });
            }
        }
    }
    zones
}

pub fn count_motion_zones(prev: &GrayPlane, curr: &GrayPlane, cell: u32, threshold: f32) -> usize {
    motion_zones(prev, curr, cell, threshold).len()
}

/// Crowd detector with a single-slot frame history
pub struct CrowdDetector {
    downsample: u32,
    cell_size: u32,
    threshold: f32,
    max_zones: usize,
    previous: Option<GrayPlane>,
}

impl CrowdDetector {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            downsample: config.motion_downsample.max(1),
            cell_size: config.motion_cell_size.max(1),
            threshold: config.motion_threshold,
            max_zones: config.max_motion_zones,
            previous: None,
        }
    }

    /// Classify occupancy for this tick.
    ///
    /// Model readings are judged by region count, anything else by motion.
    /// The frame history is overwritten on every call.
    pub fn assess(&mut self, frame: &VideoFrame, reading: Option<&PresenceReading>) -> CrowdVerdict {
        let current = frame.downsample(self.downsample);

        let verdict = match reading {
            Some(reading) if reading.strategy == PresenceStrategy::Ml => {
                match reading.regions.len() {
                    n if n > 1 => CrowdVerdict::MultiplePersons { count: n },
                    _ => CrowdVerdict::Single,
                }
            }
            _ => self.assess_motion(&current),
        };

        self.previous = Some(current);
        verdict
    }

    fn assess_motion(&self, current: &GrayPlane) -> CrowdVerdict {
        let previous = match &self.previous {
            Some(prev) if prev.same_size(current) => prev,
            _ => return CrowdVerdict::Warmup,
        };

        let zones = count_motion_zones(previous, current, self.cell_size, self.threshold);
        debug!("Motion zones this tick: {}", zones);

        if zones > self.max_zones {
            CrowdVerdict::MotionSuspect { zones }
        } else if zones <= 1 {
            CrowdVerdict::Single
        } else {
            CrowdVerdict::Ambiguous { zones }
        }
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
