//! ONNX face detection and session-time strategy selection

use media_capture::VideoFrame;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::analysis::{DetectionRegion, PresenceReading, RegionSource};
use crate::detector::{FallbackPresence, HeuristicDetector, PresenceDetector, PresenceStrategy};
use crate::{VisionConfig, VisionError};

/// Face detector backed by an ONNX model with `scores[1,N,2]` and
/// `boxes[1,N,4]` (normalized corner) outputs
pub struct MlDetector {
    session: Session,
    input_width: u32,
    input_height: u32,
    score_threshold: f32,
    nms_iou_threshold: f32,
}

impl MlDetector {
    /// Load the model. Blocking; call off the async executor.
    pub fn load(path: &str, config: &VisionConfig) -> Result<Self, VisionError> {
        info!("Loading face detection model from {}", path);
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load face model: {}", e);
                VisionError::ModelLoad(e.to_string())
            })?;

        Ok(Self {
            session,
            input_width: config.model_input_width,
            input_height: config.model_input_height,
            score_threshold: config.score_threshold,
            nms_iou_threshold: config.nms_iou_threshold,
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Array4<f32>, VisionError> {
        let img = frame
            .as_rgb_image()
            .ok_or_else(|| VisionError::ImageProcessing("Failed to create image buffer".into()))?;

        let resized = image::imageops::resize(
            &img,
            self.input_width,
            self.input_height,
            image::imageops::FilterType::Triangle,
        );

        // 1x3xHxW, normalized to roughly -1..1
        let mut input = Array4::<f32>::zeros((
            1,
            3,
            self.input_height as usize,
            self.input_width as usize,
        ));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - 127.0) / 128.0;
            }
        }
        Ok(input)
    }
}

impl PresenceDetector for MlDetector {
    fn strategy(&self) -> PresenceStrategy {
        PresenceStrategy::Ml
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<PresenceReading, VisionError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(VisionError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        let input = self.preprocess(frame)?;

        let outputs = self
            .session
            .run(ort::inputs![input].map_err(|e| VisionError::Inference(e.to_string()))?)
            .map_err(|e| VisionError::Inference(e.to_string()))?;
        check_output_count(outputs.len())?;

        let scores: Vec<f32> = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();
        let boxes: Vec<f32> = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();

        let regions = decode_detections(
            &scores,
            &boxes,
            frame.width,
            frame.height,
            self.score_threshold,
            self.nms_iou_threshold,
        );
        Ok(PresenceReading::from_regions(regions))
    }
}

/// The face model must yield scores and boxes
fn check_output_count(count: usize) -> Result<(), VisionError> {
    if count < 2 {
        return Err(VisionError::Inference(format!(
            "expected scores and boxes outputs, model produced {}",
            count
        )));
    }
    Ok(())
}

/// Turn raw model outputs into face regions: score threshold, then greedy NMS
pub fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<DetectionRegion> {
    let count = (scores.len() / 2).min(boxes.len() / 4);
    let (w, h) = (frame_width as f32, frame_height as f32);

    let mut candidates: Vec<DetectionRegion> = (0..count)
        .filter_map(|i| {
            let score = scores[i * 2 + 1];
            if score < score_threshold {
                return None;
            }
            let b = &boxes[i * 4..i * 4 + 4];
            let x1 = b[0].clamp(0.0, 1.0) * w;
            let y1 = b[1].clamp(0.0, 1.0) * h;
            let x2 = b[2].clamp(0.0, 1.0) * w;
            let y2 = b[3].clamp(0.0, 1.0) * h;
            if x2 <= x1 || y2 <= y1 {
                return None;
            }
            Some(DetectionRegion {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: score,
                source: RegionSource::Ml,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<DetectionRegion> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Pick the session's presence detector.
///
/// Any load failure or timeout selects the heuristic for the rest of the
/// session; there is no retry.
pub async fn load_presence_detector(config: &VisionConfig) -> Box<dyn PresenceDetector> {
    let heuristic = HeuristicDetector::new(config);

    let path = match &config.model_path {
        Some(path) => path.clone(),
        None => {
            info!("No face model configured, using heuristic presence detection");
            return Box::new(heuristic);
        }
    };

    let model_config = config.clone();
    load_with(
        move || {
            MlDetector::load(&path, &model_config)
                .map(|detector| Box::new(detector) as Box<dyn PresenceDetector>)
        },
        Duration::from_millis(config.model_load_timeout_ms),
        heuristic,
    )
    .await
}

/// Run a blocking model loader under a timeout
pub async fn load_with<F>(
    loader: F,
    timeout: Duration,
    heuristic: HeuristicDetector,
) -> Box<dyn PresenceDetector>
where
    F: FnOnce() -> Result<Box<dyn PresenceDetector>, VisionError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(loader)).await {
        Ok(Ok(Ok(model))) => {
            info!("Face model ready, ML presence detection enabled");
            Box::new(FallbackPresence::new(model, heuristic))
        }
        Ok(Ok(Err(e))) => {
            warn!("Face model unavailable, falling back to heuristic: {}", e);
            Box::new(heuristic)
        }
        Ok(Err(e)) => {
            warn!("Face model loader panicked, falling back to heuristic: {}", e);
            Box::new(heuristic)
        }
        Err(_) => {
            warn!(
                "{}, falling back to heuristic",
                VisionError::ModelLoadTimeout(timeout.as_millis() as u64)
            );
            Box::new(heuristic)
        }
    }
}
