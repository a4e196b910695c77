//! One detection pass per tick

use audio_activity::{AudioActivityDetector, SpeechVerdict};
use escalation::{Violation, ViolationKind};
use media_capture::{MediaDevice, VideoFrame};
use tracing::{debug, warn};
use vision::{
    CrowdDetector, CrowdVerdict, PositionEvaluator, PositionVerdict, PresenceDetector,
    PresenceReading, PresenceStrategy, PresenceVerdict,
};

use crate::config::ProctorConfig;
use crate::status::{CategoryStatus, Metrics, StatusLevel, SurveillanceStatus};

/// Result of one tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// `total_checks` after this tick
    pub tick: u64,
    /// At most one per cause, in detector order
    pub violations: Vec<Violation>,
}

/// Runs presence, position, crowd and audio detection against one device
/// snapshot and owns the status and counters they update.
pub struct TickOrchestrator {
    presence: Box<dyn PresenceDetector>,
    position: PositionEvaluator,
    crowd: CrowdDetector,
    audio: AudioActivityDetector,
    status: SurveillanceStatus,
    metrics: Metrics,
}

impl TickOrchestrator {
    pub fn new(presence: Box<dyn PresenceDetector>, config: &ProctorConfig) -> Self {
        Self {
            presence,
            position: PositionEvaluator::new(&config.vision),
            crowd: CrowdDetector::new(&config.vision),
            audio: AudioActivityDetector::new(config.audio.clone()),
            status: SurveillanceStatus::default(),
            metrics: Metrics::default(),
        }
    }

    /// One detection pass. Detector failures degrade their category to
    /// `warning` and never abort the pass.
    pub fn run_tick(&mut self, device: &mut dyn MediaDevice) -> TickOutcome {
        self.metrics.total_checks += 1;
        let tick = self.metrics.total_checks;
        metrics::counter!("proctor_ticks_total").increment(1);

        let mut violations = Vec::new();

        match device.capture_frame() {
            Ok(frame) => {
                self.status.camera = "camera active".to_string();
                let reading = self.check_presence(&frame, tick, &mut violations);
                self.check_crowd(&frame, reading.as_ref(), tick, &mut violations);
            }
            Err(e) => {
                warn!("Frame capture failed on tick {}: {}", tick, e);
                self.status.camera = "camera error".to_string();
                self.status.face = CategoryStatus::new(StatusLevel::Warning, "Detection error");
                self.status.position = CategoryStatus::new(StatusLevel::Warning, "Position unknown");
                self.status.people =
                    CategoryStatus::new(StatusLevel::Warning, "Manual check required");
            }
        }

        self.check_audio(device, tick, &mut violations);
        self.count(&violations);

        debug!("Tick {} finished with {} violation(s)", tick, violations.len());
        TickOutcome { tick, violations }
    }

    fn check_presence(
        &mut self,
        frame: &VideoFrame,
        tick: u64,
        violations: &mut Vec<Violation>,
    ) -> Option<PresenceReading> {
        let reading = match self.presence.detect(frame) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Presence detection failed on tick {}: {}", tick, e);
                self.status.face = CategoryStatus::new(StatusLevel::Warning, "Detection error");
                self.status.position = CategoryStatus::new(StatusLevel::Warning, "Position unknown");
                return None;
            }
        };

        match reading.verdict {
            PresenceVerdict::Absent => {
                let text = match reading.strategy {
                    PresenceStrategy::Heuristic => "Camera blocked",
                    PresenceStrategy::Ml => "No face detected",
                };
                self.status.face = CategoryStatus::new(StatusLevel::Danger, text);
                self.status.position = CategoryStatus::new(StatusLevel::Danger, "No visibility");
                violations.push(Violation::new(ViolationKind::Absence, tick));
            }
            PresenceVerdict::Present => {
                self.metrics.face_detections += 1;
                self.status.face = CategoryStatus::new(StatusLevel::Ok, "Presence detected");

                if let Some(region) = reading.single_region() {
                    match self.position.evaluate(region, frame.width, frame.height) {
                        PositionVerdict::Centered { .. } => {
                            self.status.position =
                                CategoryStatus::new(StatusLevel::Ok, "Position OK");
                        }
                        PositionVerdict::Decentered { distance } => {
                            self.status.position =
                                CategoryStatus::new(StatusLevel::Warning, "Off center");
                            debug!("Face {:.0}px from center", distance);
                            violations.push(Violation::new(ViolationKind::Decentered, tick));
                        }
                    }
                }
            }
            PresenceVerdict::Multiple(count) => {
                self.status.face = CategoryStatus::new(
                    StatusLevel::Danger,
                    format!("{} faces detected", count),
                );
                self.status.position =
                    CategoryStatus::new(StatusLevel::Danger, "Several people in frame");
                violations.push(Violation::new(ViolationKind::MultipleFaces, tick).with_count(count));
            }
        }

        Some(reading)
    }

    fn check_crowd(
        &mut self,
        frame: &VideoFrame,
        reading: Option<&PresenceReading>,
        tick: u64,
        violations: &mut Vec<Violation>,
    ) {
        match self.crowd.assess(frame, reading) {
            CrowdVerdict::Warmup => {
                self.status.people = CategoryStatus::new(StatusLevel::Ok, "Analysis in progress");
            }
            CrowdVerdict::Single => {
                self.status.people = CategoryStatus::new(StatusLevel::Ok, "One person");
            }
            CrowdVerdict::Ambiguous { zones } => {
                debug!("Ambiguous motion ({} zones), people status unchanged", zones);
            }
            CrowdVerdict::MultiplePersons { count } => {
                self.status.people = CategoryStatus::new(
                    StatusLevel::Danger,
                    format!("{} people detected", count),
                );
                violations
                    .push(Violation::new(ViolationKind::MultiplePersons, tick).with_count(count));
            }
            CrowdVerdict::MotionSuspect { zones } => {
                self.status.people =
                    CategoryStatus::new(StatusLevel::Warning, "Suspicious movement");
                violations.push(Violation::new(ViolationKind::MotionSuspect, tick).with_count(zones));
            }
        }
    }

    fn check_audio(&mut self, device: &mut dyn MediaDevice, tick: u64, violations: &mut Vec<Violation>) {
        let verdict = device
            .audio_buffers()
            .map_err(|e| e.to_string())
            .and_then(|buffers| self.audio.classify(&buffers).map_err(|e| e.to_string()));

        match verdict {
            Ok(SpeechVerdict::Speech { .. }) => {
                self.status.speech = CategoryStatus::new(StatusLevel::Danger, "Voice activity");
                violations.push(Violation::new(ViolationKind::Speech, tick));
            }
            Ok(SpeechVerdict::Ambient { .. }) => {
                self.status.speech = CategoryStatus::new(StatusLevel::Warning, "Ambient noise");
            }
            Ok(SpeechVerdict::Silent { .. }) => {
                self.status.speech = CategoryStatus::new(StatusLevel::Ok, "Silent");
            }
            Ok(SpeechVerdict::Inactive { state }) => {
                debug!("Audio context {:?}, skipping classification", state);
                self.status.speech =
                    CategoryStatus::new(StatusLevel::Warning, "Audio not initialised");
            }
            Err(e) => {
                warn!("Audio analysis failed on tick {}: {}", tick, e);
                self.status.speech = CategoryStatus::new(StatusLevel::Warning, "Audio error");
            }
        }
    }

    /// Each counter moves at most once per tick
    fn count(&mut self, violations: &[Violation]) {
        let any = |kinds: &[ViolationKind]| violations.iter().any(|v| kinds.contains(&v.kind));

        if any(&[ViolationKind::Absence, ViolationKind::Decentered]) {
            self.metrics.position_violations += 1;
        }
        if any(&[
            ViolationKind::MultipleFaces,
            ViolationKind::MultiplePersons,
            ViolationKind::MotionSuspect,
        ]) {
            self.metrics.multiple_persons_detected += 1;
        }
        if any(&[ViolationKind::Speech]) {
            self.metrics.speech_detections += 1;
        }

        for violation in violations {
            metrics::counter!("proctor_violations_total", "kind" => violation.kind.as_str())
                .increment(1);
        }
    }

    pub fn status(&self) -> &SurveillanceStatus {
        &self.status
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn strategy(&self) -> PresenceStrategy {
        self.presence.strategy()
    }
}
