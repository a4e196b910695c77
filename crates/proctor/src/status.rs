//! Surveillance status, counters and the end-of-session summary

use alerting::{AlertEvent, ReportCounts};
use escalation::{EscalationState, SessionMode};
use serde::{Deserialize, Serialize};

/// Severity shown for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    #[default]
    Ok,
    Warning,
    Danger,
}

/// Level plus display text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub level: StatusLevel,
    pub text: String,
}

impl CategoryStatus {
    pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Per-category status, overwritten in place every tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveillanceStatus {
    pub face: CategoryStatus,
    pub position: CategoryStatus,
    pub people: CategoryStatus,
    pub speech: CategoryStatus,
    /// Persistent camera line ("camera active", "camera/microphone unavailable")
    pub camera: String,
}

impl Default for SurveillanceStatus {
    fn default() -> Self {
        Self {
            face: CategoryStatus::new(StatusLevel::Ok, "Detection ready"),
            position: CategoryStatus::new(StatusLevel::Ok, "Position not checked yet"),
            people: CategoryStatus::new(StatusLevel::Ok, "Analysis in progress"),
            speech: CategoryStatus::new(StatusLevel::Ok, "Audio analysis ready"),
            camera: "camera starting".to_string(),
        }
    }
}

impl SurveillanceStatus {
    /// Status for a session whose devices could not be opened
    pub fn unavailable() -> Self {
        let blocked = CategoryStatus::new(StatusLevel::Warning, "Monitoring not started");
        Self {
            face: blocked.clone(),
            position: blocked.clone(),
            people: blocked.clone(),
            speech: blocked,
            camera: "camera/microphone unavailable".to_string(),
        }
    }
}

/// Session counters; never decremented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub face_detections: u64,
    pub position_violations: u64,
    pub speech_detections: u64,
    pub multiple_persons_detected: u64,
    pub total_checks: u64,
}

impl Metrics {
    pub fn total_violations(&self) -> u64 {
        self.position_violations + self.speech_detections + self.multiple_persons_detected
    }

    pub fn report_counts(&self) -> ReportCounts {
        ReportCounts {
            multiple_persons_detected: self.multiple_persons_detected,
            position_violations: self.position_violations,
            speech_detections: self.speech_detections,
        }
    }
}

/// Integrity score in percent, two decimals: 10 points off per violation
pub fn integrity_score(total_violations: u64) -> f64 {
    let penalty = (total_violations as f64 * 0.1).min(1.0);
    let score = (1.0 - penalty).max(0.0) * 100.0;
    (score * 100.0).round() / 100.0
}

/// What the submission flow sends once a session is over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub student_id: String,
    pub mode: SessionMode,
    pub metrics: Metrics,
    pub total_violations: u64,
    pub integrity_score: f64,
    pub attempts: u32,
    pub final_state: EscalationState,
    pub alerts_history: Vec<AlertEvent>,
}

impl SessionSummary {
    pub fn new(
        student_id: String,
        mode: SessionMode,
        metrics: Metrics,
        attempts: u32,
        final_state: EscalationState,
        alerts_history: Vec<AlertEvent>,
    ) -> Self {
        let total_violations = metrics.total_violations();
        Self {
            student_id,
            mode,
            metrics,
            total_violations,
            integrity_score: integrity_score(total_violations),
            attempts,
            final_state,
            alerts_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_score() {
        assert_eq!(integrity_score(0), 100.0);
        assert_eq!(integrity_score(3), 70.0);
        assert_eq!(integrity_score(10), 0.0);
        assert_eq!(integrity_score(25), 0.0);
    }

    #[test]
    fn test_summary_totals() {
        let metrics = Metrics {
            face_detections: 10,
            position_violations: 2,
            speech_detections: 1,
            multiple_persons_detected: 1,
            total_checks: 12,
        };
        let summary = SessionSummary::new(
            "stu".into(),
            SessionMode::Quiz,
            metrics,
            3,
            EscalationState::Terminated,
            Vec::new(),
        );
        assert_eq!(summary.total_violations, 4);
        assert_eq!(summary.integrity_score, 60.0);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(Metrics::default()).unwrap();
        assert!(json.get("multiple_persons_detected").is_some());
        assert!(json.get("total_checks").is_some());

        let json = serde_json::to_value(CategoryStatus::new(StatusLevel::Danger, "x")).unwrap();
        assert_eq!(json["level"], "danger");
    }
}
