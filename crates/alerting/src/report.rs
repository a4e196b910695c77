//! Fraud report sent to the backend

use chrono::SecondsFormat;
use escalation::{SessionMode, Violation, ViolationKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session counters copied into a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub multiple_persons_detected: u64,
    pub position_violations: u64,
    pub speech_detections: u64,
}

/// Durable fraud record, in the backend's field names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub id: String,
    /// Student id
    pub id_ref: String,
    pub ref_type: SessionMode,
    pub type_fraude: ViolationKind,
    /// RFC 3339
    pub date_fraude: String,
    pub details: String,
    pub multiple_persons_detected: u64,
    pub position_violations: u64,
    pub speech_detections: u64,
    /// Fraud attempts so far
    pub nombre_fraude: u32,
}

impl FraudReport {
    pub fn from_violation(
        student_id: &str,
        mode: SessionMode,
        violation: &Violation,
        attempts: u32,
        counts: ReportCounts,
    ) -> Self {
        let details = match violation.count {
            Some(count) => format!("{} (count: {})", violation.message, count),
            None => violation.message.clone(),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            id_ref: student_id.to_string(),
            ref_type: mode,
            type_fraude: violation.kind,
            date_fraude: violation
                .detected_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            details,
            multiple_persons_detected: counts.multiple_persons_detected,
            position_violations: counts.position_violations,
            speech_detections: counts.speech_detections,
            nombre_fraude: attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_fields() {
        let violation = Violation::new(ViolationKind::MultipleFaces, 5).with_count(2);
        let counts = ReportCounts {
            multiple_persons_detected: 1,
            position_violations: 3,
            speech_detections: 0,
        };
        let report = FraudReport::from_violation("stu-42", SessionMode::Exam, &violation, 2, counts);

        assert_eq!(report.id_ref, "stu-42");
        assert_eq!(report.nombre_fraude, 2);
        assert!(report.details.contains("count: 2"));
        assert!(Uuid::parse_str(&report.id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&report.date_fraude).is_ok());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ref_type"], "exam");
        assert_eq!(json["type_fraude"], "multiple_faces");
        assert_eq!(json["position_violations"], 3);
    }

    #[test]
    fn test_ids_are_fresh() {
        let violation = Violation::new(ViolationKind::Speech, 1);
        let a = FraudReport::from_violation("s", SessionMode::Quiz, &violation, 1, ReportCounts::default());
        let b = FraudReport::from_violation("s", SessionMode::Quiz, &violation, 1, ReportCounts::default());
        assert_ne!(a.id, b.id);
    }
}
