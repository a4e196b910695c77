//! Violations submitted by the detectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session mode, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Quiz,
    Exam,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Quiz => "quiz",
            SessionMode::Exam => "exam",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation type, serialized with the backend's wire names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Absence,
    Decentered,
    MultipleFaces,
    MultiplePersons,
    MotionSuspect,
    Speech,
}

/// Detector family a violation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cause {
    Presence,
    Position,
    Crowd,
    Speech,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Absence => "absence",
            ViolationKind::Decentered => "decentered",
            ViolationKind::MultipleFaces => "multiple_faces",
            ViolationKind::MultiplePersons => "multiple_persons",
            ViolationKind::MotionSuspect => "motion_suspect",
            ViolationKind::Speech => "speech",
        }
    }

    pub fn cause(&self) -> Cause {
        match self {
            ViolationKind::Absence | ViolationKind::MultipleFaces => Cause::Presence,
            ViolationKind::Decentered => Cause::Position,
            ViolationKind::MultiplePersons | ViolationKind::MotionSuspect => Cause::Crowd,
            ViolationKind::Speech => Cause::Speech,
        }
    }

    /// Candidate-facing alert text
    pub fn default_message(&self) -> &'static str {
        match self {
            ViolationKind::Absence => "Camera appears blocked or no face is visible",
            ViolationKind::Decentered => "Please stay centered in front of the camera",
            ViolationKind::MultipleFaces => "Several faces detected in front of the camera",
            ViolationKind::MultiplePersons => "Several people detected in the room",
            ViolationKind::MotionSuspect => "Suspicious movement detected around you",
            ViolationKind::Speech => "Voice activity detected, stay silent during the test",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single qualifying detector outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,

    /// Tick that produced it (1-based `total_checks` value)
    pub tick: u64,

    /// Faces, people or zones involved, where meaningful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    pub message: String,

    pub detected_at: DateTime<Utc>,
}

impl Violation {
    pub fn new(kind: ViolationKind, tick: u64) -> Self {
        Self {
            kind,
            tick,
            count: None,
            message: kind.default_message().to_string(),
            detected_at: Utc::now(),
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn cause(&self) -> Cause {
        self.kind.cause()
    }
}
