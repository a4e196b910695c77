//! Proctoring Session
//!
//! Runs the periodic integrity checks for one student:
//! - A timer feeding a bounded tick queue, drained by a single worker
//! - Presence, position, crowd and speech checks per tick
//! - Escalation, deduplicated alerts and fraud reports
//! - Device release and the stop callback on termination

mod config;
mod orchestrator;
mod session;
mod status;

#[cfg(test)]
mod testing;

pub use crate::config::{ProctorConfig, ENV_PREFIX};
pub use orchestrator::{TickOrchestrator, TickOutcome};
pub use session::{
    ProctorSession, SessionEnd, SessionEvent, SessionRequest, SessionSnapshot, StopCallback,
};
pub use status::{
    integrity_score, CategoryStatus, Metrics, SessionSummary, StatusLevel, SurveillanceStatus,
};

use media_capture::CaptureError;
use thiserror::Error;

/// Session error types
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("Camera/microphone unavailable: {0}")]
    SensorUnavailable(#[source] CaptureError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}
