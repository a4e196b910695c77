//! Escalation Engine
//!
//! Turns detector violations into session-level consequences:
//! - One fraud-attempt counter per session, owned by the engine
//! - Mode-specific terminal behavior (quiz interstitial vs. exam end)
//! - Absorbing terminal states with a frozen counter

mod counter;
mod engine;
mod policy;
mod violation;

pub use counter::FraudAttemptCounter;
pub use engine::{EscalationEngine, EscalationState, Transition};
pub use policy::{policy_for, EscalationPolicy, ExamEscalation, QuizEscalation};
pub use violation::{Cause, SessionMode, Violation, ViolationKind};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Escalation error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EscalationError {
    #[error("Invalid transition from {from:?}: {reason}")]
    InvalidTransition {
        from: EscalationState,
        reason: &'static str,
    },
}

/// Escalation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Attempts that end the session, in both modes
    pub threshold: u32,

    /// Length of the quiz interstitial (milliseconds)
    pub sensitization_ms: u64,

    /// Delay between exam end and the stop callback (milliseconds)
    pub exam_stop_delay_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            sensitization_ms: 20_000,
            exam_stop_delay_ms: 2_000,
        }
    }
}

impl EscalationConfig {
    pub fn sensitization(&self) -> Duration {
        Duration::from_millis(self.sensitization_ms)
    }

    pub fn exam_stop_delay(&self) -> Duration {
        Duration::from_millis(self.exam_stop_delay_ms)
    }
}
