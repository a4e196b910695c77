//! Mode-specific terminal behavior

use std::time::Duration;

use crate::engine::Transition;
use crate::{EscalationConfig, SessionMode};

/// What happens once the attempt threshold is reached
pub trait EscalationPolicy: Send + Sync {
    fn mode(&self) -> SessionMode;

    fn threshold(&self) -> u32;

    /// Terminal transition taken at the threshold
    fn on_threshold(&self) -> Transition;
}

/// Quiz: educational interstitial, then termination
#[derive(Debug, Clone)]
pub struct QuizEscalation {
    threshold: u32,
    sensitization: Duration,
}

impl QuizEscalation {
    pub fn new(config: &EscalationConfig) -> Self {
        Self {
            threshold: config.threshold,
            sensitization: config.sensitization(),
        }
    }
}

impl EscalationPolicy for QuizEscalation {
    fn mode(&self) -> SessionMode {
        SessionMode::Quiz
    }

    fn threshold(&self) -> u32 {
        self.threshold
    }

    fn on_threshold(&self) -> Transition {
        Transition::Sensitize {
            duration: self.sensitization,
        }
    }
}

/// Exam: immediate end, stop after a short delay
#[derive(Debug, Clone)]
pub struct ExamEscalation {
    threshold: u32,
    stop_delay: Duration,
}

impl ExamEscalation {
    pub fn new(config: &EscalationConfig) -> Self {
        Self {
            threshold: config.threshold,
            stop_delay: config.exam_stop_delay(),
        }
    }
}

impl EscalationPolicy for ExamEscalation {
    fn mode(&self) -> SessionMode {
        SessionMode::Exam
    }

    fn threshold(&self) -> u32 {
        self.threshold
    }

    fn on_threshold(&self) -> Transition {
        Transition::EndExam {
            stop_delay: self.stop_delay,
        }
    }
}

pub fn policy_for(mode: SessionMode, config: &EscalationConfig) -> Box<dyn EscalationPolicy> {
    match mode {
        SessionMode::Quiz => Box::new(QuizEscalation::new(config)),
        SessionMode::Exam => Box::new(ExamEscalation::new(config)),
    }
}
