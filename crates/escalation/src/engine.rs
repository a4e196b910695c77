//! Escalation state machine

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::counter::FraudAttemptCounter;
use crate::policy::{policy_for, EscalationPolicy};
use crate::{EscalationConfig, EscalationError, SessionMode, Violation};

/// Session escalation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "attempts", rename_all = "snake_case")]
pub enum EscalationState {
    #[default]
    Monitoring,
    Warned(u32),
    Sensitizing,
    Terminated,
    ExamEnded,
}

impl EscalationState {
    /// No further detection once here
    pub fn halts_detection(&self) -> bool {
        matches!(
            self,
            EscalationState::Sensitizing | EscalationState::Terminated | EscalationState::ExamEnded
        )
    }
}

/// Outcome of applying one violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    /// Nothing changes (already counted this tick, or terminal)
    Continue,
    /// Below threshold: surface a warning
    Warn { attempts: u32 },
    /// Quiz threshold: interstitial for `duration`, then terminate
    Sensitize { duration: Duration },
    /// Exam threshold: stop the session after `stop_delay`
    EndExam { stop_delay: Duration },
    /// Interstitial finished, session over
    Terminate,
}

/// Owns the attempt counter; detectors only submit violations.
pub struct EscalationEngine {
    policy: Box<dyn EscalationPolicy>,
    counter: FraudAttemptCounter,
    state: EscalationState,
    last_counted_tick: Option<u64>,
}

impl EscalationEngine {
    pub fn new(mode: SessionMode, config: &EscalationConfig) -> Self {
        Self::with_policy(policy_for(mode, config))
    }

    pub fn with_policy(policy: Box<dyn EscalationPolicy>) -> Self {
        Self {
            policy,
            counter: FraudAttemptCounter::new(),
            state: EscalationState::Monitoring,
            last_counted_tick: None,
        }
    }

    /// Apply one violation.
    ///
    /// The counter advances at most once per tick; further violations from
    /// the same tick return `Continue`.
    pub fn apply(&mut self, violation: &Violation) -> Transition {
        if self.state.halts_detection() {
            debug!("Ignoring {} in state {:?}", violation.kind, self.state);
            return Transition::Continue;
        }

        if self.last_counted_tick == Some(violation.tick) {
            debug!(
                "Tick {} already counted, not escalating {}",
                violation.tick, violation.kind
            );
            return Transition::Continue;
        }

        let attempts = match self.counter.increment() {
            Some(attempts) => attempts,
            None => return Transition::Continue,
        };
        self.last_counted_tick = Some(violation.tick);

        if attempts < self.policy.threshold() {
            warn!(
                "Fraud attempt {}/{}: {}",
                attempts,
                self.policy.threshold(),
                violation.kind
            );
            self.state = EscalationState::Warned(attempts);
            return Transition::Warn { attempts };
        }

        self.counter.freeze();
        let transition = self.policy.on_threshold();
        self.state = match transition {
            Transition::Sensitize { .. } => EscalationState::Sensitizing,
            Transition::EndExam { .. } => EscalationState::ExamEnded,
            _ => EscalationState::Terminated,
        };
        info!(
            "Fraud threshold reached in {} mode after {}, entering {:?}",
            self.policy.mode(),
            violation.kind,
            self.state
        );
        transition
    }

    /// Close the quiz interstitial
    pub fn finish_sensitization(&mut self) -> Result<Transition, EscalationError> {
        if self.state != EscalationState::Sensitizing {
            return Err(EscalationError::InvalidTransition {
                from: self.state,
                reason: "not sensitizing",
            });
        }
        self.state = EscalationState::Terminated;
        info!("Sensitization finished, session terminated");
        Ok(Transition::Terminate)
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.counter.value()
    }

    pub fn mode(&self) -> SessionMode {
        self.policy.mode()
    }

    /// Terminated or ExamEnded
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            EscalationState::Terminated | EscalationState::ExamEnded
        )
    }
}
