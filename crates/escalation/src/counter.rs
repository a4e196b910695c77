//! Fraud attempt counter

use serde::{Deserialize, Serialize};

/// Increment-only attempt counter. Once frozen, increments are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAttemptCounter {
    value: u32,
    frozen: bool,
}

impl FraudAttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new value, or `None` when frozen
    pub fn increment(&mut self) -> Option<u32> {
        if self.frozen {
            return None;
        }
        self.value = self.value.saturating_add(1);
        Some(self.value)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_counter_ignores_increments() {
        let mut counter = FraudAttemptCounter::new();
        assert_eq!(counter.increment(), Some(1));
        counter.freeze();
        assert_eq!(counter.increment(), None);
        assert_eq!(counter.value(), 1);
        assert!(counter.is_frozen());
    }
}
