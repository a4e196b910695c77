//! Alert Manager Implementation

use escalation::ViolationKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Identical alerts within this window are suppressed (milliseconds)
    pub dedup_window_ms: u64,
    /// History entries older than this are pruned (milliseconds)
    pub history_window_ms: u64,
    /// Max history entries kept
    pub history_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 5_000,
            history_window_ms: 10_000,
            history_capacity: 64,
        }
    }
}

/// A surfaced alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    /// Unix time (milliseconds)
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    message: String,
    kind: ViolationKind,
    raised_at: Instant,
}

/// Alert manager for deduplication
pub struct AlertManager {
    config: AlertConfig,
    history: VecDeque<HistoryEntry>,
    suppressed: u64,
}

impl AlertManager {
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            config,
            suppressed: 0,
        }
    }

    /// Raise an alert; `None` if an identical one surfaced within the dedup window
    pub fn raise(&mut self, message: &str, kind: ViolationKind) -> Option<AlertEvent> {
        self.raise_at(message, kind, Instant::now())
    }

    pub fn raise_at(
        &mut self,
        message: &str,
        kind: ViolationKind,
        now: Instant,
    ) -> Option<AlertEvent> {
        self.prune(now);

        let dedup_window = Duration::from_millis(self.config.dedup_window_ms);
        let duplicate = self.history.iter().any(|entry| {
            entry.kind == kind
                && entry.message == message
                && now.saturating_duration_since(entry.raised_at) < dedup_window
        });
        if duplicate {
            self.suppressed += 1;
            debug!("Alert suppressed: duplicate within window ({})", kind);
            return None;
        }

        if self.history.len() >= self.config.history_capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            message: message.to_string(),
            kind,
            raised_at: now,
        });

        info!("Alert raised: [{}] {}", kind, message);
        Some(AlertEvent {
            message: message.to_string(),
            kind,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    fn prune(&mut self, now: Instant) {
        let window = Duration::from_millis(self.config.history_window_ms);
        while let Some(front) = self.history.front() {
            if now.saturating_duration_since(front.raised_at) > window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Alerts suppressed so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Entries currently in the recency history
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduplication() {
        let mut manager = AlertManager::default();
        let now = Instant::now();

        assert!(manager.raise_at("Stay silent", ViolationKind::Speech, now).is_some());
        assert!(manager
            .raise_at("Stay silent", ViolationKind::Speech, now + Duration::from_secs(3))
            .is_none());
        assert_eq!(manager.suppressed(), 1);

        // Window measured from the surfaced alert, not the suppressed one
        assert!(manager
            .raise_at("Stay silent", ViolationKind::Speech, now + Duration::from_secs(5))
            .is_some());
    }

    #[test]
    fn test_key_includes_type() {
        let mut manager = AlertManager::default();
        let now = Instant::now();
        assert!(manager.raise_at("Look here", ViolationKind::Absence, now).is_some());
        assert!(manager.raise_at("Look here", ViolationKind::Decentered, now).is_some());
        assert!(manager.raise_at("Look elsewhere", ViolationKind::Absence, now).is_some());
    }

    #[test]
    fn test_history_pruned() {
        let mut manager = AlertManager::default();
        let now = Instant::now();
        manager.raise_at("a", ViolationKind::Speech, now);
        manager.raise_at("b", ViolationKind::Speech, now + Duration::from_secs(4));
        assert_eq!(manager.history_len(), 2);

        manager.raise_at("c", ViolationKind::Speech, now + Duration::from_secs(11));
        assert_eq!(manager.history_len(), 2);
    }

    #[test]
    fn test_clear_forgets_recent_alerts() {
        let mut manager = AlertManager::default();
        let now = Instant::now();
        assert!(manager.raise_at("Stay silent", ViolationKind::Speech, now).is_some());

        manager.clear();
        assert_eq!(manager.history_len(), 0);
        assert!(manager
            .raise_at("Stay silent", ViolationKind::Speech, now + Duration::from_secs(1))
            .is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut manager = AlertManager::new(AlertConfig {
            history_capacity: 2,
            ..Default::default()
        });
        let now = Instant::now();
        manager.raise_at("a", ViolationKind::Speech, now);
        manager.raise_at("b", ViolationKind::Speech, now);
        manager.raise_at("c", ViolationKind::Speech, now);
        assert_eq!(manager.history_len(), 2);
        // "a" was evicted, so it surfaces again
        assert!(manager.raise_at("a", ViolationKind::Speech, now).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_follows_clock() {
        let mut manager = AlertManager::default();
        assert!(manager.raise("Stay silent", ViolationKind::Speech).is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(manager.raise("Stay silent", ViolationKind::Speech).is_none());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(manager.raise("Stay silent", ViolationKind::Speech).is_some());
    }

    #[test]
    fn test_event_wire_shape() {
        let mut manager = AlertManager::default();
        let event = manager.raise("Stay silent", ViolationKind::Speech).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "speech");
        assert_eq!(json["message"], "Stay silent");
    }
}
