//! Alerting System
//!
//! Candidate-facing alerts and the durable fraud record:
//! - Sliding-window deduplication keyed by message and type
//! - Bounded recency history
//! - `FraudReport` construction for the backend

mod manager;
mod report;

pub use manager::{AlertConfig, AlertEvent, AlertManager};
pub use report::{FraudReport, ReportCounts};
