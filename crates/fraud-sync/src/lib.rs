//! Fraud Report Synchronization
//!
//! Delivers `FraudReport`s to the backend without ever blocking detection:
//! - `FraudSink` seam with an HTTP implementation
//! - Bounded dispatch queue drained by one task
//! - Failures logged and dropped, never retried

mod client;
mod dispatcher;

pub use client::{HttpFraudReporter, ReportAck};
pub use dispatcher::{DispatchStats, ReportDispatcher};

use alerting::FraudReport;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Sync error types
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    Server(u16),

    #[error("Report rejected: {0}")]
    Rejected(String),

    #[error("Report queue full")]
    QueueFull,

    #[error("Report queue closed")]
    Closed,
}

/// Boxed future returned by `FraudSink::submit`
pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = Result<ReportAck, SyncError>> + Send + 'a>>;

/// Destination for fraud reports
pub trait FraudSink: Send + Sync {
    fn submit<'a>(&'a self, report: &'a FraudReport) -> SubmitFuture<'a>;
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; the report path is appended
    pub base_url: String,
    /// Request timeout (milliseconds)
    pub timeout_ms: u64,
    /// Pending reports before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 5_000,
            queue_capacity: 16,
        }
    }
}
