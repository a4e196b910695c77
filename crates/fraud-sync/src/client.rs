//! HTTP fraud reporter

use alerting::FraudReport;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{BackendConfig, FraudSink, SubmitFuture, SyncError};

const REPORT_PATH: &str = "/api/fraud/report";

/// Backend response to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

pub struct HttpFraudReporter {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpFraudReporter {
    pub fn new(config: &BackendConfig) -> Result<Self, SyncError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let endpoint = format!("{}{}", config.base_url.trim_end_matches('/'), REPORT_PATH);
        info!("Fraud reports will be sent to {}", endpoint);

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one report
    pub async fn send(&self, report: &FraudReport) -> Result<ReportAck, SyncError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Server(response.status().as_u16()));
        }

        let ack: ReportAck = response.json().await?;
        if !ack.success {
            return Err(SyncError::Rejected(
                ack.message.unwrap_or_else(|| "no message".to_string()),
            ));
        }

        debug!("Report {} accepted", report.id);
        Ok(ack)
    }
}

impl FraudSink for HttpFraudReporter {
    fn submit<'a>(&'a self, report: &'a FraudReport) -> SubmitFuture<'a> {
        Box::pin(self.send(report))
    }
}
