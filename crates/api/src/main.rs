//! Proctoring Agent - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server};
use fraud_sync::{FraudSink, HttpFraudReporter};
use proctor::ProctorConfig;
use std::sync::Arc;
use tracing::info;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Proctoring Agent v{} ===", env!("CARGO_PKG_VERSION"));

    // Optional config file as the first argument
    let path = std::env::args().nth(1);
    let config = ProctorConfig::load(path.as_deref()).context("loading configuration")?;

    let reporter = HttpFraudReporter::new(&config.backend).context("building report client")?;
    info!("Fraud reports go to {}", reporter.endpoint());
    let sink: Arc<dyn FraudSink> = Arc::new(reporter);

    let addr = std::env::var("PROCTOR_API_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    run_server(&addr, config, Some(sink))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
