//! Bounded report queue

use alerting::FraudReport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{FraudSink, SyncError};

/// Delivery counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl DispatchStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Hands reports to a single delivery task without blocking the caller
pub struct ReportDispatcher {
    tx: mpsc::Sender<FraudReport>,
    stats: Arc<DispatchStats>,
    worker: JoinHandle<()>,
}

impl ReportDispatcher {
    /// Spawn the delivery task. Must be called inside a Tokio runtime.
    pub fn spawn(sink: Arc<dyn FraudSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<FraudReport>(capacity.max(1));
        let stats = Arc::new(DispatchStats::default());
        let worker_stats = stats.clone();

        let worker = tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                match sink.submit(&report).await {
                    Ok(_) => {
                        worker_stats.delivered.fetch_add(1, Ordering::Relaxed);
                        debug!("Fraud report {} delivered", report.id);
                    }
                    Err(e) => {
                        worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!("proctor_reports_failed_total").increment(1);
                        warn!("Fraud report {} not delivered: {}", report.id, e);
                    }
                }
            }
            debug!("Report queue closed");
        });

        Self { tx, stats, worker }
    }

    /// Queue a report; a full queue drops it
    pub fn enqueue(&self, report: FraudReport) -> Result<(), SyncError> {
        match self.tx.try_send(report) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(report)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("proctor_reports_failed_total").increment(1);
                warn!("Report queue full, dropping report {}", report.id);
                Err(SyncError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SyncError::Closed),
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Stop accepting reports and wait for queued ones to be attempted
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!("Report worker ended abnormally: {}", e);
        }
        info!(
            "Report dispatcher closed: delivered={} failed={} dropped={}",
            self.stats.delivered(),
            self.stats.failed(),
            self.stats.dropped()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportAck, SubmitFuture};
    use alerting::ReportCounts;
    use escalation::{SessionMode, Violation, ViolationKind};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn report(kind: ViolationKind) -> FraudReport {
        FraudReport::from_violation(
            "stu-1",
            SessionMode::Exam,
            &Violation::new(kind, 1),
            1,
            ReportCounts::default(),
        )
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<FraudReport>>,
    }

    impl FraudSink for RecordingSink {
        fn submit<'a>(&'a self, report: &'a FraudReport) -> SubmitFuture<'a> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(report.clone());
                Ok(ReportAck {
                    success: true,
                    message: None,
                    data: None,
                })
            })
        }
    }

    struct FailingSink;

    impl FraudSink for FailingSink {
        fn submit<'a>(&'a self, _report: &'a FraudReport) -> SubmitFuture<'a> {
            Box::pin(async { Err(SyncError::Server(503)) })
        }
    }

    struct GatedSink {
        gate: Notify,
    }

    impl FraudSink for GatedSink {
        fn submit<'a>(&'a self, _report: &'a FraudReport) -> SubmitFuture<'a> {
            Box::pin(async move {
                self.gate.notified().await;
                Ok(ReportAck {
                    success: true,
                    message: None,
                    data: None,
                })
            })
        }
    }

    #[tokio::test]
    async fn test_reports_delivered_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = ReportDispatcher::spawn(sink.clone(), 16);
        let stats = dispatcher.stats();

        dispatcher.enqueue(report(ViolationKind::Absence)).unwrap();
        dispatcher.enqueue(report(ViolationKind::Speech)).unwrap();
        dispatcher.close().await;

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].type_fraude, ViolationKind::Absence);
        assert_eq!(seen[1].type_fraude, ViolationKind::Speech);
        assert_eq!(stats.delivered(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let dispatcher = ReportDispatcher::spawn(Arc::new(FailingSink), 4);
        let stats = dispatcher.stats();

        dispatcher.enqueue(report(ViolationKind::Speech)).unwrap();
        dispatcher.close().await;

        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let sink = Arc::new(GatedSink {
            gate: Notify::new(),
        });
        let dispatcher = ReportDispatcher::spawn(sink.clone(), 1);
        let stats = dispatcher.stats();

        dispatcher.enqueue(report(ViolationKind::Speech)).unwrap();
        // Let the worker pick up the first report and park on the gate
        tokio::task::yield_now().await;

        dispatcher.enqueue(report(ViolationKind::Speech)).unwrap();
        assert!(matches!(
            dispatcher.enqueue(report(ViolationKind::Speech)),
            Err(SyncError::QueueFull)
        ));
        assert_eq!(stats.dropped(), 1);

        sink.gate.notify_one();
        tokio::task::yield_now().await;
        sink.gate.notify_one();
        dispatcher.close().await;
        assert_eq!(stats.delivered(), 2);
    }
}
