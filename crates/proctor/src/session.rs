//! Session lifecycle: timer, tick queue and the single worker

use alerting::{AlertEvent, AlertManager, FraudReport};
use escalation::{EscalationEngine, EscalationState, SessionMode, Transition};
use fraud_sync::{FraudSink, ReportDispatcher};
use media_capture::{MediaGuard, MediaSource};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use vision::{load_presence_detector, PresenceStrategy};

use crate::config::ProctorConfig;
use crate::orchestrator::TickOrchestrator;
use crate::status::{Metrics, SessionSummary, SurveillanceStatus};
use crate::ProctorError;

const EVENT_CAPACITY: usize = 64;

/// Start request from the UI shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub mode: SessionMode,
    #[serde(alias = "studentId")]
    pub student_id: String,
}

/// Passed to the stop callback on a terminal transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnd {
    pub final_state: EscalationState,
    pub attempts: u32,
}

/// Invoked at most once, on `Terminated` or `ExamEnded`
pub type StopCallback = Box<dyn FnOnce(SessionEnd) + Send + 'static>;

/// Pushed to subscribers as they happen
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Alert(AlertEvent),
    Escalated { transition: Transition, attempts: u32 },
    Ended(SessionEnd),
}

/// Display state after the latest tick
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub student_id: String,
    pub mode: SessionMode,
    /// Ticking; false from `Sensitizing` on
    pub active: bool,
    /// Worker done: devices released, callback (if any) invoked
    pub finished: bool,
    pub strategy: PresenceStrategy,
    pub status: SurveillanceStatus,
    pub metrics: Metrics,
    pub state: EscalationState,
    pub attempts: u32,
    pub ticks_dropped: u64,
    pub alerts_history: Vec<AlertEvent>,
}

impl SessionSnapshot {
    /// Snapshot for a session whose camera or microphone could not be opened
    pub fn unavailable(request: &SessionRequest) -> Self {
        Self {
            student_id: request.student_id.clone(),
            mode: request.mode,
            active: false,
            finished: true,
            strategy: PresenceStrategy::Heuristic,
            status: SurveillanceStatus::unavailable(),
            metrics: Metrics::default(),
            state: EscalationState::Monitoring,
            attempts: 0,
            ticks_dropped: 0,
            alerts_history: Vec::new(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::new(
            self.student_id.clone(),
            self.mode,
            self.metrics,
            self.attempts,
            self.state,
            self.alerts_history.clone(),
        )
    }
}

/// A running monitoring session.
///
/// Dropping the session stops it the same way `stop` does, without waiting.
pub struct ProctorSession {
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    shutdown_tx: watch::Sender<bool>,
    timer: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl ProctorSession {
    /// Acquire the devices, pick the presence strategy and start ticking.
    ///
    /// Fails only when the camera or microphone cannot be opened.
    pub async fn start(
        config: ProctorConfig,
        source: &mut dyn MediaSource,
        request: SessionRequest,
        on_stop: Option<StopCallback>,
        sink: Option<Arc<dyn FraudSink>>,
    ) -> Result<Self, ProctorError> {
        let guard = MediaGuard::acquire(source).map_err(|e| {
            error!("Cannot start monitoring for {}: {}", request.student_id, e);
            ProctorError::SensorUnavailable(e)
        })?;

        let presence = load_presence_detector(&config.vision).await;
        let orchestrator = TickOrchestrator::new(presence, &config);
        let engine = EscalationEngine::new(request.mode, &config.escalation);
        let dispatcher = sink.map(|sink| ReportDispatcher::spawn(sink, config.backend.queue_capacity));

        let ticks_dropped = Arc::new(AtomicU64::new(0));
        let (tick_tx, tick_rx) = mpsc::channel(config.tick_queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let worker = SessionWorker {
            student_id: request.student_id.clone(),
            mode: request.mode,
            orchestrator,
            engine,
            alerts: AlertManager::new(config.alerts.clone()),
            alerts_history: Vec::new(),
            guard,
            dispatcher,
            events_tx: events_tx.clone(),
            on_stop,
            ticks_dropped: ticks_dropped.clone(),
            active: true,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(worker.snapshot());

        info!(
            "Monitoring started for {} in {} mode ({:?} presence)",
            request.student_id,
            request.mode,
            worker.orchestrator.strategy()
        );

        let timer = tokio::spawn(run_timer(
            config.tick_interval(),
            tick_tx,
            shutdown_rx.clone(),
            ticks_dropped,
        ));
        let worker = tokio::spawn(worker.run(tick_rx, shutdown_rx, snapshot_tx));

        Ok(Self {
            snapshot_rx,
            events_tx,
            shutdown_tx,
            timer,
            worker,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn summary(&self) -> SessionSummary {
        self.snapshot_rx.borrow().summary()
    }

    /// Receiver updated after every tick
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.snapshot_rx.borrow().active
    }

    /// True once the worker has exited; a quiz in its sensitization
    /// interstitial is inactive but not finished.
    pub fn is_finished(&self) -> bool {
        self.snapshot_rx.borrow().finished
    }

    /// Halt ticking and release the devices. The stop callback is not
    /// invoked for a manual stop.
    pub async fn stop(self) -> SessionSummary {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.worker.await {
            error!("Session worker ended abnormally: {}", e);
        }
        if let Err(e) = self.timer.await {
            error!("Session timer ended abnormally: {}", e);
        }

        let summary = self.snapshot_rx.borrow().summary();
        info!(
            "Monitoring stopped for {}: {} checks, integrity {:.2}%",
            summary.student_id, summary.metrics.total_checks, summary.integrity_score
        );
        summary
    }
}

/// Feeds tick numbers into the bounded queue; a full queue drops the tick.
async fn run_timer(
    period: Duration,
    ticks: mpsc::Sender<u64>,
    mut shutdown: watch::Receiver<bool>,
    dropped: Arc<AtomicU64>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                sequence += 1;
                match ticks.try_send(sequence) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!("proctor_ticks_dropped_total").increment(1);
                        warn!("Tick {} dropped, previous ticks still pending", sequence);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }
    }
    debug!("Tick timer stopped");
}

/// Owns every piece of mutable session state; ticks run strictly in order.
struct SessionWorker {
    student_id: String,
    mode: SessionMode,
    orchestrator: TickOrchestrator,
    engine: EscalationEngine,
    alerts: AlertManager,
    alerts_history: Vec<AlertEvent>,
    guard: MediaGuard,
    dispatcher: Option<ReportDispatcher>,
    events_tx: broadcast::Sender<SessionEvent>,
    on_stop: Option<StopCallback>,
    ticks_dropped: Arc<AtomicU64>,
    active: bool,
}

impl SessionWorker {
    async fn run(
        mut self,
        mut ticks: mpsc::Receiver<u64>,
        mut shutdown: watch::Receiver<bool>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) {
        let terminal = loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break None,
                tick = ticks.recv() => match tick {
                    Some(_) => {
                        let terminal = self.tick();
                        snapshots.send_replace(self.snapshot());
                        if terminal.is_some() {
                            break terminal;
                        }
                    }
                    None => break None,
                },
            }
        };
        ticks.close();

        if let Some(transition) = terminal {
            self.finish(transition, &mut shutdown, &snapshots).await;
        }

        self.guard.release();
        self.active = false;
        snapshots.send_replace(self.snapshot());

        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.close().await;
        }
    }

    /// Run one tick; returns the terminal transition if one was reached
    fn tick(&mut self) -> Option<Transition> {
        let device = match self.guard.device() {
            Ok(device) => device,
            Err(e) => {
                warn!("Tick skipped: {}", e);
                return None;
            }
        };
        let outcome = self.orchestrator.run_tick(device);

        let mut terminal = None;
        for violation in &outcome.violations {
            let transition = self.engine.apply(violation);

            match self.alerts.raise(&violation.message, violation.kind) {
                Some(alert) => {
                    self.alerts_history.push(alert.clone());
                    let _ = self.events_tx.send(SessionEvent::Alert(alert));

                    if let Some(dispatcher) = &self.dispatcher {
                        let report = FraudReport::from_violation(
                            &self.student_id,
                            self.mode,
                            violation,
                            self.engine.attempts(),
                            self.orchestrator.metrics().report_counts(),
                        );
                        // Failures are logged by the dispatcher
                        let _ = dispatcher.enqueue(report);
                    }
                }
                None => {
                    metrics::counter!("proctor_alerts_suppressed_total").increment(1);
                }
            }

            match transition {
                Transition::Continue => {}
                Transition::Warn { .. } | Transition::Terminate => self.emit(transition),
                Transition::Sensitize { .. } | Transition::EndExam { .. } => {
                    self.emit(transition);
                    terminal = Some(transition);
                    // No alerts or reports against a terminal session
                    break;
                }
            }
        }
        terminal
    }

    async fn finish(
        &mut self,
        transition: Transition,
        shutdown: &mut watch::Receiver<bool>,
        snapshots: &watch::Sender<SessionSnapshot>,
    ) {
        match transition {
            Transition::Sensitize { duration } => {
                info!("Sensitization for {:?} before terminating", duration);
                if !wait_unless_stopped(duration, shutdown).await {
                    info!("Session stopped during sensitization");
                    return;
                }
                match self.engine.finish_sensitization() {
                    Ok(transition) => self.emit(transition),
                    Err(e) => {
                        error!("{}", e);
                        return;
                    }
                }
                self.guard.release();
                snapshots.send_replace(self.snapshot());
                self.invoke_stop();
            }
            Transition::EndExam { stop_delay } => {
                self.guard.release();
                snapshots.send_replace(self.snapshot());
                // Already terminal: a manual stop only shortens the delay
                wait_unless_stopped(stop_delay, shutdown).await;
                self.invoke_stop();
            }
            _ => {}
        }
    }

    fn emit(&self, transition: Transition) {
        let _ = self.events_tx.send(SessionEvent::Escalated {
            transition,
            attempts: self.engine.attempts(),
        });
    }

    fn invoke_stop(&mut self) {
        let end = SessionEnd {
            final_state: self.engine.state(),
            attempts: self.engine.attempts(),
        };
        let _ = self.events_tx.send(SessionEvent::Ended(end.clone()));

        if let Some(callback) = self.on_stop.take() {
            info!("Invoking stop callback ({:?})", end.final_state);
            callback(end);
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            student_id: self.student_id.clone(),
            mode: self.mode,
            active: self.active && !self.engine.state().halts_detection(),
            finished: !self.active,
            strategy: self.orchestrator.strategy(),
            status: self.orchestrator.status().clone(),
            metrics: self.orchestrator.metrics(),
            state: self.engine.state(),
            attempts: self.engine.attempts(),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            alerts_history: self.alerts_history.clone(),
        }
    }
}

/// Sleep for `duration`; false if the session was stopped first
async fn wait_unless_stopped(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusLevel;
    use crate::testing::{lit_square_frame, silent_audio, speech_audio, ScriptedSource};
    use escalation::ViolationKind;
    use fraud_sync::{ReportAck, SubmitFuture};
    use media_capture::VideoFrame;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn request(mode: SessionMode) -> SessionRequest {
        SessionRequest {
            mode,
            student_id: "stu-7".to_string(),
        }
    }

    /// Callback that counts invocations and reports the first one
    fn counting_callback() -> (StopCallback, Arc<AtomicUsize>, oneshot::Receiver<(SessionEnd, Instant)>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let counter = calls.clone();
        let callback: StopCallback = Box::new(move |end| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send((end, Instant::now()));
        });
        (callback, calls, rx)
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<FraudReport>>,
    }

    impl FraudSink for RecordingSink {
        fn submit<'a>(&'a self, report: &'a FraudReport) -> SubmitFuture<'a> {
            Box::pin(async move {
                self.reports.lock().unwrap().push(report.clone());
                Ok(ReportAck {
                    success: true,
                    message: None,
                    data: None,
                })
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exam_absence_ends_exam() {
        let mut source = ScriptedSource::new(VideoFrame::filled(640, 480, [0, 0, 0]), silent_audio());
        let (callback, calls, ended) = counting_callback();
        let started = Instant::now();

        let session = ProctorSession::start(
            ProctorConfig::default(),
            &mut source,
            request(SessionMode::Exam),
            Some(callback),
            None,
        )
        .await
        .unwrap();

        let (end, at) = ended.await.unwrap();
        assert_eq!(end.final_state, EscalationState::ExamEnded);
        assert_eq!(end.attempts, 3);
        // Three ticks at 2s, then the 2s stop delay
        assert_eq!(at - started, Duration::from_secs(8));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.metrics.position_violations, 3);
        assert_eq!(snapshot.metrics.total_checks, 3);
        assert_eq!(snapshot.state, EscalationState::ExamEnded);
        assert!(!snapshot.active);

        let summary = session.stop().await;
        assert_eq!(summary.final_state, EscalationState::ExamEnded);
        assert_eq!(summary.integrity_score, 70.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiz_speech_sensitizes_then_terminates() {
        let mut source = ScriptedSource::new(lit_square_frame(), speech_audio());
        let (callback, calls, ended) = counting_callback();
        let started = Instant::now();

        let session = ProctorSession::start(
            ProctorConfig::default(),
            &mut source,
            request(SessionMode::Quiz),
            Some(callback),
            None,
        )
        .await
        .unwrap();

        let mut updates = session.watch();
        updates
            .wait_for(|s| s.state == EscalationState::Sensitizing)
            .await
            .unwrap();
        let sensitizing_at = Instant::now();
        assert_eq!(sensitizing_at - started, Duration::from_secs(6));
        assert!(!session.is_active());
        assert!(!session.is_finished());

        let (end, at) = ended.await.unwrap();
        assert_eq!(end.final_state, EscalationState::Terminated);
        assert_eq!(at - sensitizing_at, Duration::from_secs(20));
        updates.wait_for(|s| s.finished).await.unwrap();
        assert_eq!(session.snapshot().state, EscalationState::Terminated);

        let summary = session.stop().await;
        assert_eq!(summary.metrics.speech_detections, 3);
        assert_eq!(summary.metrics.total_checks, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_speech_tick() {
        let mut source = ScriptedSource::new(lit_square_frame(), speech_audio());
        let session = ProctorSession::start(
            ProctorConfig::default(),
            &mut source,
            request(SessionMode::Quiz),
            None,
            None,
        )
        .await
        .unwrap();
        let mut events = session.subscribe();

        match events.recv().await.unwrap() {
            SessionEvent::Alert(alert) => assert_eq!(alert.kind, ViolationKind::Speech),
            other => panic!("expected an alert, got {:?}", other),
        }

        let mut updates = session.watch();
        let snapshot = updates
            .wait_for(|s| s.metrics.total_checks == 1)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.status.speech.level, StatusLevel::Danger);
        assert_eq!(snapshot.metrics.speech_detections, 1);
        assert_eq!(snapshot.alerts_history.len(), 1);
        assert_eq!(snapshot.attempts, 1);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_alerts_reported_once() {
        let mut source = ScriptedSource::new(lit_square_frame(), speech_audio());
        let sink = Arc::new(RecordingSink::default());

        let session = ProctorSession::start(
            ProctorConfig::default(),
            &mut source,
            request(SessionMode::Quiz),
            None,
            Some(sink.clone()),
        )
        .await
        .unwrap();

        let mut updates = session.watch();
        updates
            .wait_for(|s| s.metrics.total_checks == 2)
            .await
            .unwrap();
        let summary = session.stop().await;

        assert_eq!(summary.metrics.speech_detections, 2);
        assert_eq!(summary.alerts_history.len(), 1);

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].type_fraude, ViolationKind::Speech);
        assert_eq!(reports[0].id_ref, "stu-7");
        assert_eq!(reports[0].nombre_fraude, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_tick_stops_reporting() {
        let mut source = ScriptedSource::new(VideoFrame::filled(640, 480, [0, 0, 0]), speech_audio());
        let sink = Arc::new(RecordingSink::default());
        let mut config = ProctorConfig::default();
        config.alerts.dedup_window_ms = 1_000;

        let session = ProctorSession::start(
            config,
            &mut source,
            request(SessionMode::Quiz),
            None,
            Some(sink.clone()),
        )
        .await
        .unwrap();

        let mut updates = session.watch();
        updates
            .wait_for(|s| s.state == EscalationState::Sensitizing)
            .await
            .unwrap();
        let summary = session.stop().await;

        // Absence and speech on the first two ticks; the third stops at absence
        assert_eq!(summary.alerts_history.len(), 5);
        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 5);
        let last = &reports[4];
        assert_eq!(last.type_fraude, ViolationKind::Absence);
        assert_eq!(last.nombre_fraude, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stop_skips_callback() {
        let mut source = ScriptedSource::new(lit_square_frame(), silent_audio());
        let (callback, calls, _ended) = counting_callback();

        let session = ProctorSession::start(
            ProctorConfig::default(),
            &mut source,
            request(SessionMode::Exam),
            Some(callback),
            None,
        )
        .await
        .unwrap();

        let mut updates = session.watch();
        updates
            .wait_for(|s| s.metrics.total_checks == 1)
            .await
            .unwrap();
        let summary = session.stop().await;

        assert_eq!(summary.final_state, EscalationState::Monitoring);
        assert_eq!(summary.integrity_score, 100.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denied_devices_never_start() {
        let mut source = ScriptedSource::denied();
        let result = ProctorSession::start(
            ProctorConfig::default(),
            &mut source,
            request(SessionMode::Exam),
            None,
            None,
        )
        .await;
        assert!(matches!(result, Err(ProctorError::SensorUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drops_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dropped = Arc::new(AtomicU64::new(0));

        let timer = tokio::spawn(run_timer(
            Duration::from_secs(2),
            tx,
            shutdown_rx,
            dropped.clone(),
        ));

        // Ticks at 2s, 4s and 6s; nobody drains the queue
        tokio::time::sleep(Duration::from_millis(7_000)).await;
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
        assert_eq!(rx.recv().await, Some(1));

        shutdown_tx.send(true).unwrap();
        timer.await.unwrap();
    }
}
