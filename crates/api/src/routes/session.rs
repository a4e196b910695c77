//! Session Routes
//!
//! Start and stop run under the control mutex; the state lock is only taken
//! for short reads and writes so status and health stay responsive.

use axum::{extract::State, http::StatusCode, Json};
use proctor::{
    ProctorError, ProctorSession, SessionRequest, SessionSnapshot, SessionSummary, StopCallback,
};
use tracing::info;

use crate::{ApiError, SharedState};

/// Start monitoring. Refused until the previous session's worker has
/// finished, including a quiz still in its sensitization interstitial.
pub async fn start(
    State(state): State<SharedState>,
    Json(request): Json<SessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let (control, source, config, sink) = {
        let state = state.read().await;
        (
            state.control.clone(),
            state.source.clone(),
            state.config.clone(),
            state.sink.clone(),
        )
    };
    let _control = control.lock().await;

    let previous = {
        let mut state = state.write().await;
        if state.session.as_ref().is_some_and(|s| !s.is_finished()) {
            return Err(ApiError::SessionActive);
        }
        state.session.take()
    };
    if let Some(previous) = previous {
        let summary = previous.stop().await;
        state.write().await.last_summary = Some(summary);
    }

    let student_id = request.student_id.clone();
    let on_stop: StopCallback = Box::new(move |end| {
        info!(
            "Session for {} ended: {:?} after {} attempts",
            student_id, end.final_state, end.attempts
        );
    });

    let result = {
        let mut source = source.lock().await;
        ProctorSession::start(config, source.as_mut(), request.clone(), Some(on_stop), sink).await
    };

    let mut state = state.write().await;
    match result {
        Ok(session) => {
            let snapshot = session.snapshot();
            state.unavailable = None;
            state.session = Some(session);
            Ok((StatusCode::CREATED, Json(snapshot)))
        }
        Err(e) => {
            if matches!(e, ProctorError::SensorUnavailable(_)) {
                state.unavailable = Some(SessionSnapshot::unavailable(&request));
            }
            Err(e.into())
        }
    }
}

/// Stop monitoring and return the summary
pub async fn stop(State(state): State<SharedState>) -> Result<Json<SessionSummary>, ApiError> {
    let control = state.read().await.control.clone();
    let _control = control.lock().await;

    let session = state
        .write()
        .await
        .session
        .take()
        .ok_or(ApiError::NoSession)?;

    let summary = session.stop().await;
    state.write().await.last_summary = Some(summary.clone());
    Ok(Json(summary))
}

/// Live status of the current session, or the camera/microphone failure
/// left by the last start attempt
pub async fn status(State(state): State<SharedState>) -> Result<Json<SessionSnapshot>, ApiError> {
    let state = state.read().await;
    state
        .session
        .as_ref()
        .map(|s| s.snapshot())
        .or_else(|| state.unavailable.clone())
        .map(Json)
        .ok_or(ApiError::NoSession)
}

/// Summary of the current session, or of the last one stopped
pub async fn summary(State(state): State<SharedState>) -> Result<Json<SessionSummary>, ApiError> {
    let state = state.read().await;
    state
        .session
        .as_ref()
        .map(|s| s.summary())
        .or_else(|| state.last_summary.clone())
        .map(Json)
        .ok_or(ApiError::NoSession)
}
