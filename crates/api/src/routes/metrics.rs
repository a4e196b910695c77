//! Prometheus exposition

use axum::{extract::State, http::header, response::IntoResponse};

use crate::SharedState;

pub async fn render(State(state): State<SharedState>) -> impl IntoResponse {
    let body = state.read().await.metrics.render();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
