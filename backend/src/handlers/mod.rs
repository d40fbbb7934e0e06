pub mod messages;
pub mod products;
pub mod seed;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::{
    error::{AppError, Message},
    messages::AcceptLanguage,
    AppState,
};

pub const SERVICE_NAME: &str = "registration-service";

/// Liveness: the process is up and serving.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Readiness: the storage backend answers a ping.
pub async fn ready(State(state): State<AppState>, lang: AcceptLanguage) -> impl IntoResponse {
    match state.products.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response(),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            AppError::Unavailable(Message::new("health.unavailable"))
                .localize(&state.messages, &lang)
                .into_response()
        }
    }
}
