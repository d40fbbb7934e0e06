use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    error::{ApiResult, AppError, Localize, Message},
    messages::{normalize, AcceptLanguage},
    AppState,
};

pub async fn list_languages(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "languages": state.messages.languages(),
            "default": state.messages.default_language(),
        })),
    )
}

pub async fn get_catalog(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Path(language): Path<String>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let catalog = state
        .messages
        .catalog(&language)
        .ok_or_else(|| {
            AppError::NotFound(Message::new("messages.unknown_language").with("lang", &language))
        })
        .localize(&state.messages, &lang)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "language": normalize(&language),
            "data": &*catalog,
        })),
    ))
}

pub async fn reload(
    State(state): State<AppState>,
    lang: AcceptLanguage,
) -> (StatusCode, Json<serde_json::Value>) {
    state.messages.reload();
    info!("Message catalogs reloaded on request");

    let language = state.messages.resolve(lang.preferences());
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": state.messages.lookup(&language, "messages.reloaded", &[]),
        })),
    )
}
