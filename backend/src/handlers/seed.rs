use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{ApiResult, AppError, Localize, Message},
    messages::AcceptLanguage,
    seed,
    AppState,
};

pub const DEFAULT_SEED_COUNT: usize = 100;
pub const MAX_SEED_COUNT: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct SeedParams {
    pub count: Option<usize>,
}

// ── POST /api/seed?count=N ───────────────────────────────────────────────────

pub async fn seed_data(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Query(params): Query<SeedParams>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let count = params.count.unwrap_or(DEFAULT_SEED_COUNT);
    if count == 0 || count > MAX_SEED_COUNT {
        return Err(AppError::BadRequest(
            Message::new("seed.count_invalid").with("max", MAX_SEED_COUNT),
        )
        .localize(&state.messages, &lang));
    }

    let repo = state.products.repository();
    let inserted = seed::seed_products(repo.as_ref(), count)
        .await
        .localize(&state.messages, &lang)?;
    let total = state
        .products
        .count()
        .await
        .localize(&state.messages, &lang)?;

    info!(inserted = inserted.len(), total, "Seed request complete");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "inserted": inserted.len(),
            "total": total,
        })),
    ))
}
