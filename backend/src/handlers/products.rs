use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiResult, Localize},
    messages::AcceptLanguage,
    models::{CreateProduct, ProductFilters, UpdateProduct},
    AppState,
};

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_products(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Query(filters): Query<ProductFilters>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let page = state
        .products
        .list(&filters)
        .await
        .localize(&state.messages, &lang)?;
    let elapsed = start.elapsed();

    info!(
        count = page.data.len(),
        total = page.total,
        elapsed_ms = elapsed.as_millis() as u64,
        "Listed products"
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "count": page.data.len(),
            "data": page.data,
            "total": page.total,
            "limit": page.limit,
            "offset": page.offset,
            "query_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_product(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Json(payload): Json<CreateProduct>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let product = state
        .products
        .create(&payload)
        .await
        .localize(&state.messages, &lang)?;
    let elapsed = start.elapsed();

    info!(id = %product.id, code = %product.code, name = %product.name, "Created product");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "data": product,
            "db_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_product(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let product = state
        .products
        .get(id)
        .await
        .localize(&state.messages, &lang)?;
    let elapsed = start.elapsed();

    info!(id = %id, "Fetched product");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": product,
            "query_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn update_product(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    let product = state
        .products
        .update(id, &payload)
        .await
        .localize(&state.messages, &lang)?;
    let elapsed = start.elapsed();

    info!(id = %id, "Updated product");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": product,
            "db_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_product(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let start = Instant::now();
    state
        .products
        .delete(id)
        .await
        .localize(&state.messages, &lang)?;
    let elapsed = start.elapsed();

    info!(id = %id, "Deleted product");

    let language = state.messages.resolve(lang.preferences());
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": state.messages.lookup(&language, "product.deleted", &[]),
            "id": id,
            "db_time_ms": elapsed.as_secs_f64() * 1000.0,
        })),
    ))
}

// ── GET /api/products/export/csv ─────────────────────────────────────────────

pub async fn export_csv(
    State(state): State<AppState>,
    lang: AcceptLanguage,
    Query(filters): Query<ProductFilters>,
) -> ApiResult<Response> {
    let csv = state
        .products
        .export_csv(&filters)
        .await
        .localize(&state.messages, &lang)?;

    info!(bytes = csv.len(), "Exported products as CSV");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"products.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
