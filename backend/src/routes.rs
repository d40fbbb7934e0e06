use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, AppState};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::ready))

        // ── Products CRUD ───────────────────────────────────────────────────
        .route(
            "/api/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/api/products/export/csv",
            get(handlers::products::export_csv),
        )
        .route(
            "/api/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )

        // ── Seed ────────────────────────────────────────────────────────────
        .route("/api/seed", post(handlers::seed::seed_data))

        // ── Message catalog ─────────────────────────────────────────────────
        .route("/api/messages", get(handlers::messages::list_languages))
        .route("/api/messages/reload", post(handlers::messages::reload))
        .route("/api/messages/:lang", get(handlers::messages::get_catalog))

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
