use std::sync::Arc;

use tokio::signal;
use tracing::info;

mod config;
mod db;
mod error;
mod handlers;
mod logger;
mod messages;
mod models;
mod routes;
mod seed;
mod services;

use crate::config::Config;
use crate::db::ProductRepository;
use crate::messages::MessageCatalog;
use crate::services::ProductService;

/// Shared application state — cheap to clone (all heap behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub products: ProductService,
    pub messages: Arc<MessageCatalog>,
}

impl AppState {
    pub fn new(repo: Arc<dyn ProductRepository>, messages: MessageCatalog) -> Self {
        Self {
            products: ProductService::new(repo),
            messages: Arc::new(messages),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    logger::init(&config.log);

    info!("╔══════════════════════════════════════╗");
    info!("║  Registration Service — Rust + Axum  ║");
    info!("╚══════════════════════════════════════╝");
    info!(storage = ?config.storage, "Starting");

    let repo = db::build_repository(&config).await?;

    let catalog = MessageCatalog::new(
        &config.messages.dir,
        &config.messages.default_language,
        config.messages.reload_after,
    );
    let languages = catalog.languages();
    info!(
        dir = %config.messages.dir.display(),
        default = %config.messages.default_language,
        languages = ?languages,
        "Message catalogs available"
    );

    let state = AppState::new(repo, catalog);
    let app = routes::build_router(state);

    let addr = config.bind_addr();
    info!("Listening on http://{}", addr);
    info!("Quick-start: POST http://{}/api/seed?count=100  →  then GET http://{}/api/products", addr, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
