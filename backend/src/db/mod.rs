//! Persistence for the product resource and the factory that builds it.

mod memory;
mod postgres;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, DatabaseConfig, StorageKind};
use crate::error::{AppError, AppResult, Message};
use crate::models::*;

pub use memory::MemoryProductRepository;
pub use postgres::PgProductRepository;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self, filters: &ProductFilters) -> AppResult<ProductPage>;

    async fn get(&self, id: Uuid) -> AppResult<Product>;

    /// Fails with `Conflict` when the code is already registered.
    async fn insert(&self, payload: &CreateProduct) -> AppResult<Product>;

    /// Bulk insert; payloads whose code already exists are skipped.
    async fn insert_many(&self, payloads: &[CreateProduct]) -> AppResult<Vec<Product>>;

    async fn update(&self, id: Uuid, payload: &UpdateProduct) -> AppResult<Product>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn count(&self) -> AppResult<i64>;

    /// Cheap round-trip used by the readiness probe.
    async fn ping(&self) -> AppResult<()>;
}

pub(crate) fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(Message::new("product.not_found").with("id", id))
}

pub(crate) fn code_taken(code: &str) -> AppError {
    AppError::Conflict(Message::new("product.code_taken").with("code", code))
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at 30 s.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.checked_mul(factor)
        .unwrap_or(MAX_RETRY_DELAY)
        .min(MAX_RETRY_DELAY)
}

/// Opens the pool, retrying with exponential backoff.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let mut attempt = 1;
    loop {
        info!(attempt, max_attempts = config.connect_retries, "Connecting to PostgreSQL...");
        let result = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await;

        match result {
            Ok(pool) => {
                info!("Database connection pool established.");
                return Ok(pool);
            }
            Err(e) if attempt < config.connect_retries => {
                let delay = backoff_delay(config.retry_delay, attempt);
                warn!(
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Database connection failed"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("could not connect to PostgreSQL after {attempt} attempt(s)")
                });
            }
        }
    }
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run migrations")?;
    info!("Migrations complete.");
    Ok(())
}

/// Builds the repository selected by `STORAGE`.
pub async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn ProductRepository>> {
    match config.storage {
        StorageKind::Memory => {
            info!("Using in-memory product repository");
            Ok(Arc::new(MemoryProductRepository::new()))
        }
        StorageKind::Postgres => {
            let db = config
                .database
                .as_ref()
                .context("STORAGE=postgres requires database settings")?;
            let pool = connect(db).await?;
            migrate(&pool).await?;
            Ok(Arc::new(PgProductRepository::new(pool)))
        }
    }
}
