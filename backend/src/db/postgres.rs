use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{code_taken, not_found, ProductRepository};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::*;

const COLUMNS: &str =
    "id, code, name, description, price_cents, quantity, category, created_at, updated_at";

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR category = $1)
      AND ($2::bigint IS NULL OR price_cents >= $2)
      AND ($3::bigint IS NULL OR price_cents <= $3)
      AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%' OR code ILIKE '%' || $4 || '%')
"#;

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE wildcards so `search` matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_write_error(err: sqlx::Error, code: &str) -> AppError {
    if is_unique_violation(&err) {
        code_taken(code)
    } else {
        AppError::Database(err)
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(&self, filters: &ProductFilters) -> AppResult<ProductPage> {
        let limit = filters.effective_limit();
        let offset = filters.effective_offset();
        let search = filters.search.as_deref().map(escape_like);

        let data = sqlx::query_as::<_, Product>(&format!(
            "SELECT {COLUMNS} FROM products {FILTER_CLAUSE}
             ORDER BY created_at DESC, id
             LIMIT $5 OFFSET $6"
        ))
        .bind(filters.category.as_deref())
        .bind(filters.min_price_cents)
        .bind(filters.max_price_cents)
        .bind(search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM products {FILTER_CLAUSE}"))
                .bind(filters.category.as_deref())
                .bind(filters.min_price_cents)
                .bind(filters.max_price_cents)
                .bind(search.as_deref())
                .fetch_one(&self.pool)
                .await?;

        Ok(ProductPage {
            data,
            total: total.0,
            limit,
            offset,
        })
    }

    async fn get(&self, id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn insert(&self, payload: &CreateProduct) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (code, name, description, price_cents, quantity, category)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(&payload.code)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.price_cents)
        .bind(payload.quantity)
        .bind(&payload.category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &payload.code))
    }

    async fn insert_many(&self, payloads: &[CreateProduct]) -> AppResult<Vec<Product>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let codes: Vec<String> = payloads.iter().map(|p| p.code.clone()).collect();
        let names: Vec<String> = payloads.iter().map(|p| p.name.clone()).collect();
        let descriptions: Vec<Option<String>> =
            payloads.iter().map(|p| p.description.clone()).collect();
        let prices: Vec<i64> = payloads.iter().map(|p| p.price_cents).collect();
        let quantities: Vec<i32> = payloads.iter().map(|p| p.quantity).collect();
        let categories: Vec<String> = payloads.iter().map(|p| p.category.clone()).collect();

        // UNNEST keeps this a single round-trip per batch
        let products = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (code, name, description, price_cents, quantity, category)
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::bigint[], $5::int[], $6::text[])
             ON CONFLICT (code) DO NOTHING
             RETURNING {COLUMNS}"
        ))
        .bind(&codes)
        .bind(&names)
        .bind(&descriptions)
        .bind(&prices)
        .bind(&quantities)
        .bind(&categories)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn update(&self, id: Uuid, payload: &UpdateProduct) -> AppResult<Product> {
        // Fetch existing to merge optional fields
        let mut product = self.get(id).await?;
        payload.apply_to(&mut product);

        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products
             SET code        = $1,
                 name        = $2,
                 description = $3,
                 price_cents = $4,
                 quantity    = $5,
                 category    = $6,
                 updated_at  = $7
             WHERE id = $8
             RETURNING {COLUMNS}"
        ))
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.quantity)
        .bind(&product.category)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &product.code))?
        .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
