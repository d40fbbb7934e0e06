use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered product. `code` is the unique registration code (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Price stored as integer cents (e.g. 999 = $9.99)
    pub price_cents: i64,
    pub quantity: i32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price as a floating-point dollar amount for display purposes.
    pub fn price_dollars(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }

    /// True when the product passes every filter except limit/offset.
    pub fn matches(&self, filters: &ProductFilters) -> bool {
        if let Some(category) = filters.category.as_deref() {
            if self.category != category {
                return false;
            }
        }
        if filters.min_price_cents.is_some_and(|min| self.price_cents < min) {
            return false;
        }
        if filters.max_price_cents.is_some_and(|max| self.price_cents > max) {
            return false;
        }
        if let Some(search) = filters.search.as_deref() {
            let needle = search.to_lowercase();
            if !self.name.to_lowercase().contains(&needle)
                && !self.code.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Renders products as CSV with a header row.
pub fn products_to_csv(products: &[Product]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "code",
        "name",
        "description",
        "price_cents",
        "price",
        "quantity",
        "category",
        "created_at",
        "updated_at",
    ])?;

    for p in products {
        wtr.write_record([
            p.id.to_string(),
            p.code.clone(),
            p.name.clone(),
            p.description.clone().unwrap_or_default(),
            p.price_cents.to_string(),
            format!("{:.2}", p.price_dollars()),
            p.quantity.to_string(),
            p.category.clone(),
            p.created_at.to_rfc3339(),
            p.updated_at.to_rfc3339(),
        ])?;
    }

    let data = wtr.into_inner()?;
    Ok(String::from_utf8(data)?)
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Price in cents
    pub price_cents: i64,
    pub quantity: i32,
    pub category: String,
}

/// Absent fields keep their stored value. An empty `description` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProduct {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i32>,
    pub category: Option<String>,
}

impl UpdateProduct {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price_cents.is_none()
            && self.quantity.is_none()
            && self.category.is_none()
    }

    /// Applies present fields over `existing`; does not touch timestamps.
    pub fn apply_to(&self, existing: &mut Product) {
        if let Some(code) = &self.code {
            existing.code = code.clone();
        }
        if let Some(name) = &self.name {
            existing.name = name.clone();
        }
        if let Some(description) = &self.description {
            existing.description = if description.is_empty() {
                None
            } else {
                Some(description.clone())
            };
        }
        if let Some(price_cents) = self.price_cents {
            existing.price_cents = price_cents;
        }
        if let Some(quantity) = self.quantity {
            existing.quantity = quantity;
        }
        if let Some(category) = &self.category {
            existing.category = category.clone();
        }
    }
}

// ── Query parameters ──────────────────────────────────────────────────────────

pub const DEFAULT_LIMIT: i64 = 1000;
pub const MAX_LIMIT: i64 = 10_000;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    /// Case-insensitive substring of name or code.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProductFilters {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of a filtered listing. `total` ignores limit/offset.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub data: Vec<Product>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
