use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::db::ProductRepository;
use crate::error::{AppError, AppResult, Message};
use crate::models::*;

pub const MAX_CODE_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 200;

fn bad_request(key: &'static str) -> AppError {
    AppError::BadRequest(Message::new(key))
}

fn validate_code(code: &str) -> AppResult<()> {
    let valid = !code.is_empty()
        && code.chars().count() <= MAX_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(bad_request("product.code_invalid"))
    }
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(bad_request("product.name_required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(
            Message::new("product.name_too_long").with("max", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

fn validate_category(category: &str) -> AppResult<()> {
    if category.is_empty() {
        return Err(bad_request("product.category_required"));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> AppResult<()> {
    if price_cents < 0 {
        return Err(bad_request("product.price_negative"));
    }
    Ok(())
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 0 {
        return Err(bad_request("product.quantity_negative"));
    }
    Ok(())
}

fn trimmed(s: &str) -> String {
    s.trim().to_string()
}

/// Trims text fields; a blank description becomes `None`.
fn normalize_create(payload: &CreateProduct) -> CreateProduct {
    CreateProduct {
        code: trimmed(&payload.code),
        name: trimmed(&payload.name),
        description: payload
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        price_cents: payload.price_cents,
        quantity: payload.quantity,
        category: trimmed(&payload.category),
    }
}

/// Trims present text fields. A blank description stays `Some("")`, which
/// the repository treats as "clear".
fn normalize_update(payload: &UpdateProduct) -> UpdateProduct {
    UpdateProduct {
        code: payload.code.as_deref().map(trimmed),
        name: payload.name.as_deref().map(trimmed),
        description: payload.description.as_deref().map(trimmed),
        price_cents: payload.price_cents,
        quantity: payload.quantity,
        category: payload.category.as_deref().map(trimmed),
    }
}

/// Validation and normalisation in front of a `ProductRepository`.
#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, filters: &ProductFilters) -> AppResult<ProductPage> {
        if let (Some(min), Some(max)) = (filters.min_price_cents, filters.max_price_cents) {
            if min > max {
                return Err(bad_request("product.price_range"));
            }
        }
        let mut filters = filters.clone();
        filters.search = filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self.repo.list(&filters).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Product> {
        self.repo.get(id).await
    }

    pub async fn create(&self, payload: &CreateProduct) -> AppResult<Product> {
        let payload = normalize_create(payload);
        validate_code(&payload.code)?;
        validate_name(&payload.name)?;
        validate_category(&payload.category)?;
        validate_price(payload.price_cents)?;
        validate_quantity(payload.quantity)?;

        let product = self.repo.insert(&payload).await?;
        debug!(id = %product.id, code = %product.code, "Registered product");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, payload: &UpdateProduct) -> AppResult<Product> {
        if payload.is_empty() {
            return Err(bad_request("product.update_empty"));
        }
        let payload = normalize_update(payload);
        if let Some(code) = payload.code.as_deref() {
            validate_code(code)?;
        }
        if let Some(name) = payload.name.as_deref() {
            validate_name(name)?;
        }
        if let Some(category) = payload.category.as_deref() {
            validate_category(category)?;
        }
        if let Some(price_cents) = payload.price_cents {
            validate_price(price_cents)?;
        }
        if let Some(quantity) = payload.quantity {
            validate_quantity(quantity)?;
        }

        self.repo.update(id, &payload).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.repo.count().await
    }

    /// Every product matching `filters`, up to `MAX_LIMIT`, as CSV.
    pub async fn export_csv(&self, filters: &ProductFilters) -> AppResult<String> {
        let filters = ProductFilters {
            limit: Some(MAX_LIMIT),
            offset: Some(0),
            ..filters.clone()
        };
        let page = self.list(&filters).await?;
        Ok(products_to_csv(&page.data)?)
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.repo.ping().await
    }

    pub fn repository(&self) -> &Arc<dyn ProductRepository> {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryProductRepository;

    fn service() -> ProductService {
        ProductService::new(Arc::new(MemoryProductRepository::new()))
    }

    fn payload() -> CreateProduct {
        CreateProduct {
            code: "  SKU-001 ".to_string(),
            name: " Desk Lamp ".to_string(),
            description: Some("   ".to_string()),
            price_cents: 1999,
            quantity: 5,
            category: "Home".to_string(),
        }
    }

    fn key(err: AppError) -> &'static str {
        err.message().key
    }

    #[tokio::test]
    async fn create_trims_fields() {
        let product = service().create(&payload()).await.unwrap();
        assert_eq!(product.code, "SKU-001");
        assert_eq!(product.name, "Desk Lamp");
        assert_eq!(product.description, None);
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let svc = service();
        let cases: Vec<(CreateProduct, &str)> = vec![
            (CreateProduct { code: "".into(), ..payload() }, "product.code_invalid"),
            (CreateProduct { code: "has space".into(), ..payload() }, "product.code_invalid"),
            (CreateProduct { code: "x".repeat(65), ..payload() }, "product.code_invalid"),
            (CreateProduct { name: "   ".into(), ..payload() }, "product.name_required"),
            (CreateProduct { name: "n".repeat(201), ..payload() }, "product.name_too_long"),
            (CreateProduct { category: "".into(), ..payload() }, "product.category_required"),
            (CreateProduct { price_cents: -1, ..payload() }, "product.price_negative"),
            (CreateProduct { quantity: -1, ..payload() }, "product.quantity_negative"),
        ];
        for (input, expected) in cases {
            let err = svc.create(&input).await.unwrap_err();
            assert_eq!(key(err), expected);
        }
        assert_eq!(svc.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_price_and_quantity_are_allowed() {
        let p = CreateProduct { price_cents: 0, quantity: 0, ..payload() };
        assert!(service().create(&p).await.is_ok());
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let svc = service();
        let created = svc.create(&payload()).await.unwrap();
        let err = svc.update(created.id, &UpdateProduct::default()).await.unwrap_err();
        assert_eq!(key(err), "product.update_empty");
    }

    #[tokio::test]
    async fn update_validates_present_fields_only() {
        let svc = service();
        let created = svc.create(&payload()).await.unwrap();

        let bad = UpdateProduct { price_cents: Some(-5), ..Default::default() };
        assert_eq!(key(svc.update(created.id, &bad).await.unwrap_err()), "product.price_negative");

        let good = UpdateProduct { name: Some("  Floor Lamp ".into()), ..Default::default() };
        let updated = svc.update(created.id, &good).await.unwrap();
        assert_eq!(updated.name, "Floor Lamp");
        assert_eq!(updated.price_cents, 1999);
    }

    #[tokio::test]
    async fn list_rejects_inverted_price_range() {
        let filters = ProductFilters {
            min_price_cents: Some(10),
            max_price_cents: Some(5),
            ..Default::default()
        };
        let err = service().list(&filters).await.unwrap_err();
        assert_eq!(key(err), "product.price_range");
    }

    #[tokio::test]
    async fn export_ignores_paging() {
        let svc = service();
        for i in 0..3 {
            svc.create(&CreateProduct { code: format!("E-{i}"), ..payload() }).await.unwrap();
        }
        let filters = ProductFilters { limit: Some(1), offset: Some(2), ..Default::default() };
        let csv = svc.export_csv(&filters).await.unwrap();
        assert_eq!(csv.lines().count(), 4);
    }
}
