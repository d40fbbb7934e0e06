use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{code_taken, not_found, ProductRepository};
use crate::error::AppResult;
use crate::models::*;

/// Process-local repository. Used with `STORAGE=memory` and in tests.
/// Map order is insertion order.
#[derive(Default)]
pub struct MemoryProductRepository {
    products: RwLock<IndexMap<Uuid, Product>>,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn code_in_use(products: &IndexMap<Uuid, Product>, code: &str, except: Option<Uuid>) -> bool {
    products
        .values()
        .any(|p| p.code == code && Some(p.id) != except)
}

fn build(payload: &CreateProduct) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        code: payload.code.clone(),
        name: payload.name.clone(),
        description: payload.description.clone(),
        price_cents: payload.price_cents,
        quantity: payload.quantity,
        category: payload.category.clone(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn list(&self, filters: &ProductFilters) -> AppResult<ProductPage> {
        let limit = filters.effective_limit();
        let offset = filters.effective_offset();

        let products = self.products.read().await;
        let mut matching: Vec<&Product> =
            products.values().filter(|p| p.matches(filters)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(ProductPage {
            data,
            total,
            limit,
            offset,
        })
    }

    async fn get(&self, id: Uuid) -> AppResult<Product> {
        self.products
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn insert(&self, payload: &CreateProduct) -> AppResult<Product> {
        let mut products = self.products.write().await;
        if code_in_use(&products, &payload.code, None) {
            return Err(code_taken(&payload.code));
        }
        let product = build(payload);
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_many(&self, payloads: &[CreateProduct]) -> AppResult<Vec<Product>> {
        let mut products = self.products.write().await;
        let mut codes: HashSet<String> = products.values().map(|p| p.code.clone()).collect();
        let mut inserted = Vec::with_capacity(payloads.len());
        for payload in payloads {
            if !codes.insert(payload.code.clone()) {
                continue;
            }
            let product = build(payload);
            products.insert(product.id, product.clone());
            inserted.push(product);
        }
        Ok(inserted)
    }

    async fn update(&self, id: Uuid, payload: &UpdateProduct) -> AppResult<Product> {
        let mut products = self.products.write().await;
        if let Some(code) = payload.code.as_deref() {
            if code_in_use(&products, code, Some(id)) {
                return Err(code_taken(code));
            }
        }
        let product = products.get_mut(&id).ok_or_else(|| not_found(id))?;
        payload.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.products
            .write()
            .await
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.products.read().await.len() as i64)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn payload(code: &str, name: &str, price_cents: i64, category: &str) -> CreateProduct {
        CreateProduct {
            code: code.to_string(),
            name: name.to_string(),
            description: None,
            price_cents,
            quantity: 3,
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let repo = MemoryProductRepository::new();
        let created = repo.insert(&payload("A-1", "Alpha", 100, "Books")).await.unwrap();
        assert_eq!(created.created_at, created.updated_at);
        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let repo = MemoryProductRepository::new();
        repo.insert(&payload("A-1", "Alpha", 100, "Books")).await.unwrap();
        let err = repo.insert(&payload("A-1", "Other", 1, "Books")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(m) if m.key == "product.code_taken"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_many_skips_existing_codes() {
        let repo = MemoryProductRepository::new();
        repo.insert(&payload("A-1", "Alpha", 100, "Books")).await.unwrap();
        let batch = vec![
            payload("A-1", "dup", 1, "Books"),
            payload("B-2", "Beta", 1, "Books"),
            payload("B-2", "dup in batch", 1, "Books"),
        ];
        let inserted = repo.insert_many(&batch).await.unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].code, "B-2");
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_filters_orders_and_pages() {
        let repo = MemoryProductRepository::new();
        for (i, cat) in ["Books", "Toys", "Books", "Books"].iter().enumerate() {
            repo.insert(&payload(&format!("C-{i}"), &format!("Item {i}"), 100 * i as i64, cat))
                .await
                .unwrap();
        }
        let base = Utc::now();
        for (i, p) in repo.products.write().await.values_mut().enumerate() {
            p.created_at = base + chrono::Duration::seconds(i as i64);
        }

        let filters = ProductFilters {
            category: Some("Books".into()),
            limit: Some(2),
            ..Default::default()
        };
        let page = repo.list(&filters).await.unwrap();
        assert_eq!(page.total, 3);
        let codes: Vec<&str> = page.data.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["C-3", "C-2"], "newest first");

        let page = repo
            .list(&ProductFilters { offset: Some(2), ..filters.clone() })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].code, "C-0");
        assert_eq!(page.offset, 2);
    }

    #[tokio::test]
    async fn equal_timestamps_tie_break_by_id() {
        let repo = MemoryProductRepository::new();
        for i in 0..6 {
            repo.insert(&payload(&format!("T-{i}"), "Same", 100, "Books")).await.unwrap();
        }
        let stamp = Utc::now();
        for p in repo.products.write().await.values_mut() {
            p.created_at = stamp;
        }

        let page = repo.list(&ProductFilters::default()).await.unwrap();
        let ids: Vec<Uuid> = page.data.iter().map(|p| p.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn update_merges_and_bumps_timestamp() {
        let repo = MemoryProductRepository::new();
        let created = repo.insert(&payload("A-1", "Alpha", 100, "Books")).await.unwrap();
        let update = UpdateProduct { price_cents: Some(250), ..Default::default() };
        let updated = repo.update(created.id, &update).await.unwrap();
        assert_eq!(updated.price_cents, 250);
        assert_eq!(updated.name, "Alpha");
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn update_to_taken_code_conflicts() {
        let repo = MemoryProductRepository::new();
        repo.insert(&payload("A-1", "Alpha", 100, "Books")).await.unwrap();
        let b = repo.insert(&payload("B-2", "Beta", 100, "Books")).await.unwrap();
        let update = UpdateProduct { code: Some("A-1".into()), ..Default::default() };
        assert!(matches!(repo.update(b.id, &update).await, Err(AppError::Conflict(_))));

        // Keeping its own code is fine.
        let update = UpdateProduct { code: Some("B-2".into()), ..Default::default() };
        assert!(repo.update(b.id, &update).await.is_ok());
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let repo = MemoryProductRepository::new();
        let id = Uuid::new_v4();
        assert!(matches!(repo.get(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(repo.delete(id).await, Err(AppError::NotFound(_))));
        let update = UpdateProduct { name: Some("x".into()), ..Default::default() };
        assert!(matches!(repo.update(id, &update).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes() {
        let repo = MemoryProductRepository::new();
        let created = repo.insert(&payload("A-1", "Alpha", 100, "Books")).await.unwrap();
        repo.delete(created.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
