use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::db::ProductRepository;
use crate::error::AppResult;
use crate::models::{CreateProduct, Product};

pub const BATCH_SIZE: usize = 500;

static CATEGORIES: &[&str] = &[
    "Electronics",
    "Clothing",
    "Food & Beverage",
    "Home & Garden",
    "Toys & Games",
    "Sports & Outdoors",
    "Books",
    "Automotive",
    "Health & Beauty",
    "Office Supplies",
    "Musical Instruments",
    "Pet Supplies",
    "Jewelry",
    "Tools & Hardware",
    "Baby Products",
];

static ADJECTIVES: &[&str] = &[
    "Premium", "Deluxe", "Ultra", "Pro", "Classic", "Elite", "Smart", "Eco",
    "Compact", "Portable", "Heavy-Duty", "Lightweight", "Advanced", "Basic",
    "Professional", "Essential", "Signature", "Exclusive", "Standard", "Plus",
];

static NOUNS: &[&str] = &[
    "Widget", "Gadget", "Device", "Module", "Unit", "Component", "System",
    "Kit", "Set", "Pack", "Bundle", "Assembly", "Console", "Panel", "Sensor",
    "Controller", "Adapter", "Monitor", "Scanner", "Converter",
];

/// Builds one random registration; `serial` keeps names and codes distinct.
fn random_product(rng: &mut impl Rng, serial: usize) -> CreateProduct {
    let adj = ADJECTIVES.choose(rng).unwrap_or(&"Standard");
    let noun = NOUNS.choose(rng).unwrap_or(&"Widget");
    let name = format!("{} {} #{:05}", adj, noun, serial);
    let description = rng
        .gen_bool(0.7)
        .then(|| format!("High-quality {} for professional use. Serial: {}", name, serial));

    CreateProduct {
        code: format!("SKU-{:05}-{:06x}", serial, rng.gen_range(0..0x100_0000u32)),
        name,
        description,
        price_cents: rng.gen_range(99..=999_99), // $0.99 – $999.99
        quantity: rng.gen_range(0..=500),
        category: CATEGORIES.choose(rng).unwrap_or(&"Books").to_string(),
    }
}

pub fn generate(rng: &mut impl Rng, start_serial: usize, count: usize) -> Vec<CreateProduct> {
    (0..count).map(|i| random_product(rng, start_serial + i)).collect()
}

/// Inserts `count` random products in batches. Serials continue from the
/// current row count so repeated seeding keeps producing fresh names.
pub async fn seed_products(repo: &dyn ProductRepository, count: usize) -> AppResult<Vec<Product>> {
    info!("Seeding {} products...", count);

    // StdRng is Send, so it can be held across await points
    let mut rng = StdRng::from_entropy();
    let first_serial = repo.count().await?.max(0) as usize;
    let chunks = count.div_ceil(BATCH_SIZE);
    let mut all_products: Vec<Product> = Vec::with_capacity(count);

    for chunk in 0..chunks {
        let start = chunk * BATCH_SIZE;
        let end = (start + BATCH_SIZE).min(count);
        let batch = generate(&mut rng, first_serial + start, end - start);

        all_products.extend(repo.insert_many(&batch).await?);

        info!(
            "  Seeded batch {}/{} ({} products so far)",
            chunk + 1,
            chunks,
            all_products.len()
        );
    }

    info!("Seeding complete. Total: {} products", all_products.len());
    Ok(all_products)
}
