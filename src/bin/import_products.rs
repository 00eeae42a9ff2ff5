//! Loads catalog products from a JSON file into the database.
//!
//! Usage: `import_products <products.json>`
//!
//! The file holds a JSON array of products in the same shape accepted by
//! `POST /api/v1/products`. Invalid entries are reported and skipped; the rest
//! are inserted one by one.

use anyhow::Context;
use loan_compass_api::{db_storage::CatalogStorage, models::ProductCreate, obs};
use sqlx::postgres::PgPoolOptions;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    obs::init_tracing();

    let path = env::args()
        .nth(1)
        .context("usage: import_products <products.json>")?;
    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("DB_URL"))
        .context("DATABASE_URL or DB_URL must be set")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let products: Vec<ProductCreate> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;
    println!("Found {} product(s) in {}", products.len(), path);

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    let catalog = CatalogStorage::new(pool);

    let mut imported = 0usize;
    let mut failed = 0usize;

    for (i, product) in products.iter().enumerate() {
        if let Err(e) = product.validate() {
            println!("✗ entry {} ('{}'): {}", i, product.name, e);
            failed += 1;
            continue;
        }

        match catalog.create_product(product).await {
            Ok(stored) => {
                println!(
                    "✓ {} | {} | {} ({})",
                    stored.id, stored.bank, stored.name, stored.loan_type
                );
                imported += 1;
            }
            Err(e) => {
                tracing::error!("Failed to insert '{}': {}", product.name, e);
                println!("✗ entry {} ('{}'): insert failed", i, product.name);
                failed += 1;
            }
        }
    }

    println!("Imported {} product(s), {} failed", imported, failed);
    Ok(())
}
