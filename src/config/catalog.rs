//! Catalog seeding from config.toml
//!
//! The `[[stores]]` tables describe stores with their categories, products and variants.
//! Seeding is keyed by store name: a store that already exists is left untouched, so
//! restarting the service never duplicates the catalog.

use crate::{
    core::catalog::{self, NewProduct},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{debug, info};

fn default_currency() -> String {
    "USD".to_string()
}

/// A store and everything it sells
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSeed {
    /// Store name, used as the idempotency key
    pub name: String,
    /// Free-text location
    #[serde(default)]
    pub location: String,
    /// Categories of the store
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
}

/// A category and its products
#[derive(Debug, Deserialize, Clone)]
pub struct CategorySeed {
    /// Category name
    pub name: String,
    /// Products in the category
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// A product with its initial stock
#[derive(Debug, Deserialize, Clone)]
pub struct ProductSeed {
    /// Product name
    pub name: String,
    /// Brand
    #[serde(default)]
    pub brand: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Initial on-hand stock
    pub stock: i32,
    /// Base unit price
    pub price: f64,
    /// Image reference
    #[serde(default)]
    pub image_url: String,
    /// Sellable variants
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

/// A sellable variant
#[derive(Debug, Deserialize, Clone)]
pub struct VariantSeed {
    /// Unique SKU
    pub sku_code: String,
    /// Price override; the product price when absent
    pub price: Option<f64>,
    /// Image reference
    #[serde(default)]
    pub image_url: String,
}

/// Counts of what a seeding pass created
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Stores created
    pub stores: usize,
    /// Stores skipped because they already existed
    pub skipped_stores: usize,
    /// Categories created
    pub categories: usize,
    /// Products created
    pub products: usize,
    /// Variants created
    pub variants: usize,
}

/// Seeds stores, categories, products and variants that do not exist yet.
///
/// # Errors
/// Returns an error if a seed entry is invalid (empty name, negative stock, duplicate SKU)
/// or a database operation fails.
pub async fn seed_catalog(db: &DatabaseConnection, stores: &[StoreSeed]) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for seed in stores {
        if catalog::get_store_by_name(db, seed.name.trim()).await?.is_some() {
            debug!("Store '{}' already exists, skipping", seed.name);
            report.skipped_stores += 1;
            continue;
        }

        let store = catalog::create_store(db, seed.name.clone(), seed.location.clone()).await?;
        report.stores += 1;

        for category_seed in &seed.categories {
            let category =
                catalog::create_category(db, store.id, category_seed.name.clone()).await?;
            report.categories += 1;

            for product_seed in &category_seed.products {
                let product = catalog::create_product(
                    db,
                    NewProduct {
                        store_id: store.id,
                        category_id: category.id,
                        name: product_seed.name.clone(),
                        brand: product_seed.brand.clone(),
                        description: product_seed.description.clone(),
                        currency: product_seed.currency.clone(),
                        stock: product_seed.stock,
                        price: product_seed.price,
                        image_url: product_seed.image_url.clone(),
                    },
                )
                .await?;
                report.products += 1;

                for variant_seed in &product_seed.variants {
                    catalog::create_variant(
                        db,
                        product.id,
                        variant_seed.sku_code.clone(),
                        variant_seed.price.unwrap_or(product.price),
                        variant_seed.image_url.clone(),
                    )
                    .await?;
                    report.variants += 1;
                }
            }
        }
        info!("Seeded store '{}'", store.name);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{config::settings::parse_config, errors::Error, test_utils::setup_test_db};

    const SEED_TOML: &str = r#"
        [[stores]]
        name = "Corner Roasters"
        location = "Lisbon"

        [[stores.categories]]
        name = "Coffee"

        [[stores.categories.products]]
        name = "House Blend"
        brand = "Corner"
        stock = 40
        price = 12.5

        [[stores.categories.products.variants]]
        sku_code = "HB-250"

        [[stores.categories.products.variants]]
        sku_code = "HB-1000"
        price = 40.0
    "#;

    #[test]
    fn test_parse_store_seed() {
        let config = parse_config(SEED_TOML).unwrap();
        assert_eq!(config.stores.len(), 1);
        let product = &config.stores[0].categories[0].products[0];
        assert_eq!(product.currency, "USD");
        assert_eq!(product.variants.len(), 2);
        assert_eq!(product.variants[0].price, None);
        assert_eq!(product.variants[1].price, Some(40.0));
    }

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(SEED_TOML)?;

        let report = seed_catalog(&db, &config.stores).await?;
        assert_eq!(
            report,
            SeedReport {
                stores: 1,
                skipped_stores: 0,
                categories: 1,
                products: 1,
                variants: 2,
            }
        );

        let again = seed_catalog(&db, &config.stores).await?;
        assert_eq!(again.stores, 0);
        assert_eq!(again.skipped_stores, 1);

        let store = catalog::get_store_by_name(&db, "Corner Roasters")
            .await?
            .unwrap();
        let products = catalog::list_products_for_store(&db, store.id).await?;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].stock, 40);

        let variants = catalog::list_variants_for_product(&db, products[0].id).await?;
        let prices: Vec<f64> = variants.iter().map(|v| v.price).collect();
        assert!(prices.contains(&12.5));
        assert!(prices.contains(&40.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_rejects_invalid_product() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[stores]]
            name = "Broken"
            [[stores.categories]]
            name = "Misc"
            [[stores.categories.products]]
            name = "Ghost"
            stock = -1
            price = 1.0
        "#,
        )?;

        let result = seed_catalog(&db, &config.stores).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidQuantity { .. }));
        Ok(())
    }
}
