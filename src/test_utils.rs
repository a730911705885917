//! Shared test utilities for the marketplace stock engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::settings::PurchaseSettings,
    core::{
        catalog::{self, NewProduct},
        customer,
        ledger::{self, AllocationRequest},
        order::PlacedOrder,
        purchase::{self, LineItem, PurchaseRequest},
        round,
    },
    entities,
    errors::Result,
};
use chrono::{Duration, Utc};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::sync::Arc;
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool holds a single connection: every pooled connection to `sqlite::memory:` would
/// otherwise open its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database with a multi-connection pool.
///
/// Transactions on different pooled connections really overlap here, unlike on
/// [`setup_test_db`]. The returned directory owns the file and must outlive the connection.
pub async fn setup_file_db() -> Result<(TempDir, DatabaseConnection)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("stock.sqlite").display());

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(8)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((dir, db))
}

/// Purchase settings for tests: default prefix, windows enforced, generous lock bound.
pub fn test_settings() -> PurchaseSettings {
    PurchaseSettings {
        lock_timeout_ms: 20_000,
        ..PurchaseSettings::default()
    }
}

/// Creates a test store with an empty location.
pub async fn create_test_store(db: &DatabaseConnection, name: &str) -> Result<entities::store::Model> {
    catalog::create_store(db, name.to_string(), String::new()).await
}

/// Creates a test category inside `store_id`.
pub async fn create_test_category(
    db: &DatabaseConnection,
    store_id: i64,
    name: &str,
) -> Result<entities::category::Model> {
    catalog::create_category(db, store_id, name.to_string()).await
}

/// Creates a test product with the given stock.
///
/// # Defaults
/// * `brand`: "Acme"
/// * `currency`: "USD"
/// * `price`: 20.0
pub async fn create_test_product(
    db: &DatabaseConnection,
    store_id: i64,
    category_id: i64,
    name: &str,
    stock: i32,
) -> Result<entities::product::Model> {
    catalog::create_product(
        db,
        NewProduct {
            store_id,
            category_id,
            name: name.to_string(),
            brand: "Acme".to_string(),
            description: format!("{name} for tests"),
            currency: "usd".to_string(),
            stock,
            price: 20.0,
            image_url: String::new(),
        },
    )
    .await
}

/// Creates a test variant with the given SKU and price.
pub async fn create_test_variant(
    db: &DatabaseConnection,
    product_id: i64,
    sku_code: &str,
    price: f64,
) -> Result<entities::product_variant::Model> {
    catalog::create_variant(db, product_id, sku_code.to_string(), price, String::new()).await
}

/// Creates a round that opened a day ago and closes in a day.
pub async fn create_open_round(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::sales_round::Model> {
    let now = Utc::now();
    round::create_sales_round(
        db,
        name.to_string(),
        now - Duration::days(1),
        now + Duration::days(1),
    )
    .await
}

/// Creates a test customer named after the mailbox of `email`.
pub async fn create_test_customer(
    db: &DatabaseConnection,
    email: &str,
) -> Result<entities::customer::Model> {
    let name = email.split('@').next().unwrap_or(email).to_string();
    customer::create_customer(db, name, email.to_string()).await
}

/// A complete catalog with one variant, one open round and one customer.
pub struct Fixture {
    /// Database holding the fixture
    pub db: DatabaseConnection,
    /// Owning store
    pub store: entities::store::Model,
    /// Owning category
    pub category: entities::category::Model,
    /// Product whose stock is allocated
    pub product: entities::product::Model,
    /// The variant under test (price 25.0)
    pub variant: entities::product_variant::Model,
    /// An open round
    pub round: entities::sales_round::Model,
    /// A customer who can purchase
    pub customer: entities::customer::Model,
}

/// Sets up a complete test environment around one product with `stock` units on hand.
pub async fn setup_with_variant(stock: i32) -> Result<Fixture> {
    populate_fixture(setup_test_db().await?, stock).await
}

/// Same as [`setup_with_variant`], on a file-backed multi-connection pool.
pub async fn setup_file_with_variant(stock: i32) -> Result<(TempDir, Fixture)> {
    let (dir, db) = setup_file_db().await?;
    let fx = populate_fixture(db, stock).await?;
    Ok((dir, fx))
}

async fn populate_fixture(db: DatabaseConnection, stock: i32) -> Result<Fixture> {
    let store = create_test_store(&db, "Test Store").await?;
    let category = create_test_category(&db, store.id, "Test Category").await?;
    let product = create_test_product(&db, store.id, category.id, "Test Product", stock).await?;
    let variant = create_test_variant(&db, product.id, "SKU-A", 25.0).await?;
    let round = create_open_round(&db, "Test Round").await?;
    let customer = create_test_customer(&db, "buyer@example.com").await?;
    Ok(Fixture {
        db,
        store,
        category,
        product,
        variant,
        round,
        customer,
    })
}

/// Allocates `quantity` units of any variant to the fixture's round.
pub async fn allocate_variant(
    fx: &Fixture,
    variant_id: i64,
    quantity: i32,
    quantity_limit: i32,
) -> Result<entities::sales_round_detail::Model> {
    ledger::create_or_increase_allocation(
        &fx.db,
        &test_settings(),
        AllocationRequest {
            round_id: fx.round.id,
            variant_id,
            quantity,
            quantity_limit,
        },
    )
    .await
}

/// Allocates `quantity` units of the fixture's variant to the fixture's round.
pub async fn allocate_to_round(
    fx: &Fixture,
    quantity: i32,
    quantity_limit: i32,
) -> Result<entities::sales_round_detail::Model> {
    allocate_variant(fx, fx.variant.id, quantity, quantity_limit).await
}

/// Builds a purchase request for the fixture's customer and round.
pub fn purchase_request(fx: &Fixture, items: &[(i64, i32)]) -> PurchaseRequest {
    PurchaseRequest {
        customer_id: fx.customer.id,
        round_id: fx.round.id,
        delivery_address: "1 Main St".to_string(),
        payment_source: "card_test".to_string(),
        items: items
            .iter()
            .map(|&(variant_id, quantity)| LineItem {
                variant_id,
                quantity,
            })
            .collect(),
    }
}

/// Executes a purchase of `items` for the fixture's customer in the fixture's round.
pub async fn purchase(fx: &Fixture, items: &[(i64, i32)]) -> Result<PlacedOrder> {
    purchase::execute_purchase(&fx.db, &test_settings(), &purchase_request(fx, items)).await
}

/// Runs `buyers` copies of `request` as separate tasks sharing one connection pool.
///
/// Outcomes are returned in spawn order.
#[allow(clippy::expect_used)]
pub async fn run_concurrent_purchases(
    db: &Arc<DatabaseConnection>,
    request: &PurchaseRequest,
    buyers: usize,
) -> Vec<Result<PlacedOrder>> {
    let settings = test_settings();
    let handles: Vec<_> = (0..buyers)
        .map(|_| {
            let db = Arc::clone(db);
            let settings = settings.clone();
            let request = request.clone();
            tokio::spawn(async move { purchase::execute_purchase(&db, &settings, &request).await })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(buyers);
    for handle in handles {
        outcomes.push(handle.await.expect("purchase task panicked"));
    }
    outcomes
}
