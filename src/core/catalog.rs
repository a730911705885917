//! Catalog business logic - stores, categories, products, variants and product stock.
//!
//! The record-keeping functions are plain create/read/update/soft-delete. The stock
//! primitives at the bottom are what the allocation ledger builds on: every change to
//! `products.stock` is a single SQL statement, and decrements are guarded so the counter
//! can never go below zero no matter how many writers race on it.

use crate::{
    entities::{Category, Product, ProductVariant, Store, category, product, product_variant, store},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};

/// Outcome of a guarded stock decrement.
#[derive(Debug, Clone, PartialEq)]
pub enum StockChange {
    /// The decrement was applied; carries the product as it is now
    Applied(product::Model),
    /// The guard rejected the decrement; carries the stock that was actually available
    Insufficient {
        /// Current on-hand stock
        available: i32,
    },
}

/// Fields needed to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Owning store
    pub store_id: i64,
    /// Category within the store
    pub category_id: i64,
    /// Product name
    pub name: String,
    /// Brand name
    pub brand: String,
    /// Long description
    pub description: String,
    /// ISO 4217 currency code
    pub currency: String,
    /// Initial on-hand stock
    pub stock: i32,
    /// Base unit price
    pub price: f64,
    /// Image reference
    pub image_url: String,
}

/// Editable product fields. Stock is deliberately absent: it only moves through the
/// stock primitives.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    /// New name
    pub name: String,
    /// New brand
    pub brand: String,
    /// New description
    pub description: String,
    /// New base price
    pub price: f64,
    /// New image reference
    pub image_url: String,
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: format!("{kind} name cannot be empty"),
        });
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if price < 0.0 || !price.is_finite() {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Creates a new store.
pub async fn create_store(
    db: &DatabaseConnection,
    name: String,
    location: String,
) -> Result<store::Model> {
    validate_name("Store", &name)?;

    let now = Utc::now().naive_utc();
    let store = store::ActiveModel {
        name: Set(name.trim().to_string()),
        location: Set(location),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    store.insert(db).await.map_err(Into::into)
}

/// Retrieves an active store by id.
pub async fn get_store_by_id<C>(db: &C, store_id: i64) -> Result<Option<store::Model>>
where
    C: ConnectionTrait,
{
    Store::find_by_id(store_id)
        .filter(store::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active store by exact name.
pub async fn get_store_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<store::Model>> {
    Store::find()
        .filter(store::Column::Name.eq(name))
        .filter(store::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists active stores alphabetically.
pub async fn list_active_stores(db: &DatabaseConnection) -> Result<Vec<store::Model>> {
    Store::find()
        .filter(store::Column::IsDeleted.eq(false))
        .order_by_asc(store::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames or relocates a store.
pub async fn update_store(
    db: &DatabaseConnection,
    store_id: i64,
    name: String,
    location: String,
) -> Result<store::Model> {
    validate_name("Store", &name)?;

    let mut store: store::ActiveModel = get_store_by_id(db, store_id)
        .await?
        .ok_or_else(|| Error::not_found("Store", store_id))?
        .into();
    store.name = Set(name.trim().to_string());
    store.location = Set(location);
    store.updated_at = Set(Utc::now().naive_utc());
    store.update(db).await.map_err(Into::into)
}

/// Soft deletes a store.
pub async fn delete_store(db: &DatabaseConnection, store_id: i64) -> Result<store::Model> {
    let mut store: store::ActiveModel = get_store_by_id(db, store_id)
        .await?
        .ok_or_else(|| Error::not_found("Store", store_id))?
        .into();
    store.is_deleted = Set(true);
    store.updated_at = Set(Utc::now().naive_utc());
    store.update(db).await.map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Creates a category inside an existing store.
pub async fn create_category(
    db: &DatabaseConnection,
    store_id: i64,
    name: String,
) -> Result<category::Model> {
    validate_name("Category", &name)?;
    get_store_by_id(db, store_id)
        .await?
        .ok_or_else(|| Error::not_found("Store", store_id))?;

    let now = Utc::now().naive_utc();
    let category = category::ActiveModel {
        store_id: Set(store_id),
        name: Set(name.trim().to_string()),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    category.insert(db).await.map_err(Into::into)
}

/// Retrieves an active category by id.
pub async fn get_category_by_id<C>(db: &C, category_id: i64) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find_by_id(category_id)
        .filter(category::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a store's active categories alphabetically.
pub async fn list_categories_for_store(
    db: &DatabaseConnection,
    store_id: i64,
) -> Result<Vec<category::Model>> {
    Category::find()
        .filter(category::Column::StoreId.eq(store_id))
        .filter(category::Column::IsDeleted.eq(false))
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames a category.
pub async fn update_category(
    db: &DatabaseConnection,
    category_id: i64,
    name: String,
) -> Result<category::Model> {
    validate_name("Category", &name)?;

    let mut category: category::ActiveModel = get_category_by_id(db, category_id)
        .await?
        .ok_or_else(|| Error::not_found("Category", category_id))?
        .into();
    category.name = Set(name.trim().to_string());
    category.updated_at = Set(Utc::now().naive_utc());
    category.update(db).await.map_err(Into::into)
}

/// Soft deletes a category.
pub async fn delete_category(db: &DatabaseConnection, category_id: i64) -> Result<category::Model> {
    let mut category: category::ActiveModel = get_category_by_id(db, category_id)
        .await?
        .ok_or_else(|| Error::not_found("Category", category_id))?
        .into();
    category.is_deleted = Set(true);
    category.updated_at = Set(Utc::now().naive_utc());
    category.update(db).await.map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Creates a new product, validating name, price and initial stock.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - The price is negative or not finite
/// - The initial stock is negative
/// - The store or category does not exist, or the category belongs to another store
pub async fn create_product(db: &DatabaseConnection, new: NewProduct) -> Result<product::Model> {
    validate_name("Product", &new.name)?;
    validate_price(new.price)?;
    if new.stock < 0 {
        return Err(Error::InvalidQuantity {
            quantity: new.stock,
        });
    }

    get_store_by_id(db, new.store_id)
        .await?
        .ok_or_else(|| Error::not_found("Store", new.store_id))?;
    let category = get_category_by_id(db, new.category_id)
        .await?
        .ok_or_else(|| Error::not_found("Category", new.category_id))?;
    if category.store_id != new.store_id {
        return Err(Error::not_found("Category", new.category_id));
    }

    let now = Utc::now().naive_utc();
    let product = product::ActiveModel {
        store_id: Set(new.store_id),
        category_id: Set(new.category_id),
        name: Set(new.name.trim().to_string()),
        brand: Set(new.brand),
        description: Set(new.description),
        currency: Set(new.currency.to_uppercase()),
        stock: Set(new.stock),
        price: Set(new.price),
        image_url: Set(new.image_url),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Retrieves a product by id, including soft-deleted ones.
pub async fn get_product_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an active product or fails with `NotFound`.
pub async fn require_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    match get_product_by_id(db, product_id).await? {
        Some(product) if !product.is_deleted => Ok(product),
        _ => Err(Error::not_found("Product", product_id)),
    }
}

/// Resolves the active product that owns a variant.
pub async fn get_product_by_variant_id<C>(db: &C, variant_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let variant = require_variant(db, variant_id).await?;
    require_product(db, variant.product_id).await
}

/// Lists a store's active products alphabetically.
pub async fn list_products_for_store(
    db: &DatabaseConnection,
    store_id: i64,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::StoreId.eq(store_id))
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a product's descriptive fields and base price.
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    update: ProductUpdate,
) -> Result<product::Model> {
    validate_name("Product", &update.name)?;
    validate_price(update.price)?;

    let mut product: product::ActiveModel = require_product(db, product_id).await?.into();
    product.name = Set(update.name.trim().to_string());
    product.brand = Set(update.brand);
    product.description = Set(update.description);
    product.price = Set(update.price);
    product.image_url = Set(update.image_url);
    product.updated_at = Set(Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

/// Soft deletes a product, preserving order history that references its variants.
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = require_product(db, product_id).await?.into();
    product.is_deleted = Set(true);
    product.updated_at = Set(Utc::now().naive_utc());
    product.update(db).await.map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Creates a variant of an existing product. SKU codes are unique across all variants.
pub async fn create_variant(
    db: &DatabaseConnection,
    product_id: i64,
    sku_code: String,
    price: f64,
    image_url: String,
) -> Result<product_variant::Model> {
    let sku_code = sku_code.trim().to_string();
    validate_name("SKU", &sku_code)?;
    validate_price(price)?;
    require_product(db, product_id).await?;

    let taken = ProductVariant::find()
        .filter(product_variant::Column::SkuCode.eq(sku_code.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::AlreadyExists {
            entity: "ProductVariant",
            key: sku_code,
        });
    }

    let now = Utc::now().naive_utc();
    let variant = product_variant::ActiveModel {
        product_id: Set(product_id),
        sku_code: Set(sku_code),
        price: Set(price),
        image_url: Set(image_url),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    variant.insert(db).await.map_err(Into::into)
}

/// Retrieves a variant by id, including soft-deleted ones.
pub async fn get_variant_by_id<C>(db: &C, variant_id: i64) -> Result<Option<product_variant::Model>>
where
    C: ConnectionTrait,
{
    ProductVariant::find_by_id(variant_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an active variant or fails with `NotFound`.
pub async fn require_variant<C>(db: &C, variant_id: i64) -> Result<product_variant::Model>
where
    C: ConnectionTrait,
{
    match get_variant_by_id(db, variant_id).await? {
        Some(variant) if !variant.is_deleted => Ok(variant),
        _ => Err(Error::not_found("ProductVariant", variant_id)),
    }
}

/// Lists a product's active variants by SKU.
pub async fn list_variants_for_product(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Vec<product_variant::Model>> {
    ProductVariant::find()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .filter(product_variant::Column::IsDeleted.eq(false))
        .order_by_asc(product_variant::Column::SkuCode)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Changes a variant's price. Existing order lines keep the price they were bought at.
pub async fn update_variant_price(
    db: &DatabaseConnection,
    variant_id: i64,
    price: f64,
) -> Result<product_variant::Model> {
    validate_price(price)?;

    let mut variant: product_variant::ActiveModel = require_variant(db, variant_id).await?.into();
    variant.price = Set(price);
    variant.updated_at = Set(Utc::now().naive_utc());
    variant.update(db).await.map_err(Into::into)
}

/// Soft deletes a variant.
pub async fn delete_variant(
    db: &DatabaseConnection,
    variant_id: i64,
) -> Result<product_variant::Model> {
    let mut variant: product_variant::ActiveModel = require_variant(db, variant_id).await?.into();
    variant.is_deleted = Set(true);
    variant.updated_at = Set(Utc::now().naive_utc());
    variant.update(db).await.map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Stock primitives
// ---------------------------------------------------------------------------

/// Atomically takes `quantity` units from a product's stock if at least that many are on hand.
///
/// Runs as one guarded statement:
/// `UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ? AND NOT is_deleted`.
/// Concurrent callers can never both pass the guard for the same units, so the counter
/// stays non-negative without any application-level lock.
pub async fn take_product_stock_atomic<C>(
    db: &C,
    product_id: i64,
    quantity: i32,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    if quantity < 0 {
        return Err(Error::InvalidQuantity { quantity });
    }

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(
            product::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::IsDeleted.eq(false))
        .filter(product::Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    let product = require_product(db, product_id).await?;
    if result.rows_affected == 0 {
        return Ok(StockChange::Insufficient {
            available: product.stock,
        });
    }
    Ok(StockChange::Applied(product))
}

/// Atomically returns `quantity` units to a product's stock.
pub async fn return_product_stock_atomic<C>(
    db: &C,
    product_id: i64,
    quantity: i32,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    if quantity < 0 {
        return Err(Error::InvalidQuantity { quantity });
    }

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(
            product::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::IsDeleted.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("Product", product_id));
    }
    require_product(db, product_id).await
}

/// Applies a signed stock delta: positive returns stock, negative takes it (guarded).
pub async fn adjust_product_stock_atomic<C>(
    db: &C,
    product_id: i64,
    delta: i32,
) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    if delta < 0 {
        take_product_stock_atomic(db, product_id, -delta).await
    } else {
        return_product_stock_atomic(db, product_id, delta)
            .await
            .map(StockChange::Applied)
    }
}
