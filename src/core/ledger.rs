//! Round allocation ledger - carving product stock into sales rounds.
//!
//! Each `(round, variant)` pair has at most one `sales_round_detail` row. Creating or growing
//! an allocation moves units out of `products.stock` and into the row's `quantity` and
//! `remaining`; shrinking or deleting an allocation moves unsold units back. Every mutation
//! runs in one database transaction that touches the product row first and the ledger row
//! second, and every counter change is a guarded single-statement update, so concurrent
//! allocations and purchases on the same counters serialize in the database instead of in
//! application code.
//!
//! Each transaction opens with a no-op write on the rows it is about to change, so the write
//! lock is taken before anything is read. On SQLite a deferred transaction that reads first
//! cannot upgrade once another writer has committed and fails with `database is locked`;
//! claiming the lock first makes it wait in the busy handler instead.

use crate::{
    config::settings::PurchaseSettings,
    core::{
        catalog::{self, StockChange},
        commit_within, round,
    },
    entities::{Product, ProductVariant, SalesRoundDetail, product, product_variant, sales_round_detail},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryOrder, Set, SqlErr, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Query, SelectStatement},
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// A request to set aside stock of one variant for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Round receiving the stock
    pub round_id: i64,
    /// Variant whose product stock is drawn from
    pub variant_id: i64,
    /// Units to add to the allocation
    pub quantity: i32,
    /// Per-line purchase cap for this allocation
    pub quantity_limit: i32,
}

/// An allocation row joined with the display fields of its variant and product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationView {
    /// The ledger row itself
    pub allocation: sales_round_detail::Model,
    /// Product owning the variant
    pub product_id: i64,
    /// Variant SKU
    pub sku_code: String,
    /// Variant unit price
    pub variant_price: f64,
    /// Variant image reference
    pub variant_image_url: String,
    /// Product name
    pub product_name: String,
    /// Product brand
    pub brand: String,
    /// Product description
    pub description: String,
    /// Product currency
    pub currency: String,
    /// Product on-hand stock right now
    pub stock: i32,
    /// Product base price
    pub product_price: f64,
}

impl AllocationView {
    fn new(
        allocation: sales_round_detail::Model,
        variant: &product_variant::Model,
        product: &product::Model,
    ) -> Self {
        Self {
            allocation,
            product_id: product.id,
            sku_code: variant.sku_code.clone(),
            variant_price: variant.price,
            variant_image_url: variant.image_url.clone(),
            product_name: product.name.clone(),
            brand: product.brand.clone(),
            description: product.description.clone(),
            currency: product.currency.clone(),
            stock: product.stock,
            product_price: product.price,
        }
    }
}

/// Looks up the allocation row for a `(round, variant)` pair, if any.
pub async fn find_allocation<C>(
    db: &C,
    round_id: i64,
    variant_id: i64,
) -> Result<Option<sales_round_detail::Model>>
where
    C: ConnectionTrait,
{
    SalesRoundDetail::find()
        .filter(sales_round_detail::Column::RoundId.eq(round_id))
        .filter(sales_round_detail::Column::VariantId.eq(variant_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the allocation for a `(round, variant)` pair or fails with `NotFound`.
pub async fn get_allocation<C>(
    db: &C,
    round_id: i64,
    variant_id: i64,
) -> Result<sales_round_detail::Model>
where
    C: ConnectionTrait,
{
    find_allocation(db, round_id, variant_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "SalesRoundDetail",
            id: format!("round {round_id}, variant {variant_id}"),
        })
}

/// Retrieves an allocation row by id or fails with `NotFound`.
pub async fn get_allocation_by_id<C>(db: &C, detail_id: i64) -> Result<sales_round_detail::Model>
where
    C: ConnectionTrait,
{
    SalesRoundDetail::find_by_id(detail_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("SalesRoundDetail", detail_id))
}

/// Creates the allocation for `(round, variant)` or tops up the existing one.
///
/// The requested `quantity` is the increment. It is checked against the product's current
/// stock (never against a stale cumulative total) and then taken from the product with a
/// guarded decrement. On a fresh row `quantity = remaining = increment`; on a top-up both
/// grow by the increment and `quantity_limit` is replaced. `product_stock` records the
/// product's stock after the decrement.
///
/// # Errors
/// - `InvalidQuantity` if the increment or the limit is not positive
/// - `NotFound` if the round, variant or product does not exist
/// - `RoundClosed` if the round is over and round windows are enforced
/// - `InsufficientStock` if the product has fewer units on hand than the increment
/// - `Contention` if the transaction could not finish in time or lost a race creating the row
#[instrument(skip(db, settings))]
pub async fn create_or_increase_allocation(
    db: &DatabaseConnection,
    settings: &PurchaseSettings,
    request: AllocationRequest,
) -> Result<sales_round_detail::Model> {
    if request.quantity <= 0 {
        return Err(Error::InvalidQuantity {
            quantity: request.quantity,
        });
    }
    if request.quantity_limit <= 0 {
        return Err(Error::InvalidQuantity {
            quantity: request.quantity_limit,
        });
    }

    let result = commit_within(
        settings.lock_timeout(),
        "allocation",
        allocate(db, settings, request),
    )
    .await;

    match &result {
        Ok(detail) => info!(
            "Allocated {} units of variant {} to round {} (quantity {}, remaining {}, product stock {})",
            request.quantity,
            request.variant_id,
            request.round_id,
            detail.quantity,
            detail.remaining,
            detail.product_stock
        ),
        Err(e) => warn!("Allocation rejected: {}", e),
    }
    result
}

/// Claims the write lock on the products behind `variant_ids` with a no-op update.
async fn claim_products<C>(db: &C, variant_ids: SelectStatement) -> Result<()>
where
    C: ConnectionTrait,
{
    let product_ids = Query::select()
        .column(product_variant::Column::ProductId)
        .from(ProductVariant)
        .and_where(product_variant::Column::Id.in_subquery(variant_ids))
        .to_owned();
    Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(0),
        )
        .filter(product::Column::Id.in_subquery(product_ids))
        .exec(db)
        .await?;
    Ok(())
}

/// Claims the write lock on the product that owns `variant_id`.
pub(crate) async fn claim_product_for_variant<C>(db: &C, variant_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let variant_ids = Query::select()
        .column(product_variant::Column::Id)
        .from(ProductVariant)
        .and_where(product_variant::Column::Id.eq(variant_id))
        .to_owned();
    claim_products(db, variant_ids).await
}

async fn claim_product_for_allocation<C>(db: &C, detail_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let variant_ids = Query::select()
        .column(sales_round_detail::Column::VariantId)
        .from(SalesRoundDetail)
        .and_where(sales_round_detail::Column::Id.eq(detail_id))
        .to_owned();
    claim_products(db, variant_ids).await
}

/// Claims the write lock on a round's allocation rows for `variant_ids` with a no-op update.
pub async fn claim_allocations<C>(db: &C, round_id: i64, variant_ids: &[i64]) -> Result<()>
where
    C: ConnectionTrait,
{
    SalesRoundDetail::update_many()
        .col_expr(
            sales_round_detail::Column::Remaining,
            Expr::col(sales_round_detail::Column::Remaining).add(0),
        )
        .filter(sales_round_detail::Column::RoundId.eq(round_id))
        .filter(sales_round_detail::Column::VariantId.is_in(variant_ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(())
}

async fn allocate(
    db: &DatabaseConnection,
    settings: &PurchaseSettings,
    request: AllocationRequest,
) -> Result<(DatabaseTransaction, sales_round_detail::Model)> {
    let AllocationRequest {
        round_id,
        variant_id,
        quantity,
        quantity_limit,
    } = request;

    let txn = db.begin().await?;
    claim_product_for_variant(&txn, variant_id).await?;

    let round = round::require_round(&txn, round_id).await?;
    if settings.enforce_round_window {
        round::ensure_round_not_ended(&round, Utc::now())?;
    }
    let product = catalog::get_product_by_variant_id(&txn, variant_id).await?;
    let existing = find_allocation(&txn, round_id, variant_id).await?;

    if product.stock < quantity {
        return Err(Error::InsufficientStock {
            variant_id,
            requested: quantity,
            available: product.stock,
        });
    }
    let product = match catalog::take_product_stock_atomic(&txn, product.id, quantity).await? {
        StockChange::Applied(product) => product,
        StockChange::Insufficient { available } => {
            return Err(Error::InsufficientStock {
                variant_id,
                requested: quantity,
                available,
            });
        }
    };

    let now = Utc::now().naive_utc();
    let detail = if let Some(existing) = existing {
        SalesRoundDetail::update_many()
            .col_expr(
                sales_round_detail::Column::Quantity,
                Expr::col(sales_round_detail::Column::Quantity).add(quantity),
            )
            .col_expr(
                sales_round_detail::Column::Remaining,
                Expr::col(sales_round_detail::Column::Remaining).add(quantity),
            )
            .col_expr(
                sales_round_detail::Column::QuantityLimit,
                Expr::value(quantity_limit),
            )
            .col_expr(
                sales_round_detail::Column::ProductStock,
                Expr::value(product.stock),
            )
            .col_expr(sales_round_detail::Column::UpdatedAt, Expr::value(now))
            .filter(sales_round_detail::Column::Id.eq(existing.id))
            .exec(&txn)
            .await?;
        get_allocation_by_id(&txn, existing.id).await?
    } else {
        let detail = sales_round_detail::ActiveModel {
            round_id: Set(round_id),
            variant_id: Set(variant_id),
            quantity: Set(quantity),
            quantity_limit: Set(quantity_limit),
            remaining: Set(quantity),
            product_stock: Set(product.stock),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        detail.insert(&txn).await.map_err(|e| {
            // Another request created the row first; the caller can retry as a top-up.
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                Error::Contention {
                    message: format!(
                        "allocation for round {round_id}, variant {variant_id} was created concurrently"
                    ),
                }
            } else {
                e.into()
            }
        })?
    };

    Ok((txn, detail))
}

/// Sets an allocation's cumulative quantity to `new_quantity`.
///
/// The difference `old - new` goes back to (or, when negative, is drawn from) the product's
/// stock, and `remaining` moves by `new - old`. Units already sold stay sold: the quantity
/// cannot drop below `quantity - remaining`.
///
/// # Errors
/// - `InvalidQuantity` if `new_quantity` is negative
/// - `NotFound` if the allocation, variant or product does not exist
/// - `InsufficientStock` if growing the allocation would drive product stock negative, or
///   shrinking it would release more units than are unsold
/// - `Contention` if a concurrent purchase or edit changed the row mid-update
#[instrument(skip(db, settings))]
pub async fn set_allocation_quantity(
    db: &DatabaseConnection,
    settings: &PurchaseSettings,
    detail_id: i64,
    new_quantity: i32,
) -> Result<sales_round_detail::Model> {
    if new_quantity < 0 {
        return Err(Error::InvalidQuantity {
            quantity: new_quantity,
        });
    }

    let result = commit_within(
        settings.lock_timeout(),
        "allocation update",
        update_quantity(db, detail_id, new_quantity),
    )
    .await;

    match &result {
        Ok(detail) => info!(
            "Allocation {} now holds {} units ({} remaining, product stock {})",
            detail.id, detail.quantity, detail.remaining, detail.product_stock
        ),
        Err(e) => warn!("Allocation update rejected: {}", e),
    }
    result
}

async fn update_quantity(
    db: &DatabaseConnection,
    detail_id: i64,
    new_quantity: i32,
) -> Result<(DatabaseTransaction, sales_round_detail::Model)> {
    let txn = db.begin().await?;
    claim_product_for_allocation(&txn, detail_id).await?;

    let detail = get_allocation_by_id(&txn, detail_id).await?;
    let product = catalog::get_product_by_variant_id(&txn, detail.variant_id).await?;

    // Positive: units go back to the product. Negative: units are drawn from it.
    let delta = detail.quantity - new_quantity;
    if delta > detail.remaining {
        return Err(Error::InsufficientStock {
            variant_id: detail.variant_id,
            requested: delta,
            available: detail.remaining,
        });
    }

    let product = match catalog::adjust_product_stock_atomic(&txn, product.id, delta).await? {
        StockChange::Applied(product) => product,
        StockChange::Insufficient { available } => {
            return Err(Error::InsufficientStock {
                variant_id: detail.variant_id,
                requested: -delta,
                available,
            });
        }
    };

    let result = SalesRoundDetail::update_many()
        .col_expr(
            sales_round_detail::Column::Quantity,
            Expr::value(new_quantity),
        )
        .col_expr(
            sales_round_detail::Column::Remaining,
            Expr::col(sales_round_detail::Column::Remaining).sub(delta),
        )
        .col_expr(
            sales_round_detail::Column::ProductStock,
            Expr::value(product.stock),
        )
        .col_expr(
            sales_round_detail::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(sales_round_detail::Column::Id.eq(detail.id))
        .filter(sales_round_detail::Column::Quantity.eq(detail.quantity))
        .filter(sales_round_detail::Column::Remaining.gte(delta))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Contention {
            message: format!("allocation {detail_id} changed while it was being updated"),
        });
    }

    let updated = get_allocation_by_id(&txn, detail.id).await?;
    Ok((txn, updated))
}

/// Removes an allocation and returns its unsold units to the product's stock.
///
/// Returns the product as it is after the restock.
///
/// # Errors
/// - `NotFound` if the allocation, variant or product does not exist
/// - `Contention` if a purchase consumed units from the row mid-delete
#[instrument(skip(db, settings))]
pub async fn delete_allocation(
    db: &DatabaseConnection,
    settings: &PurchaseSettings,
    detail_id: i64,
) -> Result<product::Model> {
    let (detail, product) = commit_within(settings.lock_timeout(), "allocation delete", async {
        let txn = db.begin().await?;
        claim_product_for_allocation(&txn, detail_id).await?;

        let detail = get_allocation_by_id(&txn, detail_id).await?;
        let product = catalog::get_product_by_variant_id(&txn, detail.variant_id).await?;
        let product = catalog::return_product_stock_atomic(&txn, product.id, detail.remaining).await?;

        let result = SalesRoundDetail::delete_many()
            .filter(sales_round_detail::Column::Id.eq(detail.id))
            .filter(sales_round_detail::Column::Remaining.eq(detail.remaining))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::Contention {
                message: format!("allocation {detail_id} changed while it was being deleted"),
            });
        }

        Ok((txn, (detail, product)))
    })
    .await?;

    info!(
        "Deleted allocation {} and returned {} units to product {}",
        detail.id, detail.remaining, product.id
    );
    Ok(product)
}

/// Atomically consumes `quantity` unsold units of an allocation.
///
/// Runs as `UPDATE … SET remaining = remaining - ? WHERE id = ? AND remaining >= ?`. When the
/// guard fails the row is re-read and the current availability is reported.
pub async fn consume_allocation_atomic<C>(
    db: &C,
    allocation: &sales_round_detail::Model,
    quantity: i32,
    product_stock: i32,
) -> Result<sales_round_detail::Model>
where
    C: ConnectionTrait,
{
    let result = SalesRoundDetail::update_many()
        .col_expr(
            sales_round_detail::Column::Remaining,
            Expr::col(sales_round_detail::Column::Remaining).sub(quantity),
        )
        .col_expr(
            sales_round_detail::Column::ProductStock,
            Expr::value(product_stock),
        )
        .col_expr(
            sales_round_detail::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(sales_round_detail::Column::Id.eq(allocation.id))
        .filter(sales_round_detail::Column::Remaining.gte(quantity))
        .exec(db)
        .await?;

    let current = get_allocation_by_id(db, allocation.id).await?;
    if result.rows_affected == 0 {
        return Err(Error::InsufficientStock {
            variant_id: allocation.variant_id,
            requested: quantity,
            available: current.remaining,
        });
    }
    Ok(current)
}

/// Lists a round's allocations joined with variant and product display fields.
///
/// The join is read-only; the returned views are not meant to be written back.
pub async fn list_allocations_for_round(
    db: &DatabaseConnection,
    round_id: i64,
) -> Result<Vec<AllocationView>> {
    round::require_round(db, round_id).await?;

    let details = SalesRoundDetail::find()
        .filter(sales_round_detail::Column::RoundId.eq(round_id))
        .order_by_asc(sales_round_detail::Column::Id)
        .all(db)
        .await?;
    if details.is_empty() {
        return Ok(Vec::new());
    }

    let variant_ids: Vec<i64> = details.iter().map(|d| d.variant_id).collect();
    let variants: HashMap<i64, product_variant::Model> = ProductVariant::find()
        .filter(product_variant::Column::Id.is_in(variant_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let product_ids: Vec<i64> = variants.values().map(|v| v.product_id).collect();
    let products: HashMap<i64, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    details
        .into_iter()
        .map(|detail| {
            let variant = variants
                .get(&detail.variant_id)
                .ok_or_else(|| Error::not_found("ProductVariant", detail.variant_id))?;
            let product = products
                .get(&variant.product_id)
                .ok_or_else(|| Error::not_found("Product", variant.product_id))?;
            Ok(AllocationView::new(detail, variant, product))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fresh_allocation_carves_stock() -> Result<()> {
        let fx = setup_with_variant(10).await?;

        let detail = allocate_to_round(&fx, 6, 3).await?;
        assert_eq!(detail.quantity, 6);
        assert_eq!(detail.remaining, 6);
        assert_eq!(detail.quantity_limit, 3);
        assert_eq!(detail.product_stock, 4);

        let product = catalog::require_product(&fx.db, fx.product.id).await?;
        assert_eq!(product.stock, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_top_up_accumulates() -> Result<()> {
        let fx = setup_with_variant(10).await?;

        allocate_to_round(&fx, 6, 3).await?;
        let detail = allocate_to_round(&fx, 3, 5).await?;
        assert_eq!(detail.quantity, 9);
        assert_eq!(detail.remaining, 9);
        assert_eq!(detail.quantity_limit, 5);
        assert_eq!(detail.product_stock, 1);

        // Still exactly one ledger row for the pair
        let rows = list_allocations_for_round(&fx.db, fx.round.id).await?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_top_up_checks_increment_against_current_stock() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let first = allocate_to_round(&fx, 6, 3).await?;

        // 4 on hand, 5 requested
        let result = allocate_to_round(&fx, 5, 3).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock {
                requested: 5,
                available: 4,
                ..
            }
        ));

        let detail = get_allocation_by_id(&fx.db, first.id).await?;
        assert_eq!(detail, first);
        let product = catalog::require_product(&fx.db, fx.product.id).await?;
        assert_eq!(product.stock, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_fresh_allocation_over_stock_rejected() -> Result<()> {
        let fx = setup_with_variant(3).await?;

        let result = allocate_to_round(&fx, 4, 1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { available: 3, .. }
        ));
        assert!(find_allocation(&fx.db, fx.round.id, fx.variant.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_allocations_across_rounds_never_exceed_stock() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let second_round = create_open_round(&fx.db, "Second").await?;
        let settings = test_settings();

        allocate_to_round(&fx, 7, 2).await?;
        let result = create_or_increase_allocation(
            &fx.db,
            &settings,
            AllocationRequest {
                round_id: second_round.id,
                variant_id: fx.variant.id,
                quantity: 4,
                quantity_limit: 2,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::InsufficientStock { .. }));

        let detail = create_or_increase_allocation(
            &fx.db,
            &settings,
            AllocationRequest {
                round_id: second_round.id,
                variant_id: fx.variant.id,
                quantity: 3,
                quantity_limit: 2,
            },
        )
        .await?;
        assert_eq!(detail.product_stock, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_allocation_validation() -> Result<()> {
        let fx = setup_with_variant(10).await?;

        let result = allocate_to_round(&fx, 0, 1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: 0 }
        ));
        let result = allocate_to_round(&fx, 1, -1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: -1 }
        ));

        let result = create_or_increase_allocation(
            &fx.db,
            &test_settings(),
            AllocationRequest {
                round_id: 999,
                variant_id: fx.variant.id,
                quantity: 1,
                quantity_limit: 1,
            },
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound {
                entity: "SalesRound",
                ..
            }
        ));

        let result = create_or_increase_allocation(
            &fx.db,
            &test_settings(),
            AllocationRequest {
                round_id: fx.round.id,
                variant_id: 999,
                quantity: 1,
                quantity_limit: 1,
            },
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound {
                entity: "ProductVariant",
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_allocation_to_ended_round_rejected() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let now = Utc::now();
        let ended = round::create_sales_round(
            &fx.db,
            "Last Week".to_string(),
            now - Duration::days(8),
            now - Duration::days(1),
        )
        .await?;

        let request = AllocationRequest {
            round_id: ended.id,
            variant_id: fx.variant.id,
            quantity: 2,
            quantity_limit: 1,
        };
        let result = create_or_increase_allocation(&fx.db, &test_settings(), request).await;
        assert!(matches!(result.unwrap_err(), Error::RoundClosed { .. }));

        let lenient = PurchaseSettings {
            enforce_round_window: false,
            ..test_settings()
        };
        let detail = create_or_increase_allocation(&fx.db, &lenient, request).await?;
        assert_eq!(detail.quantity, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_allocation_lookups() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 2, 1).await?;

        assert_eq!(get_allocation(&fx.db, fx.round.id, fx.variant.id).await?, detail);
        assert_eq!(get_allocation_by_id(&fx.db, detail.id).await?, detail);

        let result = get_allocation(&fx.db, fx.round.id, 999).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        let result = get_allocation_by_id(&fx.db, 999).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_quantity_returns_stock() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 6, 3).await?;

        let updated = set_allocation_quantity(&fx.db, &test_settings(), detail.id, 2).await?;
        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.remaining, 2);
        assert_eq!(updated.product_stock, 8);

        let product = catalog::require_product(&fx.db, fx.product.id).await?;
        assert_eq!(product.stock, 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_quantity_draws_more_stock() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 6, 3).await?;

        let updated = set_allocation_quantity(&fx.db, &test_settings(), detail.id, 9).await?;
        assert_eq!(updated.quantity, 9);
        assert_eq!(updated.remaining, 9);
        assert_eq!(updated.product_stock, 1);

        // 1 on hand, 2 more requested
        let result = set_allocation_quantity(&fx.db, &test_settings(), detail.id, 11).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(get_allocation_by_id(&fx.db, detail.id).await?, updated);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_quantity_cannot_unsell_units() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 6, 3).await?;
        purchase(&fx, &[(fx.variant.id, 3)]).await?;

        // 3 sold, so the allocation cannot shrink below 3
        let result = set_allocation_quantity(&fx.db, &test_settings(), detail.id, 2).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));

        let updated = set_allocation_quantity(&fx.db, &test_settings(), detail.id, 3).await?;
        assert_eq!(updated.quantity, 3);
        assert_eq!(updated.remaining, 0);
        assert_eq!(updated.product_stock, 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_quantity_rejects_negative() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 6, 3).await?;

        let result = set_allocation_quantity(&fx.db, &test_settings(), detail.id, -1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: -1 }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_allocation_restocks_unsold_units() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 6, 3).await?;
        purchase(&fx, &[(fx.variant.id, 2)]).await?;

        let product = delete_allocation(&fx.db, &test_settings(), detail.id).await?;
        // 4 on hand + 4 unsold returned
        assert_eq!(product.stock, 8);
        assert!(find_allocation(&fx.db, fx.round.id, fx.variant.id).await?.is_none());

        let result = delete_allocation(&fx.db, &test_settings(), detail.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_allocations_joins_display_fields() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let second =
            catalog::create_variant(&fx.db, fx.product.id, "SKU-LARGE".to_string(), 30.0, String::new())
                .await?;
        allocate_to_round(&fx, 4, 2).await?;
        create_or_increase_allocation(
            &fx.db,
            &test_settings(),
            AllocationRequest {
                round_id: fx.round.id,
                variant_id: second.id,
                quantity: 3,
                quantity_limit: 1,
            },
        )
        .await?;

        let views = list_allocations_for_round(&fx.db, fx.round.id).await?;
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].sku_code, fx.variant.sku_code);
        assert_eq!(views[0].variant_price, fx.variant.price);
        assert_eq!(views[1].sku_code, "SKU-LARGE");
        assert_eq!(views[1].variant_price, 30.0);
        for view in &views {
            assert_eq!(view.product_id, fx.product.id);
            assert_eq!(view.product_name, fx.product.name);
            assert_eq!(view.currency, "USD");
            assert_eq!(view.stock, 3);
        }

        let result = list_allocations_for_round(&fx.db, 999).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_guard_reports_current_remaining() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let detail = allocate_to_round(&fx, 2, 2).await?;

        let after = consume_allocation_atomic(&fx.db, &detail, 2, 8).await?;
        assert_eq!(after.remaining, 0);

        let result = consume_allocation_atomic(&fx.db, &detail, 1, 8).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock {
                requested: 1,
                available: 0,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_share_stock_exactly() -> Result<()> {
        let (_dir, fx) = setup_file_with_variant(10).await?;
        let request = AllocationRequest {
            round_id: fx.round.id,
            variant_id: fx.variant.id,
            quantity: 2,
            quantity_limit: 2,
        };
        let product_id = fx.product.id;
        let db = Arc::new(fx.db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                tokio::spawn(async move {
                    let settings = test_settings();
                    create_or_increase_allocation(&db, &settings, request).await
                })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(e) => assert!(matches!(e, Error::InsufficientStock { .. }), "{e}"),
            }
        }
        assert_eq!(granted, 5);

        let detail = get_allocation(&*db, request.round_id, request.variant_id).await?;
        assert_eq!(detail.quantity, 10);
        assert_eq!(detail.remaining, 10);
        let product = catalog::require_product(&*db, product_id).await?;
        assert_eq!(product.stock, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_claiming_allocations_leaves_counters_alone() -> Result<()> {
        let fx = setup_with_variant(10).await?;
        let before = allocate_to_round(&fx, 6, 3).await?;

        let txn = fx.db.begin().await?;
        claim_allocations(&txn, fx.round.id, &[fx.variant.id, 999]).await?;
        claim_product_for_variant(&txn, fx.variant.id).await?;
        txn.commit().await?;

        let after = get_allocation(&fx.db, fx.round.id, fx.variant.id).await?;
        assert_eq!(after, before);
        let product = catalog::require_product(&fx.db, fx.product.id).await?;
        assert_eq!(product.stock, 4);
        Ok(())
    }
}
