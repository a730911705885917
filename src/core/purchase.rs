//! Purchase engine - turns a multi-line purchase request into one committed order.
//!
//! A purchase has two outcomes only. Either every line is checked and every allocation it
//! draws from is decremented, and the order and all of its lines are written, or nothing is
//! written at all. All checks run before the first write, inside the same transaction that
//! performs the writes. The writes themselves are guarded updates, so a concurrent purchase
//! that consumed the same units in between still cannot drive a counter negative.
//!
//! The transaction opens by claiming the write lock on the touched allocation rows, so
//! concurrent buyers of the same variant queue up behind each other. Only the work before
//! the commit is bounded by the lock timeout; the commit itself always runs to completion.

use crate::{
    config::settings::PurchaseSettings,
    core::{
        catalog, customer,
        ledger::{self, consume_allocation_atomic},
        order::{ORDER_STATUS_COMPLETED, PlacedOrder},
        commit_within, round,
    },
    entities::{order, order_detail, product, product_variant, sales_round_detail},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseTransaction, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// One `(variant, quantity)` pair of a purchase request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Variant being bought
    pub variant_id: i64,
    /// Units requested
    pub quantity: i32,
}

/// A customer's request to buy several variants in one sales round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Customer placing the order
    pub customer_id: i64,
    /// Round whose allocations are consumed
    pub round_id: i64,
    /// Copied onto the order as-is
    pub delivery_address: String,
    /// Copied onto the order as-is
    pub payment_source: String,
    /// Line items, in the order their details are written
    pub items: Vec<LineItem>,
}

/// A line item that passed every check, with the rows it was checked against.
#[derive(Debug)]
struct ValidatedLine {
    variant: product_variant::Model,
    product: product::Model,
    allocation: sales_round_detail::Model,
    quantity: i32,
}

impl ValidatedLine {
    fn line_total(&self) -> f64 {
        self.variant.price * f64::from(self.quantity)
    }
}

/// Builds a human-readable order code such as `ORDER-3f0c…`.
#[must_use]
pub fn generate_order_code(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Executes a purchase as a single pass/fail unit.
///
/// Line items are checked in request order and the first failure wins. For each line:
/// the quantity must be positive, the variant and its product must exist, the variant must
/// have an allocation in the round, the allocation's `remaining` must cover the quantity
/// (together with earlier lines for the same variant), and the quantity must not exceed the
/// allocation's per-line limit.
///
/// When every line passes, allocation counters are decremented in ascending variant id
/// order, and the order (status `completed`) plus one detail row per line item are written
/// with the variant's current price as the unit price snapshot.
///
/// # Errors
/// - `EmptyPurchase` if there are no line items
/// - `InvalidQuantity` if a line's quantity is not positive
/// - `NotFound` if the round, customer, variant or product does not exist
/// - `RoundClosed` if round windows are enforced and the round is not open right now
/// - `AllocationNotFound` if a variant was never allocated to the round
/// - `InsufficientStock` if a line asks for more than the allocation has left
/// - `LimitExceeded` if a line asks for more than the allocation's per-line limit
/// - `Contention` if locks could not be acquired within the configured bound
/// - `Database` if a write fails after validation; nothing is persisted in that case either
#[instrument(
    skip(db, settings, request),
    fields(
        customer_id = request.customer_id,
        round_id = request.round_id,
        items = request.items.len()
    )
)]
pub async fn execute_purchase(
    db: &DatabaseConnection,
    settings: &PurchaseSettings,
    request: &PurchaseRequest,
) -> Result<PlacedOrder> {
    if request.items.is_empty() {
        warn!("Purchase rejected: no line items");
        return Err(Error::EmptyPurchase);
    }

    let result = commit_within(
        settings.lock_timeout(),
        "purchase",
        prepare_order(db, settings, request),
    )
    .await;

    match &result {
        Ok(placed) => info!(
            "Order {} committed: {} lines, {} units, total {:.2}",
            placed.order.code,
            placed.details.len(),
            placed.item_count(),
            placed.order.total_price
        ),
        Err(e @ Error::Database(_)) => error!("Purchase failed in storage: {}", e),
        Err(e) => warn!("Purchase rejected: {}", e),
    }
    result
}

async fn prepare_order(
    db: &DatabaseConnection,
    settings: &PurchaseSettings,
    request: &PurchaseRequest,
) -> Result<(DatabaseTransaction, PlacedOrder)> {
    let mut variant_ids: Vec<i64> = request.items.iter().map(|i| i.variant_id).collect();
    variant_ids.sort_unstable();
    variant_ids.dedup();

    let txn = db.begin().await?;
    ledger::claim_allocations(&txn, request.round_id, &variant_ids).await?;

    let round = round::require_round(&txn, request.round_id).await?;
    if settings.enforce_round_window {
        round::ensure_round_open(&round, Utc::now())?;
    }
    customer::require_customer(&txn, request.customer_id).await?;

    let lines = validate_lines(&txn, request).await?;
    consume_allocations(&txn, &lines).await?;

    let placed = write_order(&txn, settings, request, &lines).await?;
    Ok((txn, placed))
}

/// Runs every per-line check. Performs no writes.
async fn validate_lines(
    txn: &DatabaseTransaction,
    request: &PurchaseRequest,
) -> Result<Vec<ValidatedLine>> {
    let mut claimed: HashMap<i64, i32> = HashMap::new();
    let mut lines = Vec::with_capacity(request.items.len());

    for item in &request.items {
        if item.quantity <= 0 {
            return Err(Error::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let variant = catalog::require_variant(txn, item.variant_id).await?;
        let product = catalog::require_product(txn, variant.product_id).await?;
        let allocation = ledger::find_allocation(txn, request.round_id, item.variant_id)
            .await?
            .ok_or(Error::AllocationNotFound {
                round_id: request.round_id,
                variant_id: item.variant_id,
            })?;

        let already_claimed = claimed.get(&item.variant_id).copied().unwrap_or(0);
        let available = allocation.remaining - already_claimed;
        if item.quantity > available {
            return Err(Error::InsufficientStock {
                variant_id: item.variant_id,
                requested: item.quantity,
                available,
            });
        }
        if item.quantity > allocation.quantity_limit {
            return Err(Error::LimitExceeded {
                variant_id: item.variant_id,
                requested: item.quantity,
                limit: allocation.quantity_limit,
            });
        }

        *claimed.entry(item.variant_id).or_insert(0) += item.quantity;
        lines.push(ValidatedLine {
            variant,
            product,
            allocation,
            quantity: item.quantity,
        });
    }

    Ok(lines)
}

/// Decrements each touched allocation once, in ascending variant id order.
async fn consume_allocations(txn: &DatabaseTransaction, lines: &[ValidatedLine]) -> Result<()> {
    let mut per_variant: BTreeMap<i64, (&ValidatedLine, i32)> = BTreeMap::new();
    for line in lines {
        per_variant
            .entry(line.variant.id)
            .and_modify(|(_, total)| *total += line.quantity)
            .or_insert((line, line.quantity));
    }

    for (variant_id, (line, quantity)) in per_variant {
        let after =
            consume_allocation_atomic(txn, &line.allocation, quantity, line.product.stock).await?;
        debug!(
            "Consumed {} units of variant {} (remaining {})",
            quantity, variant_id, after.remaining
        );
    }
    Ok(())
}

async fn write_order(
    txn: &DatabaseTransaction,
    settings: &PurchaseSettings,
    request: &PurchaseRequest,
    lines: &[ValidatedLine],
) -> Result<PlacedOrder> {
    let now = Utc::now();
    let total_price: f64 = lines.iter().map(ValidatedLine::line_total).sum();

    let order = order::ActiveModel {
        customer_id: Set(request.customer_id),
        round_id: Set(request.round_id),
        order_date: Set(now),
        status: Set(ORDER_STATUS_COMPLETED.to_string()),
        code: Set(generate_order_code(&settings.order_code_prefix)),
        total_price: Set(total_price),
        delivery_address: Set(request.delivery_address.clone()),
        payment_source: Set(request.payment_source.clone()),
        is_deleted: Set(false),
        created_at: Set(now.naive_utc()),
        updated_at: Set(now.naive_utc()),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let mut details = Vec::with_capacity(lines.len());
    for line in lines {
        let detail = order_detail::ActiveModel {
            order_id: Set(order.id),
            variant_id: Set(line.variant.id),
            quantity: Set(line.quantity),
            price: Set(line.variant.price),
            total_price: Set(line.line_total()),
            created_at: Set(now.naive_utc()),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        details.push(detail);
    }

    Ok(PlacedOrder { order, details })
}
