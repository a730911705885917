//! Order journal business logic.
//!
//! Orders and their lines are written only by the purchase engine. This module reads them
//! back, moves orders through their status lifecycle and keeps the status history.

use crate::{
    entities::{Order, OrderDetail, OrderHistory, order, order_detail, order_history},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::info;

/// Status set on every order when the purchase commits.
pub const ORDER_STATUS_COMPLETED: &str = "completed";
/// Status that revenue metrics recognize.
pub const ORDER_STATUS_PAID: &str = "paid";

/// An order together with its line items, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedOrder {
    /// The order row
    pub order: order::Model,
    /// One row per purchased line item
    pub details: Vec<order_detail::Model>,
}

impl PlacedOrder {
    /// Total units across all line items.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.details.iter().map(|d| i64::from(d.quantity)).sum()
    }
}

/// Retrieves an active order by id.
pub async fn get_order_by_id<C>(db: &C, order_id: i64) -> Result<Option<order::Model>>
where
    C: ConnectionTrait,
{
    let order = Order::find_by_id(order_id)
        .filter(order::Column::IsDeleted.eq(false))
        .one(db)
        .await?;
    Ok(order)
}

async fn require_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    get_order_by_id(db, order_id)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))
}

/// Retrieves the line items of an order in insertion order.
pub async fn get_order_details<C>(db: &C, order_id: i64) -> Result<Vec<order_detail::Model>>
where
    C: ConnectionTrait,
{
    OrderDetail::find()
        .filter(order_detail::Column::OrderId.eq(order_id))
        .order_by_asc(order_detail::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an order with all of its line items.
///
/// # Errors
/// Returns `NotFound` if the order does not exist or was deleted.
pub async fn get_order_with_details(db: &DatabaseConnection, order_id: i64) -> Result<PlacedOrder> {
    let order = require_order(db, order_id).await?;
    let details = get_order_details(db, order_id).await?;
    Ok(PlacedOrder { order, details })
}

/// Lists a customer's orders, newest first.
pub async fn list_orders_for_customer(
    db: &DatabaseConnection,
    customer_id: i64,
) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::CustomerId.eq(customer_id))
        .filter(order::Column::IsDeleted.eq(false))
        .order_by_desc(order::Column::OrderDate)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists all orders placed in a sales round, oldest first.
pub async fn list_orders_for_round(
    db: &DatabaseConnection,
    round_id: i64,
) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::RoundId.eq(round_id))
        .filter(order::Column::IsDeleted.eq(false))
        .order_by_asc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Appends a status history entry for an order.
pub async fn record_order_history<C>(
    db: &C,
    order_id: i64,
    status: &str,
    description: &str,
) -> Result<order_history::Model>
where
    C: ConnectionTrait,
{
    let entry = order_history::ActiveModel {
        order_id: Set(order_id),
        status: Set(status.to_string()),
        changed_at: Set(Utc::now()),
        description: Set(description.to_string()),
        ..Default::default()
    };
    entry.insert(db).await.map_err(Into::into)
}

/// Moves an order to a new status and records the change, in one transaction.
///
/// # Errors
/// Returns `NotFound` if the order does not exist, or `Config` if the status is blank.
pub async fn update_order_status(
    db: &DatabaseConnection,
    order_id: i64,
    status: &str,
    description: &str,
) -> Result<order::Model> {
    let status = status.trim();
    if status.is_empty() {
        return Err(Error::Config {
            message: "Order status cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;
    let existing = require_order(&txn, order_id).await?;
    let previous = existing.status.clone();

    let mut order: order::ActiveModel = existing.into();
    order.status = Set(status.to_string());
    order.updated_at = Set(Utc::now().naive_utc());
    let order = order.update(&txn).await?;

    record_order_history(&txn, order_id, status, description).await?;
    txn.commit().await?;

    info!(
        "Order {} moved from '{}' to '{}'",
        order.code, previous, order.status
    );
    Ok(order)
}

/// Returns an order's status history, oldest first.
pub async fn get_order_history(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<order_history::Model>> {
    OrderHistory::find()
        .filter(order_history::Column::OrderId.eq(order_id))
        .order_by_asc(order_history::Column::ChangedAt)
        .order_by_asc(order_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Soft-deletes an order. Its allocation consumption is not reversed.
pub async fn delete_order(db: &DatabaseConnection, order_id: i64) -> Result<order::Model> {
    let mut order: order::ActiveModel = require_order(db, order_id).await?.into();
    order.is_deleted = Set(true);
    order.updated_at = Set(Utc::now().naive_utc());
    order.update(db).await.map_err(Into::into)
}
