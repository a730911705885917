//! Sales round metrics.
//!
//! This module aggregates the orders and allocations of a round into revenue and sell-through
//! figures. All functions are read-only and return structured data for a transport layer
//! to format.

use crate::{
    core::{
        ledger,
        order::{self as orders, ORDER_STATUS_PAID},
        round,
    },
    entities::{OrderDetail, order, order_detail, sales_round},
    errors::Result,
};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;

/// Aggregated figures for one sales round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    /// The round being reported on
    pub round: sales_round::Model,
    /// Number of orders placed in the round, whatever their status
    pub total_orders: u64,
    /// Sum of order totals over `paid` orders
    pub recognized_revenue: f64,
    /// Units across all orders
    pub items_ordered: i64,
    /// Units across `paid` orders
    pub items_sold: i64,
    /// Units allocated to the round across all variants
    pub allocated_units: i64,
    /// Allocated units not yet purchased
    pub remaining_units: i64,
    /// Share of the allocation that has been purchased, as a percentage (0-100)
    pub sell_through_percent: f64,
}

fn is_paid(order: &order::Model) -> bool {
    order.status == ORDER_STATUS_PAID
}

async fn details_for_orders(
    db: &DatabaseConnection,
    orders: &[order::Model],
) -> Result<Vec<order_detail::Model>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    OrderDetail::find()
        .filter(order_detail::Column::OrderId.is_in(ids))
        .all(db)
        .await
        .map_err(Into::into)
}

fn sum_units(details: &[order_detail::Model]) -> i64 {
    details.iter().map(|d| i64::from(d.quantity)).sum()
}

/// Sum of order totals over the round's `paid` orders.
pub async fn get_recognized_revenue(db: &DatabaseConnection, round_id: i64) -> Result<f64> {
    let orders = orders::list_orders_for_round(db, round_id).await?;
    Ok(orders
        .iter()
        .filter(|o| is_paid(o))
        .map(|o| o.total_price)
        .sum())
}

/// Number of orders placed in the round.
pub async fn get_total_orders(db: &DatabaseConnection, round_id: i64) -> Result<u64> {
    let orders = orders::list_orders_for_round(db, round_id).await?;
    Ok(orders.len() as u64)
}

/// Units across all of the round's orders.
pub async fn get_total_items_ordered(db: &DatabaseConnection, round_id: i64) -> Result<i64> {
    let orders = orders::list_orders_for_round(db, round_id).await?;
    let details = details_for_orders(db, &orders).await?;
    Ok(sum_units(&details))
}

/// Units across the round's `paid` orders.
pub async fn get_total_items_sold(db: &DatabaseConnection, round_id: i64) -> Result<i64> {
    let paid: Vec<order::Model> = orders::list_orders_for_round(db, round_id)
        .await?
        .into_iter()
        .filter(is_paid)
        .collect();
    let details = details_for_orders(db, &paid).await?;
    Ok(sum_units(&details))
}

/// Generates the full summary for a round.
///
/// # Errors
/// Returns `NotFound` if the round does not exist.
pub async fn generate_round_summary(
    db: &DatabaseConnection,
    round_id: i64,
) -> Result<RoundSummary> {
    let round = round::require_round(db, round_id).await?;

    let orders = orders::list_orders_for_round(db, round_id).await?;
    let details = details_for_orders(db, &orders).await?;
    let paid_ids: Vec<i64> = orders.iter().filter(|o| is_paid(o)).map(|o| o.id).collect();
    let paid_details: Vec<order_detail::Model> = details
        .iter()
        .filter(|d| paid_ids.contains(&d.order_id))
        .cloned()
        .collect();

    let allocations = ledger::list_allocations_for_round(db, round_id).await?;
    let allocated_units: i64 = allocations
        .iter()
        .map(|a| i64::from(a.allocation.quantity))
        .sum();
    let remaining_units: i64 = allocations
        .iter()
        .map(|a| i64::from(a.allocation.remaining))
        .sum();

    Ok(RoundSummary {
        round,
        total_orders: orders.len() as u64,
        recognized_revenue: orders.iter().filter(|o| is_paid(o)).map(|o| o.total_price).sum(),
        items_ordered: sum_units(&details),
        items_sold: sum_units(&paid_details),
        allocated_units,
        remaining_units,
        sell_through_percent: calculate_sell_through(allocated_units - remaining_units, allocated_units),
    })
}

/// Calculates the purchased share of an allocation as a percentage.
///
/// Returns 0 for an empty allocation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_sell_through(purchased: i64, allocated: i64) -> f64 {
    if allocated == 0 {
        return 0.0;
    }

    (purchased as f64 / allocated as f64) * 100.0
}

/// Describes how much of an allocation has been purchased, e.g. `5/8 units purchased (62.5%)`.
///
/// An empty allocation reads `nothing allocated`.
#[must_use]
pub fn format_sell_through(purchased: i64, allocated: i64) -> String {
    if allocated == 0 {
        return "nothing allocated".to_string();
    }
    format!(
        "{purchased}/{allocated} units purchased ({:.1}%)",
        calculate_sell_through(purchased, allocated)
    )
}

/// Formats a round summary as a single log-friendly line.
#[must_use]
pub fn format_round_summary(summary: &RoundSummary) -> String {
    format!(
        "{} | {} orders | {} ordered, {} sold | revenue {:.2} | {}, {} left",
        summary.round.name,
        summary.total_orders,
        summary.items_ordered,
        summary.items_sold,
        summary.recognized_revenue,
        format_sell_through(
            summary.allocated_units - summary.remaining_units,
            summary.allocated_units
        ),
        summary.remaining_units
    )
}
