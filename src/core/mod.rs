//! Core business logic - framework-agnostic catalog, ledger, purchase and reporting operations.
//!
//! Every function takes a database handle and returns structured data; nothing here knows
//! about a transport layer.

use crate::errors::{Error, Result};
use sea_orm::DatabaseTransaction;
use std::{future::Future, time::Duration};
use tracing::warn;

/// Stores, categories, products, variants and the product stock primitives
pub mod catalog;
/// Customers who place orders
pub mod customer;
/// Round allocation ledger
pub mod ledger;
/// Orders, order lines and status history
pub mod order;
/// Purchase engine
pub mod purchase;
/// Sales round metrics
pub mod report;
/// Sales rounds and their time windows
pub mod round;

/// Runs `fut` under an upper time bound, mapping an elapsed bound to [`Error::Contention`].
///
/// Dropping the future on timeout drops any open transaction inside it, which rolls it back.
pub(crate) async fn with_lock_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Ok(result) = tokio::time::timeout(timeout, fut).await {
        result
    } else {
        warn!("{} did not finish within {:?}", operation, timeout);
        Err(Error::Contention {
            message: format!("{operation} timed out after {timeout:?} waiting on locks"),
        })
    }
}

/// Runs the pre-commit part of a transaction under `timeout`, then commits outside the bound.
///
/// `prepare` returns its open transaction together with the value to hand back. A deadline
/// that elapses while `prepare` waits on locks rolls everything back; once `prepare` is done
/// the commit always runs to completion, so a `Contention` result never hides a committed
/// write.
pub(crate) async fn commit_within<T, F>(
    timeout: Duration,
    operation: &'static str,
    prepare: F,
) -> Result<T>
where
    F: Future<Output = Result<(DatabaseTransaction, T)>>,
{
    let (txn, value) = with_lock_timeout(timeout, operation, prepare).await?;
    txn.commit().await?;
    Ok(value)
}
