//! Sales round business logic - the time windows allocations and purchases belong to.

use crate::{
    entities::{SalesRound, sales_round},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};

fn validate_round(name: &str, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Sales round name cannot be empty".to_string(),
        });
    }
    if end_date <= start_date {
        return Err(Error::Config {
            message: format!("Sales round must end after it starts ({start_date} >= {end_date})"),
        });
    }
    Ok(())
}

/// Creates a new sales round.
///
/// # Errors
/// Returns an error if the name is empty, the window is empty or inverted, or the insert fails.
pub async fn create_sales_round(
    db: &DatabaseConnection,
    name: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<sales_round::Model> {
    validate_round(&name, start_date, end_date)?;

    let now = Utc::now().naive_utc();
    let round = sales_round::ActiveModel {
        name: Set(name.trim().to_string()),
        start_date: Set(start_date),
        end_date: Set(end_date),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    round.insert(db).await.map_err(Into::into)
}

/// Retrieves an active sales round by id.
pub async fn get_round_by_id<C>(db: &C, round_id: i64) -> Result<Option<sales_round::Model>>
where
    C: ConnectionTrait,
{
    SalesRound::find_by_id(round_id)
        .filter(sales_round::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an active sales round or fails with `NotFound`.
pub async fn require_round<C>(db: &C, round_id: i64) -> Result<sales_round::Model>
where
    C: ConnectionTrait,
{
    get_round_by_id(db, round_id)
        .await?
        .ok_or_else(|| Error::not_found("SalesRound", round_id))
}

/// Lists active rounds, earliest start first.
pub async fn list_sales_rounds(db: &DatabaseConnection) -> Result<Vec<sales_round::Model>> {
    SalesRound::find()
        .filter(sales_round::Column::IsDeleted.eq(false))
        .order_by_asc(sales_round::Column::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames a round and/or moves its window.
pub async fn update_sales_round(
    db: &DatabaseConnection,
    round_id: i64,
    name: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<sales_round::Model> {
    validate_round(&name, start_date, end_date)?;

    let mut round: sales_round::ActiveModel = require_round(db, round_id).await?.into();
    round.name = Set(name.trim().to_string());
    round.start_date = Set(start_date);
    round.end_date = Set(end_date);
    round.updated_at = Set(Utc::now().naive_utc());
    round.update(db).await.map_err(Into::into)
}

/// Soft deletes a round. Its allocations and orders stay in place for auditing.
pub async fn delete_sales_round(db: &DatabaseConnection, round_id: i64) -> Result<sales_round::Model> {
    let mut round: sales_round::ActiveModel = require_round(db, round_id).await?.into();
    round.is_deleted = Set(true);
    round.updated_at = Set(Utc::now().naive_utc());
    round.update(db).await.map_err(Into::into)
}

/// Whether `now` falls inside the round's `[start_date, end_date]` window.
#[must_use]
pub fn is_round_open(round: &sales_round::Model, now: DateTime<Utc>) -> bool {
    round.start_date <= now && now <= round.end_date
}

/// Fails with `RoundClosed` unless purchases are currently accepted.
pub fn ensure_round_open(round: &sales_round::Model, now: DateTime<Utc>) -> Result<()> {
    if is_round_open(round, now) {
        Ok(())
    } else {
        Err(Error::RoundClosed { round_id: round.id })
    }
}

/// Fails with `RoundClosed` once the round is over. Allocations may be made before it opens.
pub fn ensure_round_not_ended(round: &sales_round::Model, now: DateTime<Utc>) -> Result<()> {
    if now <= round.end_date {
        Ok(())
    } else {
        Err(Error::RoundClosed { round_id: round.id })
    }
}
