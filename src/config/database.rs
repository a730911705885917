//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The allocation ledger additionally gets a
//! unique index on `(round_id, variant_id)`, which is what makes "one row per pair" hold under
//! concurrent allocation requests.

use crate::config::settings::DatabaseSettings;
use crate::entities::{
    Category, Customer, Order, OrderDetail, OrderHistory, Product, ProductVariant, SalesRound,
    SalesRoundDetail, SalesRoundDetailColumn, Store,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default database location when neither `DATABASE_URL` nor `config.toml` provide one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace.sqlite?mode=rwc";

/// Name of the unique index backing the one-allocation-per-(round, variant) rule.
pub const ALLOCATION_PAIR_INDEX: &str = "idx_sales_round_details_round_variant";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to the
/// configured value.
#[must_use]
pub fn get_database_url(settings: &DatabaseSettings) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| settings.url.clone())
}

/// Opens a connection pool sized and time-bounded by `settings`.
///
/// The acquire timeout bounds how long a request waits for a connection; running out of it
/// surfaces as a retryable `Contention` error rather than blocking indefinitely.
#[instrument(skip(settings))]
pub async fn create_connection(settings: &DatabaseSettings) -> Result<DatabaseConnection> {
    let url = get_database_url(settings);
    debug!("Connecting to database at {}", url);

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .sqlx_logging(false);

    Database::connect(options).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables (if missing) plus the ledger's unique pair index.
///
/// Tables are created parents-first so foreign keys always point at an existing table.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Store).await?;
    create_table(db, &schema, Category).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, ProductVariant).await?;
    create_table(db, &schema, Customer).await?;
    create_table(db, &schema, SalesRound).await?;
    create_table(db, &schema, SalesRoundDetail).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderDetail).await?;
    create_table(db, &schema, OrderHistory).await?;

    let pair_index = Index::create()
        .name(ALLOCATION_PAIR_INDEX)
        .table(SalesRoundDetail)
        .col(SalesRoundDetailColumn::RoundId)
        .col(SalesRoundDetailColumn::VariantId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&pair_index)).await?;

    info!("Database schema is ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ProductModel, SalesRoundDetailModel, SalesRoundModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<ProductModel> = Product::find().limit(1).all(&db).await?;
        let _: Vec<SalesRoundModel> = SalesRound::find().limit(1).all(&db).await?;
        let _: Vec<SalesRoundDetailModel> = SalesRoundDetail::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
