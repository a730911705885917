//! Sales round detail entity - One row of the allocation ledger.
//!
//! A row sets aside part of a variant's product stock for one sales round. There is at
//! most one row per `(round_id, variant_id)` pair, enforced by a unique index created
//! alongside the table.
//!
//! Invariants maintained by `core::ledger` and `core::purchase`:
//! - `0 <= remaining <= quantity`
//! - `product_stock` equals the product's `stock` right after the mutation that last
//!   touched the row

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Allocation ledger database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_round_details")]
pub struct Model {
    /// Unique identifier for the allocation row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Round the stock is allocated to
    pub round_id: i64,
    /// Variant the stock is allocated for
    pub variant_id: i64,
    /// Units carved out of product stock for this round, cumulative over top-ups
    pub quantity: i32,
    /// Maximum units a single purchase line may take
    pub quantity_limit: i32,
    /// Allocated units not yet sold
    pub remaining: i32,
    /// Snapshot of the product's stock after the last ledger mutation
    pub product_stock: i32,
    /// When the allocation was created
    pub created_at: DateTime,
    /// When the allocation was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between `SalesRoundDetail` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each allocation belongs to one round
    #[sea_orm(
        belongs_to = "super::sales_round::Entity",
        from = "Column::RoundId",
        to = "super::sales_round::Column::Id"
    )]
    SalesRound,
    /// Each allocation is for one variant
    #[sea_orm(
        belongs_to = "super::product_variant::Entity",
        from = "Column::VariantId",
        to = "super::product_variant::Column::Id"
    )]
    ProductVariant,
}

impl Related<super::sales_round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesRound.def()
    }
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
