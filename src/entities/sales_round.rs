//! Sales round entity - A time-boxed window in which allocated stock is sold.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sales round database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_rounds")]
pub struct Model {
    /// Unique identifier for the round
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable round name (e.g., "Spring Drop")
    pub name: String,
    /// First instant purchases are accepted
    pub start_date: DateTimeUtc,
    /// Last instant purchases are accepted
    pub end_date: DateTimeUtc,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the round was created
    pub created_at: DateTime,
    /// When the round was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between `SalesRound` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One round has many allocation rows
    #[sea_orm(has_many = "super::sales_round_detail::Entity")]
    Allocations,
    /// One round has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::sales_round_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
