//! Order entity - A committed purchase.
//!
//! Orders are only ever written together with all of their `order_detail` rows, inside the
//! purchase transaction. `status` is free text; `"completed"` is set on creation and
//! `"paid"` is the value revenue metrics recognize.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer who placed the order
    pub customer_id: i64,
    /// Sales round the order was placed in
    pub round_id: i64,
    /// When the purchase was committed
    pub order_date: DateTimeUtc,
    /// Current status (e.g., `"completed"`, `"paid"`, `"shipped"`)
    pub status: String,
    /// Human-readable order code
    pub code: String,
    /// Sum of the line totals
    pub total_price: f64,
    /// Opaque delivery address, copied through from the request
    pub delivery_address: String,
    /// Opaque payment source, copied through from the request
    pub payment_source: String,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the order row was created
    pub created_at: DateTime,
    /// When the order row was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order is placed by one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// Each order belongs to one round
    #[sea_orm(
        belongs_to = "super::sales_round::Entity",
        from = "Column::RoundId",
        to = "super::sales_round::Column::Id"
    )]
    SalesRound,
    /// One order owns many line items
    #[sea_orm(has_many = "super::order_detail::Entity")]
    Details,
    /// One order has many status history entries
    #[sea_orm(has_many = "super::order_history::Entity")]
    History,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::sales_round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesRound.def()
    }
}

impl Related<super::order_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Details.def()
    }
}

impl Related<super::order_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
