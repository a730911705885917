//! Product entity - A sellable item and its global on-hand stock.
//!
//! `stock` is the shared counter that allocation creation, allocation edits and allocation
//! deletion all adjust. It never goes below zero: every decrement is a guarded update.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Store listing this product
    pub store_id: i64,
    /// Category the product is filed under
    pub category_id: i64,
    /// Product name (e.g., "Espresso Beans 1kg")
    pub name: String,
    /// Brand name
    pub brand: String,
    /// Long description, may be empty
    pub description: String,
    /// ISO 4217 currency code for `price`
    pub currency: String,
    /// Global on-hand quantity not yet carved into any sales round
    pub stock: i32,
    /// Base unit price
    pub price: f64,
    /// Image reference (URL or key), may be empty
    pub image_url: String,
    /// Soft delete flag - if true, product is hidden but data is preserved
    pub is_deleted: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one store
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
    /// Each product belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// One product has many variants
    #[sea_orm(has_many = "super::product_variant::Entity")]
    Variants,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
