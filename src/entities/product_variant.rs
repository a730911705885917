//! Product variant entity - The unit that is allocated to rounds and purchased.
//!
//! Each variant has a unique SKU and its own price, which overrides the product's base
//! price at purchase time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product variant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    /// Unique identifier for the variant
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent product; stock is tracked there
    pub product_id: i64,
    /// Stock keeping unit, unique across all variants
    #[sea_orm(unique)]
    pub sku_code: String,
    /// Unit price charged for this variant
    pub price: f64,
    /// Image reference, may be empty
    pub image_url: String,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the variant was created
    pub created_at: DateTime,
    /// When the variant was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between `ProductVariant` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each variant belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// A variant can be allocated to many rounds
    #[sea_orm(has_many = "super::sales_round_detail::Entity")]
    Allocations,
    /// A variant appears on many order lines
    #[sea_orm(has_many = "super::order_detail::Entity")]
    OrderDetails,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::sales_round_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::order_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
