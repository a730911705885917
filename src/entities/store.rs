//! Store entity - A tenant of the marketplace that lists products.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    /// Unique identifier for the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the store
    pub name: String,
    /// Free-form location text
    pub location: String,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the store was created
    pub created_at: DateTime,
    /// When the store was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Store and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One store has many categories
    #[sea_orm(has_many = "super::category::Entity")]
    Categories,
    /// One store has many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
