//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Cross-entity links are plain id columns; related rows are fetched with explicit lookups.

pub mod category;
pub mod customer;
pub mod order;
pub mod order_detail;
pub mod order_history;
pub mod product;
pub mod product_variant;
pub mod sales_round;
pub mod sales_round_detail;
pub mod store;

// Re-export specific types to avoid conflicts
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use customer::{Column as CustomerColumn, Entity as Customer, Model as CustomerModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_detail::{
    Column as OrderDetailColumn, Entity as OrderDetail, Model as OrderDetailModel,
};
pub use order_history::{
    Column as OrderHistoryColumn, Entity as OrderHistory, Model as OrderHistoryModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_variant::{
    Column as ProductVariantColumn, Entity as ProductVariant, Model as ProductVariantModel,
};
pub use sales_round::{Column as SalesRoundColumn, Entity as SalesRound, Model as SalesRoundModel};
pub use sales_round_detail::{
    Column as SalesRoundDetailColumn, Entity as SalesRoundDetail, Model as SalesRoundDetailModel,
};
pub use store::{Column as StoreColumn, Entity as Store, Model as StoreModel};
