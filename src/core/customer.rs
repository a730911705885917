//! Customer records. Plain create/read/update/soft-delete; the purchase engine only needs to know
//! that the buyer exists.

use crate::{
    entities::{Customer, customer},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};

/// Validates a customer's name and returns the normalized email.
fn validate_customer(name: &str, email: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Customer name cannot be empty".to_string(),
        });
    }
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::Config {
            message: format!("Invalid email address: {email}"),
        });
    }
    Ok(email)
}

async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<customer::Model>> {
    Customer::find()
        .filter(customer::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a customer. Emails are unique, compared case-insensitively.
pub async fn create_customer(
    db: &DatabaseConnection,
    name: String,
    email: String,
) -> Result<customer::Model> {
    let email = validate_customer(&name, &email)?;
    if find_by_email(db, &email).await?.is_some() {
        return Err(Error::AlreadyExists {
            entity: "Customer",
            key: email,
        });
    }

    let now = Utc::now().naive_utc();
    let customer = customer::ActiveModel {
        name: Set(name.trim().to_string()),
        email: Set(email),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    customer.insert(db).await.map_err(Into::into)
}

/// Updates a customer's name and email.
///
/// # Errors
/// Returns `AlreadyExists` if another customer already uses the email.
pub async fn update_customer(
    db: &DatabaseConnection,
    customer_id: i64,
    name: String,
    email: String,
) -> Result<customer::Model> {
    let email = validate_customer(&name, &email)?;
    let existing = require_customer(db, customer_id).await?;
    let taken = find_by_email(db, &email).await?;
    if taken.is_some_and(|other| other.id != existing.id) {
        return Err(Error::AlreadyExists {
            entity: "Customer",
            key: email,
        });
    }

    let mut customer: customer::ActiveModel = existing.into();
    customer.name = Set(name.trim().to_string());
    customer.email = Set(email);
    customer.updated_at = Set(Utc::now().naive_utc());
    customer.update(db).await.map_err(Into::into)
}

/// Retrieves an active customer by id.
pub async fn get_customer_by_id<C>(db: &C, customer_id: i64) -> Result<Option<customer::Model>>
where
    C: ConnectionTrait,
{
    Customer::find_by_id(customer_id)
        .filter(customer::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an active customer or fails with `NotFound`.
pub async fn require_customer<C>(db: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    get_customer_by_id(db, customer_id)
        .await?
        .ok_or_else(|| Error::not_found("Customer", customer_id))
}

/// Lists active customers by name.
pub async fn list_active_customers(db: &DatabaseConnection) -> Result<Vec<customer::Model>> {
    Customer::find()
        .filter(customer::Column::IsDeleted.eq(false))
        .order_by_asc(customer::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Soft deletes a customer; their orders remain.
pub async fn delete_customer(db: &DatabaseConnection, customer_id: i64) -> Result<customer::Model> {
    let mut customer: customer::ActiveModel = require_customer(db, customer_id).await?.into();
    customer.is_deleted = Set(true);
    customer.updated_at = Set(Utc::now().naive_utc());
    customer.update(db).await.map_err(Into::into)
}
