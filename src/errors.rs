//! Unified error types for the stock allocation and purchase engine.
//!
//! Business rejections carry enough context (which variant, which constraint) for a caller
//! to correct the request and retry. Storage failures are classified once, in the
//! `From<DbErr>` conversion, into retryable contention and fatal persistence failures.

use sea_orm::DbErr;
use thiserror::Error;

/// All errors surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A storage operation failed after validation passed
    #[error("Database error: {0}")]
    Database(DbErr),

    /// A referenced record does not exist (or is soft-deleted)
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier used for the lookup
        id: String,
    },

    /// A record with the same unique key already exists
    #[error("{entity} already exists: {key}")]
    AlreadyExists {
        /// Kind of record
        entity: &'static str,
        /// The conflicting key
        key: String,
    },

    /// The variant was never allocated to the round
    #[error("Variant {variant_id} has no allocation in sales round {round_id}")]
    AllocationNotFound {
        /// Sales round the purchase or lookup targeted
        round_id: i64,
        /// Variant without an allocation
        variant_id: i64,
    },

    /// Requested quantity exceeds what can be drawn from stock or from an allocation
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Variant whose counter would be overdrawn
        variant_id: i64,
        /// Units requested
        requested: i32,
        /// Units currently available
        available: i32,
    },

    /// Requested quantity exceeds the round's per-line cap
    #[error("Quantity {requested} for variant {variant_id} exceeds the round limit of {limit}")]
    LimitExceeded {
        /// Variant of the offending line item
        variant_id: i64,
        /// Units requested
        requested: i32,
        /// The allocation's `quantity_limit`
        limit: i32,
    },

    /// Quantity is zero or negative where a positive amount is required
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: i32,
    },

    /// Price is negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A purchase request without line items
    #[error("Purchase has no line items")]
    EmptyPurchase,

    /// The sales round is not accepting allocations or purchases right now
    #[error("Sales round {round_id} is not open")]
    RoundClosed {
        /// The closed round
        round_id: i64,
    },

    /// Lock wait or write race on a shared counter; the request can be retried as-is
    #[error("Contention on shared stock, retry the request: {message}")]
    Contention {
        /// Underlying cause
        message: String,
    },

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Substrings of driver messages that indicate lock contention rather than a broken store.
const CONTENTION_MARKERS: &[&str] = &[
    "database is locked",
    "database table is locked",
    "database is busy",
    "deadlock detected",
    "could not serialize access",
    "could not obtain lock",
    "lock wait timeout",
];

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if is_contention(&err) {
            Self::Contention {
                message: err.to_string(),
            }
        } else {
            Self::Database(err)
        }
    }
}

fn is_contention(err: &DbErr) -> bool {
    if matches!(err, DbErr::ConnectionAcquire(_)) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    CONTENTION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] keyed by a numeric id.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the same request may succeed if simply sent again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    /// HTTP-equivalent status for a transport layer to report.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AllocationNotFound { .. }
            | Self::InsufficientStock { .. }
            | Self::LimitExceeded { .. }
            | Self::InvalidQuantity { .. }
            | Self::InvalidAmount { .. }
            | Self::EmptyPurchase
            | Self::RoundClosed { .. } => 400,
            Self::AlreadyExists { .. } | Self::Contention { .. } => 409,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => 500,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
