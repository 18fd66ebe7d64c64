//! # Engine Error Types
//!
//! The error surface callers of the lifecycle service see.
//!
//! ## Taxonomy
//! ```text
//! NotFound            entity missing or not owned by the caller
//! Core                business rule violation (validation, transitions,
//!                     insufficient stock, missing prerequisites)
//! ConflictRetryable   lock timeout / lost race - retry the whole operation
//! ExternalPayment     gateway round trip failed; order state already
//!                     committed, never silently advanced
//! Db                  infrastructure failure, already rolled back
//! ```
//!
//! Business failures are raised before any mutation; the transaction a
//! failure aborts rolls back in full, so callers never observe partial
//! state.

use thiserror::Error;

use boutique_core::{CoreError, StockShortage};
use boutique_db::DbError;

/// Errors returned by [`crate::OrderService`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Entity missing, inactive, or not owned by the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Business rule violation from boutique-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A concurrent transaction won a lock or consumed contested stock.
    /// State is unchanged; the caller should retry the whole operation.
    #[error("operation conflicted with a concurrent update, retry")]
    ConflictRetryable,

    /// The payment gateway round trip failed. The order itself committed
    /// and remains PENDING_PAYMENT with the reference recorded.
    #[error("payment gateway error for {reference}: {message}")]
    ExternalPayment { reference: String, message: String },

    /// Infrastructure failure surfaced by the database layer.
    #[error(transparent)]
    Db(DbError),
}

impl EngineError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// The shortage list when this is an insufficient-stock failure.
    pub fn shortages(&self) -> Option<&[StockShortage]> {
        match self {
            EngineError::Core(CoreError::InsufficientStock { shortages }) => Some(shortages),
            _ => None,
        }
    }
}

/// Lock contention becomes a retryable conflict; everything else passes
/// through as an infrastructure error.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Busy => EngineError::ConflictRetryable,
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Db(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_becomes_retryable() {
        let err: EngineError = DbError::Busy.into();
        assert!(matches!(err, EngineError::ConflictRetryable));
    }

    #[test]
    fn test_shortage_accessor() {
        let err = EngineError::Core(CoreError::InsufficientStock {
            shortages: vec![StockShortage {
                sku: "DRESS-M".into(),
                requested: 3,
                available: 2,
            }],
        });
        assert_eq!(err.shortages().unwrap().len(), 1);
        assert!(EngineError::ConflictRetryable.shortages().is_none());
    }
}
