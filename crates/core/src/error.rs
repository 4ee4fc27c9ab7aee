// Central Error Type for the Application

use crate::domain::{CorrelationRef, DomainError, IsolationLevel, OrderId};
use crate::port::SessionError;
use thiserror::Error;

/// Engine-level error taxonomy
///
/// Every variant carries the session-level cause. `Transaction` is only
/// returned after the rollback was issued; `AuditLog` is returned after the
/// business commit succeeded and never undoes it.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connect error: {0}")]
    Connect(#[source] SessionError),

    #[error("Configuration error: cannot apply {level}: {source}")]
    Configuration {
        level: IsolationLevel,
        #[source]
        source: SessionError,
    },

    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("Read error on order {order_id}: {source}")]
    Read {
        order_id: OrderId,
        #[source]
        source: SessionError,
    },

    #[error("Transaction error [{reference}], rolled back: {source}")]
    Transaction {
        reference: CorrelationRef,
        #[source]
        source: SessionError,
        /// Set when the rollback itself failed as well
        rollback_error: Option<SessionError>,
    },

    #[error("Commit error [{reference}]: {source}")]
    Commit {
        reference: CorrelationRef,
        #[source]
        source: SessionError,
    },

    #[error("Audit log error [{reference}] (business changes are committed): {source}")]
    AuditLog {
        reference: CorrelationRef,
        #[source]
        source: SessionError,
    },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl AppError {
    /// Correlation reference of the edit attempt, when the error comes from one
    pub fn reference(&self) -> Option<&CorrelationRef> {
        match self {
            AppError::Transaction { reference, .. }
            | AppError::Commit { reference, .. }
            | AppError::AuditLog { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// True when the business changes of the edit are durably committed
    pub fn is_business_applied(&self) -> bool {
        matches!(self, AppError::AuditLog { .. })
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
