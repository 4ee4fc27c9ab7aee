// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid order id: {0} (must be positive)")]
    InvalidOrderId(i64),

    #[error("Unsupported isolation level: {0}")]
    UnsupportedIsolationLevel(String),

    #[error("Invalid line edit '{0}': expected PRODUCT=QUANTITY")]
    InvalidLineEdit(String),

    #[error("Unknown audit event type: {0}")]
    UnknownAuditEvent(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
