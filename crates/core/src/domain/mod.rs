// Domain Layer - Pure business logic and entities

pub mod audit;
pub mod error;
pub mod isolation;
pub mod order;

// Re-exports
pub use audit::{AuditEntry, AuditEvent, CorrelationRef, EditTrail, TrailStatus};
pub use error::DomainError;
pub use isolation::IsolationLevel;
pub use order::{
    EditRequest, LineEdit, Order, OrderHeader, OrderId, OrderLine, ProductId, Quantity,
};
