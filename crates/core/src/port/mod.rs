// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod session;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use session::{Credentials, Session, SessionError, SessionFactory};
pub use time_provider::TimeProvider;
