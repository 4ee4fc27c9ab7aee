// Order Edit Infrastructure - SQLite Adapter
// Implements: SessionFactory, Session

mod connection;
mod error;
mod migration;
mod session;

pub use connection::{SqliteSessionFactory, SqliteSessionOptions, DEFAULT_BUSY_TIMEOUT};
pub use migration::{run_migrations, seed_demo_order, DEMO_ORDER_ID};
pub use session::{SqliteIsolation, SqliteSession};

// Note: sqlx::Error conversion is handled by map_sqlx_error (error.rs)
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for SessionError here)
