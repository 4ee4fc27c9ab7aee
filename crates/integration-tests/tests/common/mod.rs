//! Shared fixtures: a file-backed SQLite database seeded with demo order 42
#![allow(dead_code)]

use std::sync::Arc;

use order_edit_core::application::OrderEditService;
use order_edit_core::domain::{EditRequest, IsolationLevel, OrderId};
use order_edit_core::port::id_provider::UuidProvider;
use order_edit_core::port::time_provider::SystemTimeProvider;
use order_edit_core::port::{Credentials, Session};
use order_edit_infra_sqlite::{
    run_migrations, seed_demo_order, SqliteSessionFactory, SqliteSessionOptions,
};
use sqlx::sqlite::SqliteConnection;
use tempfile::TempDir;

pub const DB_FILE: &str = "orders.db";

/// WAL needs a real file, so every test gets its own directory
pub struct TestDb {
    _dir: TempDir,
    pub credentials: Credentials,
    pub factory: SqliteSessionFactory,
}

impl TestDb {
    pub async fn seeded() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let credentials = Credentials::new(dir.path().to_string_lossy(), DB_FILE, "sa", "");

        let bootstrap = SqliteSessionFactory::new(SqliteSessionOptions {
            create_if_missing: true,
            ..Default::default()
        });
        let mut conn = bootstrap.open_connection(&credentials).await.unwrap();
        run_migrations(&mut conn).await.unwrap();
        seed_demo_order(&mut conn).await.unwrap();
        drop(conn);

        Self {
            _dir: dir,
            credentials,
            factory: SqliteSessionFactory::default(),
        }
    }

    pub async fn session(&self, level: IsolationLevel) -> Box<dyn Session> {
        service()
            .connect(&self.factory, &self.credentials, level)
            .await
            .unwrap()
    }

    /// Raw connection for assertions outside the engine
    pub async fn raw(&self) -> SqliteConnection {
        self.factory.open_connection(&self.credentials).await.unwrap()
    }

    /// Audit rows of order 42 as (event_type, reference), oldest first
    pub async fn audit_rows(&self) -> Vec<(String, String)> {
        let mut conn = self.raw().await;
        sqlx::query_as(
            "SELECT event_type, reference FROM audit_log WHERE object_id = 42 ORDER BY id",
        )
        .fetch_all(&mut conn)
        .await
        .unwrap()
    }
}

pub fn service() -> OrderEditService {
    OrderEditService::new(Arc::new(UuidProvider), Arc::new(SystemTimeProvider))
}

pub fn order_42() -> OrderId {
    OrderId::new(42).unwrap()
}

/// Address A -> B, product 1 quantity 5 -> 9
pub fn edit_42() -> EditRequest {
    EditRequest::new(order_42(), "B").with_line(1, 9)
}
