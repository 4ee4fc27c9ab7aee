// Session Port (database connection with manual transaction control)

use crate::domain::{
    AuditEntry, IsolationLevel, OrderHeader, OrderId, OrderLine, ProductId, Quantity,
};
use async_trait::async_trait;
use thiserror::Error;

/// Connection parameters handed to a [`SessionFactory`]
#[derive(Clone, Default)]
pub struct Credentials {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Errors raised by a session or its factory (driver-level diagnostics)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Database locked: {0}")]
    Busy(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database error [{code}]: {message}")]
    Database { code: String, message: String },

    #[error("Session closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Stateful database session with autocommit disabled
///
/// Every statement implicitly opens a transaction when none is active;
/// the transaction lasts until `commit` or `rollback`. A session is a
/// single-writer handle: callers must not issue statements concurrently.
#[async_trait]
pub trait Session: Send {
    /// Level currently applied to the session
    fn isolation_level(&self) -> IsolationLevel;

    /// True while an implicit transaction is open
    fn in_transaction(&self) -> bool;

    /// Apply an isolation level for the remaining lifetime of the session
    async fn apply_isolation(&mut self, level: IsolationLevel) -> Result<(), SessionError>;

    async fn select_order_header(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<OrderHeader>, SessionError>;

    /// Lines of an order, ordered by product id ascending
    async fn select_order_lines(&mut self, order_id: OrderId)
        -> Result<Vec<OrderLine>, SessionError>;

    /// Audit entries targeting an order, in insertion order
    async fn select_audit_entries(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<AuditEntry>, SessionError>;

    /// Returns the number of rows affected
    async fn update_order_address(
        &mut self,
        order_id: OrderId,
        address: &str,
    ) -> Result<u64, SessionError>;

    /// Returns the number of rows affected (0 when the line does not exist)
    async fn update_line_quantity(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<u64, SessionError>;

    async fn insert_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), SessionError>;

    /// Commit the open transaction (no-op when none is open)
    async fn commit(&mut self) -> Result<(), SessionError>;

    /// Roll back the open transaction (no-op when none is open)
    async fn rollback(&mut self) -> Result<(), SessionError>;

    /// Close the underlying connection, discarding any open transaction
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Opens sessions from credentials
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, credentials: &Credentials) -> Result<Box<dyn Session>, SessionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// Committed state shared by every [`MemorySession`] of one database
    #[derive(Debug, Clone, Default)]
    pub struct MemoryDb {
        pub headers: BTreeMap<OrderId, OrderHeader>,
        pub lines: BTreeMap<(OrderId, ProductId), OrderLine>,
        pub audit: Vec<AuditEntry>,
    }

    impl MemoryDb {
        pub fn with_order(mut self, header: OrderHeader, lines: Vec<OrderLine>) -> Self {
            for line in lines {
                self.lines.insert((line.order_id, line.product_id), line);
            }
            self.headers.insert(header.order_id, header);
            self
        }

        pub fn shared(self) -> Arc<Mutex<MemoryDb>> {
            Arc::new(Mutex::new(self))
        }
    }

    /// In-memory session: a transaction works on a private copy of the
    /// committed state, taken by its first statement
    pub struct MemorySession {
        db: Arc<Mutex<MemoryDb>>,
        working: Option<MemoryDb>,
        isolation: IsolationLevel,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl MemorySession {
        pub fn new(db: Arc<Mutex<MemoryDb>>) -> Self {
            Self {
                db,
                working: None,
                isolation: IsolationLevel::default(),
                journal: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Statements issued so far, e.g. `update_line:1`, `commit`
        pub fn journal(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.journal)
        }

        fn record(&self, statement: impl Into<String>) {
            self.journal.lock().unwrap().push(statement.into());
        }

        fn working(&mut self) -> &mut MemoryDb {
            let db = &self.db;
            self.working
                .get_or_insert_with(|| db.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl Session for MemorySession {
        fn isolation_level(&self) -> IsolationLevel {
            self.isolation
        }

        fn in_transaction(&self) -> bool {
            self.working.is_some()
        }

        async fn apply_isolation(&mut self, level: IsolationLevel) -> Result<(), SessionError> {
            self.record(format!("isolation:{}", level));
            self.isolation = level;
            Ok(())
        }

        async fn select_order_header(
            &mut self,
            order_id: OrderId,
        ) -> Result<Option<OrderHeader>, SessionError> {
            self.record("select_header");
            Ok(self.working().headers.get(&order_id).cloned())
        }

        async fn select_order_lines(
            &mut self,
            order_id: OrderId,
        ) -> Result<Vec<OrderLine>, SessionError> {
            self.record("select_lines");
            Ok(self
                .working()
                .lines
                .values()
                .filter(|l| l.order_id == order_id)
                .cloned()
                .collect())
        }

        async fn select_audit_entries(
            &mut self,
            order_id: OrderId,
        ) -> Result<Vec<AuditEntry>, SessionError> {
            self.record("select_audit");
            Ok(self
                .working()
                .audit
                .iter()
                .filter(|e| e.object_id == order_id)
                .cloned()
                .collect())
        }

        async fn update_order_address(
            &mut self,
            order_id: OrderId,
            address: &str,
        ) -> Result<u64, SessionError> {
            self.record("update_address");
            match self.working().headers.get_mut(&order_id) {
                Some(header) => {
                    header.address = address.to_string();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn update_line_quantity(
            &mut self,
            order_id: OrderId,
            product_id: ProductId,
            quantity: Quantity,
        ) -> Result<u64, SessionError> {
            self.record(format!("update_line:{}", product_id));
            match self.working().lines.get_mut(&(order_id, product_id)) {
                Some(line) => {
                    line.quantity = quantity;
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn insert_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), SessionError> {
            self.record(format!("insert_audit:{}", entry.event.code()));
            let mut stored = entry.clone();
            stored.created_at = Some(entry.payload);
            self.working().audit.push(stored);
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), SessionError> {
            self.record("commit");
            if let Some(working) = self.working.take() {
                *self.db.lock().unwrap() = working;
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), SessionError> {
            self.record("rollback");
            self.working = None;
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<(), SessionError> {
            Ok(())
        }
    }

    /// Statement at which a [`FaultySession`] fails
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        ApplyIsolation,
        Read,
        OpenLog,
        AddressUpdate,
        LineUpdate(ProductId),
        /// The first commit issued (the business commit of an edit)
        BusinessCommit,
        /// Inserting the close audit entry
        CloseLog,
        /// Any rollback
        Rollback,
    }

    /// Wraps a session and fails one kind of statement
    pub struct FaultySession {
        inner: Box<dyn Session>,
        fault: Fault,
        commits: usize,
    }

    impl FaultySession {
        pub fn new(inner: Box<dyn Session>, fault: Fault) -> Self {
            Self {
                inner,
                fault,
                commits: 0,
            }
        }

        fn check(&self, point: Fault) -> Result<(), SessionError> {
            if self.fault == point {
                return Err(SessionError::Other(format!("injected fault at {:?}", point)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Session for FaultySession {
        fn isolation_level(&self) -> IsolationLevel {
            self.inner.isolation_level()
        }

        fn in_transaction(&self) -> bool {
            self.inner.in_transaction()
        }

        async fn apply_isolation(&mut self, level: IsolationLevel) -> Result<(), SessionError> {
            self.check(Fault::ApplyIsolation)?;
            self.inner.apply_isolation(level).await
        }

        async fn select_order_header(
            &mut self,
            order_id: OrderId,
        ) -> Result<Option<OrderHeader>, SessionError> {
            self.check(Fault::Read)?;
            self.inner.select_order_header(order_id).await
        }

        async fn select_order_lines(
            &mut self,
            order_id: OrderId,
        ) -> Result<Vec<OrderLine>, SessionError> {
            self.check(Fault::Read)?;
            self.inner.select_order_lines(order_id).await
        }

        async fn select_audit_entries(
            &mut self,
            order_id: OrderId,
        ) -> Result<Vec<AuditEntry>, SessionError> {
            self.check(Fault::Read)?;
            self.inner.select_audit_entries(order_id).await
        }

        async fn update_order_address(
            &mut self,
            order_id: OrderId,
            address: &str,
        ) -> Result<u64, SessionError> {
            self.check(Fault::AddressUpdate)?;
            self.inner.update_order_address(order_id, address).await
        }

        async fn update_line_quantity(
            &mut self,
            order_id: OrderId,
            product_id: ProductId,
            quantity: Quantity,
        ) -> Result<u64, SessionError> {
            self.check(Fault::LineUpdate(product_id))?;
            self.inner
                .update_line_quantity(order_id, product_id, quantity)
                .await
        }

        async fn insert_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), SessionError> {
            match entry.event {
                crate::domain::AuditEvent::Open => self.check(Fault::OpenLog)?,
                crate::domain::AuditEvent::Close => self.check(Fault::CloseLog)?,
            }
            self.inner.insert_audit_entry(entry).await
        }

        async fn commit(&mut self) -> Result<(), SessionError> {
            self.commits += 1;
            if self.commits == 1 {
                self.check(Fault::BusinessCommit)?;
            }
            self.inner.commit().await
        }

        async fn rollback(&mut self) -> Result<(), SessionError> {
            self.check(Fault::Rollback)?;
            self.inner.rollback().await
        }

        async fn close(self: Box<Self>) -> Result<(), SessionError> {
            self.inner.close().await
        }
    }
}
