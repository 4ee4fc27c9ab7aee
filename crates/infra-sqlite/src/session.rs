// SQLite Session Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_edit_core::domain::{
    AuditEntry, AuditEvent, CorrelationRef, IsolationLevel, OrderHeader, OrderId, OrderLine,
    ProductId, Quantity,
};
use order_edit_core::port::{Session, SessionError};
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::debug;

/// How an isolation level is realised on SQLite
///
/// SQLite reads inside a transaction always come from one snapshot, so
/// every level is at least snapshot-consistent. What the levels change is
/// when a writing transaction takes the write lock. Read-only scopes always
/// begin deferred and never take it.
///
/// `read_uncommitted` is set as asked, but the pragma only acts on
/// shared-cache connections. Sessions here own private connections, so
/// READ UNCOMMITTED reads committed data like the other levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteIsolation {
    /// BEGIN statement for a transaction whose first statement writes
    pub begin: &'static str,
    pub read_uncommitted: bool,
}

const BEGIN_READ: &str = "BEGIN DEFERRED";

impl From<IsolationLevel> for SqliteIsolation {
    fn from(level: IsolationLevel) -> Self {
        match level {
            IsolationLevel::ReadUncommitted => SqliteIsolation {
                begin: "BEGIN DEFERRED",
                read_uncommitted: true,
            },
            IsolationLevel::ReadCommitted
            | IsolationLevel::RepeatableRead
            | IsolationLevel::Snapshot => SqliteIsolation {
                begin: "BEGIN DEFERRED",
                read_uncommitted: false,
            },
            // Write lock up front: concurrent writers wait at their first statement
            IsolationLevel::Serializable => SqliteIsolation {
                begin: "BEGIN IMMEDIATE",
                read_uncommitted: false,
            },
        }
    }
}

/// Session over one dedicated SQLite connection
///
/// Autocommit is emulated as off: the first statement outside a
/// transaction issues the BEGIN matching the isolation level.
pub struct SqliteSession {
    conn: SqliteConnection,
    isolation: IsolationLevel,
    in_tx: bool,
}

impl SqliteSession {
    pub fn new(conn: SqliteConnection) -> Self {
        Self {
            conn,
            isolation: IsolationLevel::default(),
            in_tx: false,
        }
    }

    /// Open the implicit transaction if none is open
    ///
    /// `write` tells whether the statement about to run writes. A read opens
    /// a deferred transaction whatever the level.
    async fn ensure_transaction(&mut self, write: bool) -> Result<(), SessionError> {
        if self.in_tx {
            return Ok(());
        }

        let begin = if write {
            SqliteIsolation::from(self.isolation).begin
        } else {
            BEGIN_READ
        };
        sqlx::query(begin)
            .execute(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;
        self.in_tx = true;
        debug!(statement = begin, isolation = %self.isolation, "Transaction opened");
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HeaderRow {
    customer_name: String,
    address: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    product_id: i64,
    designation: String,
    unit_price: f64,
    quantity: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    event_type: String,
    payload: DateTime<Utc>,
    reference: String,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_entry(self, object_id: OrderId) -> Result<AuditEntry, SessionError> {
        let event = self
            .event_type
            .parse::<AuditEvent>()
            .map_err(|e| SessionError::Other(e.to_string()))?;

        Ok(AuditEntry {
            event,
            object_id,
            payload: self.payload,
            reference: CorrelationRef::from_stored(self.reference),
            created_at: Some(self.created_at),
        })
    }
}

#[async_trait]
impl Session for SqliteSession {
    fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    async fn apply_isolation(&mut self, level: IsolationLevel) -> Result<(), SessionError> {
        let mapped = SqliteIsolation::from(level);

        sqlx::query(if mapped.read_uncommitted {
            "PRAGMA read_uncommitted = 1"
        } else {
            "PRAGMA read_uncommitted = 0"
        })
        .execute(&mut self.conn)
        .await
        .map_err(map_sqlx_error)?;

        // An open transaction keeps its BEGIN mode; the level takes over at the next one
        self.isolation = level;
        Ok(())
    }

    async fn select_order_header(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<OrderHeader>, SessionError> {
        self.ensure_transaction(false).await?;

        let row = sqlx::query_as::<_, HeaderRow>(
            "SELECT customer_name, address FROM order_header WHERE order_id = ?",
        )
        .bind(order_id.get())
        .fetch_optional(&mut self.conn)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|r| OrderHeader {
            order_id,
            customer_name: r.customer_name,
            address: r.address,
        }))
    }

    async fn select_order_lines(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, SessionError> {
        self.ensure_transaction(false).await?;

        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT product_id, designation, unit_price, quantity
            FROM order_line
            WHERE order_id = ?
            ORDER BY product_id ASC
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&mut self.conn)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|r| OrderLine {
                order_id,
                product_id: r.product_id,
                designation: r.designation,
                unit_price: r.unit_price,
                quantity: r.quantity,
            })
            .collect())
    }

    async fn select_audit_entries(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<AuditEntry>, SessionError> {
        self.ensure_transaction(false).await?;

        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT event_type, payload, reference, created_at
            FROM audit_log
            WHERE object_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&mut self.conn)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(|r| r.into_entry(order_id)).collect()
    }

    async fn update_order_address(
        &mut self,
        order_id: OrderId,
        address: &str,
    ) -> Result<u64, SessionError> {
        self.ensure_transaction(true).await?;

        let result = sqlx::query("UPDATE order_header SET address = ? WHERE order_id = ?")
            .bind(address)
            .bind(order_id.get())
            .execute(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn update_line_quantity(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<u64, SessionError> {
        self.ensure_transaction(true).await?;

        let result = sqlx::query(
            "UPDATE order_line SET quantity = ? WHERE order_id = ? AND product_id = ?",
        )
        .bind(quantity)
        .bind(order_id.get())
        .bind(product_id)
        .execute(&mut self.conn)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn insert_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), SessionError> {
        self.ensure_transaction(true).await?;

        // created_at is assigned by the column default
        sqlx::query(
            "INSERT INTO audit_log (event_type, object_id, payload, reference) VALUES (?, ?, ?, ?)",
        )
        .bind(entry.event.code())
        .bind(entry.object_id.get())
        .bind(entry.payload)
        .bind(entry.reference.as_str())
        .execute(&mut self.conn)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        if !self.in_tx {
            return Ok(());
        }

        // A failed COMMIT (e.g. SQLITE_BUSY) leaves the transaction open
        sqlx::query("COMMIT")
            .execute(&mut self.conn)
            .await
            .map_err(map_sqlx_error)?;
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        if !self.in_tx {
            return Ok(());
        }

        let result = settle_rollback(
            sqlx::query("ROLLBACK")
                .execute(&mut self.conn)
                .await
                .map(|_| ()),
        );
        // A failed ROLLBACK leaves the transaction open on the connection
        if result.is_ok() {
            self.in_tx = false;
        }
        result
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.conn.close().await.map_err(map_sqlx_error)
    }
}

/// Outcome of a ROLLBACK statement
///
/// SQLite may already have rolled back on its own (e.g. after SQLITE_FULL);
/// that counts as success.
fn settle_rollback(result: Result<(), sqlx::Error>) -> Result<(), SessionError> {
    match result {
        Ok(()) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.message().contains("no transaction is active") => {
            Ok(())
        }
        Err(e) => Err(map_sqlx_error(e)),
    }
}
