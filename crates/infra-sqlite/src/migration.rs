// Migration Runner (schema bootstrap for demo/test databases)
// The edit engine never calls this: it expects the schema to exist.

use crate::error::map_sqlx_error;
use order_edit_core::port::SessionError;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::info;

/// Order id of the demo order created by [`seed_demo_order`]
pub const DEMO_ORDER_ID: i64 = 42;

/// Run database migrations
pub async fn run_migrations(conn: &mut SqliteConnection) -> Result<(), SessionError> {
    info!("Running database migrations...");

    // Check if schema_version table exists
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let current_version: i64 = if table_exists > 0 {
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?
            .unwrap_or(0)
    } else {
        0
    };

    info!("Current schema version: {}", current_version);

    if current_version < 1 {
        info!("Applying migration 001: Order schema");
        apply_migration(conn, include_str!("../migrations/001_order_schema.sql")).await?;
    }

    info!("All migrations applied successfully");
    Ok(())
}

/// Apply a single migration SQL file
async fn apply_migration(conn: &mut SqliteConnection, sql: &str) -> Result<(), SessionError> {
    // Execute migration in a transaction
    let mut tx = conn.begin().await.map_err(map_sqlx_error)?;

    for statement in split_statements(sql) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

/// Strip `--` comment lines, then split by semicolon
///
/// Comments go first: a `;` inside a comment must not end a statement.
fn split_statements(sql: &str) -> Vec<String> {
    let uncommented = sql
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    uncommented
        .split(';')
        .map(|statement| statement.trim().to_string())
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Reset the demo order 42 to address "A" with three lines
pub async fn seed_demo_order(conn: &mut SqliteConnection) -> Result<(), SessionError> {
    let mut tx = conn.begin().await.map_err(map_sqlx_error)?;

    sqlx::query(
        r#"
        INSERT INTO order_header (order_id, customer_name, address)
        VALUES (?, 'Ana Silva', 'A')
        ON CONFLICT (order_id) DO UPDATE SET
            customer_name = excluded.customer_name,
            address = excluded.address
        "#,
    )
    .bind(DEMO_ORDER_ID)
    .execute(&mut *tx)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query("DELETE FROM order_line WHERE order_id = ?")
        .bind(DEMO_ORDER_ID)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

    for (product_id, designation, unit_price, quantity) in [
        (1_i64, "Parafuso M6", 0.15_f64, 5_i64),
        (2, "Porca M6", 0.10, 10),
        (3, "Anilha M6", 0.05, 20),
    ] {
        sqlx::query(
            r#"
            INSERT INTO order_line (order_id, product_id, designation, unit_price, quantity)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(DEMO_ORDER_ID)
        .bind(product_id)
        .bind(designation)
        .bind(unit_price)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)?;
    info!(order_id = DEMO_ORDER_ID, "Demo order seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::ConnectOptions;

    async fn memory_connection() -> SqliteConnection {
        "sqlite::memory:"
            .parse::<sqlx::sqlite::SqliteConnectOptions>()
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let mut conn = memory_connection().await;
        let result = run_migrations(&mut conn).await;

        if let Err(e) = &result {
            eprintln!("Migration error: {:?}", e);
        }
        assert!(result.is_ok());

        // Check that tables exist
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_split_ignores_semicolons_in_comments() {
        let sql = "-- header; with a semicolon\nCREATE TABLE a (x INTEGER);\n\n-- trailing; note\nCREATE TABLE b (y INTEGER);\n";

        assert_eq!(
            split_statements(sql),
            vec!["CREATE TABLE a (x INTEGER)", "CREATE TABLE b (y INTEGER)"]
        );
    }

    #[test]
    fn test_shipped_schema_splits_into_statements() {
        let statements = split_statements(include_str!("../migrations/001_order_schema.sql"));

        assert!(statements.iter().all(|s| !s.contains("--")));
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS schema_version"));
        assert!(statements
            .last()
            .unwrap()
            .starts_with("INSERT INTO schema_version"));
    }

    #[tokio::test]
    async fn test_fresh_database_gets_full_schema() {
        let mut conn = memory_connection().await;
        run_migrations(&mut conn).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut conn)
        .await
        .unwrap();
        assert_eq!(
            tables,
            vec!["audit_log", "order_header", "order_line", "schema_version"]
        );

        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_migrations_and_seed_are_rerunnable() {
        let mut conn = memory_connection().await;
        run_migrations(&mut conn).await.unwrap();
        seed_demo_order(&mut conn).await.unwrap();

        sqlx::query("UPDATE order_header SET address = 'Z' WHERE order_id = 42")
            .execute(&mut conn)
            .await
            .unwrap();

        run_migrations(&mut conn).await.unwrap();
        seed_demo_order(&mut conn).await.unwrap();

        let address: String =
            sqlx::query_scalar("SELECT address FROM order_header WHERE order_id = 42")
                .fetch_one(&mut conn)
                .await
                .unwrap();
        assert_eq!(address, "A");

        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_line WHERE order_id = 42")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(lines, 3);
    }
}
