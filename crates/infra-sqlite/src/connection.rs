// SQLite Session Factory

use crate::session::SqliteSession;
use async_trait::async_trait;
use order_edit_core::port::{Credentials, Session, SessionError, SessionFactory};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default time a statement waits on a lock held by another session
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings shared by every session the factory opens
#[derive(Debug, Clone)]
pub struct SqliteSessionOptions {
    /// How long a statement waits on another session's lock before failing
    pub busy_timeout: Duration,
    /// Create the database file when it does not exist (bootstrap only)
    pub create_if_missing: bool,
    /// WAL journal: readers see the last committed snapshot instead of
    /// blocking on a writer
    pub wal: bool,
}

impl Default for SqliteSessionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            create_if_missing: false,
            wal: true,
        }
    }
}

/// Opens one dedicated connection per session
#[derive(Debug, Clone, Default)]
pub struct SqliteSessionFactory {
    options: SqliteSessionOptions,
}

impl SqliteSessionFactory {
    pub fn new(options: SqliteSessionOptions) -> Self {
        Self { options }
    }

    /// Open a raw connection (used for schema bootstrap and by `open`)
    pub async fn open_connection(
        &self,
        credentials: &Credentials,
    ) -> Result<SqliteConnection, SessionError> {
        let options = connect_options(credentials, &self.options)?;

        if !credentials.username.is_empty() || !credentials.password.is_empty() {
            debug!(
                username = %credentials.username,
                "SQLite has no authentication; username and password are ignored"
            );
        }

        options
            .connect()
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SessionFactory for SqliteSessionFactory {
    async fn open(&self, credentials: &Credentials) -> Result<Box<dyn Session>, SessionError> {
        let conn = self.open_connection(credentials).await?;
        Ok(Box::new(SqliteSession::new(conn)))
    }
}

/// Build connect options from credentials
///
/// `database` is either a `sqlite:` URL or a file path. A relative path is
/// resolved against `server` when one is given.
fn connect_options(
    credentials: &Credentials,
    settings: &SqliteSessionOptions,
) -> Result<SqliteConnectOptions, SessionError> {
    let database = credentials.database.trim();
    if database.is_empty() {
        return Err(SessionError::Connection("no database given".to_string()));
    }

    let options = if database.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(database)
            .map_err(|e| SessionError::Connection(e.to_string()))?
    } else {
        SqliteConnectOptions::new().filename(database_path(&credentials.server, database))
    };

    let journal_mode = if settings.wal {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };

    Ok(options
        .journal_mode(journal_mode)
        .busy_timeout(settings.busy_timeout)
        .create_if_missing(settings.create_if_missing))
}

fn database_path(server: &str, database: &str) -> PathBuf {
    let path = Path::new(database);
    if server.trim().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(server.trim()).join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_joins_server_directory() {
        assert_eq!(
            database_path("/srv/orders", "shop.db"),
            PathBuf::from("/srv/orders/shop.db")
        );
        assert_eq!(database_path("", "shop.db"), PathBuf::from("shop.db"));
        assert_eq!(
            database_path("/srv/orders", "/tmp/shop.db"),
            PathBuf::from("/tmp/shop.db")
        );
    }

    #[tokio::test]
    async fn test_open_in_memory_session() {
        let factory = SqliteSessionFactory::default();
        let credentials = Credentials::new("", "sqlite::memory:", "sa", "secret");
        let session = factory.open(&credentials).await.unwrap();
        assert!(!session.in_transaction());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_database_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SqliteSessionFactory::default();
        let credentials = Credentials::new(
            dir.path().to_string_lossy(),
            "absent.db",
            "",
            "",
        );

        let err = factory.open(&credentials).await.err().unwrap();
        assert!(matches!(err, SessionError::Connection(_)));
    }

    #[tokio::test]
    async fn test_empty_database_is_connection_error() {
        let factory = SqliteSessionFactory::default();
        let err = factory
            .open(&Credentials::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err, SessionError::Connection("no database given".to_string()));
    }
}
