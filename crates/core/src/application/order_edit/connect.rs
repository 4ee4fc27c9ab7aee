// Connect Use Case

use crate::application::order_edit::configure;
use crate::domain::IsolationLevel;
use crate::error::{AppError, Result};
use crate::port::{Credentials, Session, SessionFactory};
use tracing::{error, info, warn};

/// Open a session through the factory
pub async fn execute(
    factory: &dyn SessionFactory,
    credentials: &Credentials,
) -> Result<Box<dyn Session>> {
    let session = factory.open(credentials).await.map_err(|e| {
        error!(
            server = %credentials.server,
            database = %credentials.database,
            error = %e,
            "Connection failed"
        );
        AppError::Connect(e)
    })?;

    info!(
        server = %credentials.server,
        database = %credentials.database,
        "Session opened (autocommit off)"
    );
    Ok(session)
}

/// Open a session and apply an isolation level to it
///
/// A session whose isolation level cannot be applied is closed again
/// before the configuration error is returned.
pub async fn execute_configured(
    factory: &dyn SessionFactory,
    credentials: &Credentials,
    level: IsolationLevel,
) -> Result<Box<dyn Session>> {
    let mut session = execute(factory, credentials).await?;

    if let Err(e) = configure::execute(session.as_mut(), level).await {
        if let Err(close_err) = session.close().await {
            warn!(error = %close_err, "Failed to close misconfigured session");
        }
        return Err(e);
    }

    Ok(session)
}
