// Configure Use Case (isolation level)

use crate::domain::IsolationLevel;
use crate::error::{AppError, Result};
use crate::port::Session;
use tracing::{error, info};

/// Apply an isolation level to the session until it is changed again
pub async fn execute(session: &mut dyn Session, level: IsolationLevel) -> Result<()> {
    session.apply_isolation(level).await.map_err(|source| {
        error!(isolation = %level, error = %source, "Failed to apply isolation level");
        AppError::Configuration { level, source }
    })?;

    info!(isolation = %level, "Isolation level applied");
    Ok(())
}
