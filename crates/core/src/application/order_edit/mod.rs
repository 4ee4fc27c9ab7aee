// Order Edit Service - the transactional edit engine

pub mod audit;
pub mod configure;
pub mod connect;
pub mod edit;
pub mod fetch;


pub use edit::{EditOutcome, LineResult};

use crate::application::commit_gate::CommitGate;
use crate::domain::audit::DEFAULT_REFERENCE_PREFIX;
use crate::domain::{EditRequest, EditTrail, IsolationLevel, Order, OrderId};
use crate::error::{AppError, Result};
use crate::port::{Credentials, IdProvider, Session, SessionFactory, TimeProvider};
use std::sync::Arc;
use tracing::warn;

/// Engine settings
#[derive(Debug, Clone)]
pub struct EditSettings {
    /// Leading tag of every correlation reference
    pub reference_prefix: String,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
        }
    }
}

/// Order Edit Service
///
/// Holds no session: every operation borrows the caller's session for its
/// duration, and the caller owns the session lifetime. The `&mut` borrow is
/// the only exclusion there is between operations on one session.
pub struct OrderEditService {
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    settings: EditSettings,
}

impl OrderEditService {
    pub fn new(id_provider: Arc<dyn IdProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            id_provider,
            time_provider,
            settings: EditSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EditSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EditSettings {
        &self.settings
    }

    /// Open a session and apply the isolation level to it
    pub async fn connect(
        &self,
        factory: &dyn SessionFactory,
        credentials: &Credentials,
        level: IsolationLevel,
    ) -> Result<Box<dyn Session>> {
        connect::execute_configured(factory, credentials, level).await
    }

    /// Apply an isolation level to the session
    pub async fn configure(&self, session: &mut dyn Session, level: IsolationLevel) -> Result<()> {
        configure::execute(session, level).await
    }

    /// Read an order header and its lines
    pub async fn fetch_order(&self, session: &mut dyn Session, order_id: OrderId) -> Result<Order> {
        fetch::execute(session, order_id).await
    }

    /// Run the edit protocol; `pause` makes it wait before committing
    pub async fn edit_order(
        &self,
        session: &mut dyn Session,
        request: &EditRequest,
        pause: Option<CommitGate>,
    ) -> Result<EditOutcome> {
        edit::execute(
            session,
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            &self.settings,
            request,
            pause,
        )
        .await
    }

    /// Edit attempts recorded in the audit log for an order
    pub async fn audit_trail(
        &self,
        session: &mut dyn Session,
        order_id: OrderId,
    ) -> Result<Vec<EditTrail>> {
        audit::execute(session, order_id).await
    }
}

/// End the implicit transaction a read opened, if the read owns it
///
/// The scope holds no writes, so ending it is a rollback.
async fn close_read_scope<T>(
    session: &mut dyn Session,
    owns_scope: bool,
    order_id: OrderId,
    result: Result<T>,
) -> Result<T> {
    if !owns_scope {
        return result;
    }

    match session.rollback().await {
        Ok(()) => result,
        Err(source) => match result {
            Ok(_) => Err(AppError::Read { order_id, source }),
            Err(e) => {
                warn!(order_id = %order_id, error = %source, "Failed to end read scope");
                Err(e)
            }
        },
    }
}
