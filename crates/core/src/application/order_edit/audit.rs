// Audit Trail Use Case
// An open entry without its close entry marks an aborted, in-flight or
// partially logged edit.

use super::close_read_scope;
use crate::domain::{EditTrail, OrderId};
use crate::error::{AppError, Result};
use crate::port::Session;

/// Audit trail of an order, one item per correlation reference
pub async fn execute(session: &mut dyn Session, order_id: OrderId) -> Result<Vec<EditTrail>> {
    let owns_scope = !session.in_transaction();
    let result = session
        .select_audit_entries(order_id)
        .await
        .map(|entries| EditTrail::fold(&entries))
        .map_err(|source| AppError::Read { order_id, source });
    close_read_scope(session, owns_scope, order_id, result).await
}
