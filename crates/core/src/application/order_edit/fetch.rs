// Fetch Order Use Case (pure read)

use super::close_read_scope;
use crate::domain::{Order, OrderId};
use crate::error::{AppError, Result};
use crate::port::Session;
use tracing::debug;

/// Read the header and its lines (ordered by product id)
///
/// Issues no writes. When no transaction was open on entry, the read scope
/// the statements opened is ended before returning.
pub async fn execute(session: &mut dyn Session, order_id: OrderId) -> Result<Order> {
    let owns_scope = !session.in_transaction();
    let result = read_order(session, order_id).await;
    close_read_scope(session, owns_scope, order_id, result).await
}

async fn read_order(session: &mut dyn Session, order_id: OrderId) -> Result<Order> {
    let header = session
        .select_order_header(order_id)
        .await
        .map_err(|source| AppError::Read { order_id, source })?
        .ok_or(AppError::NotFound(order_id))?;

    let lines = session
        .select_order_lines(order_id)
        .await
        .map_err(|source| AppError::Read { order_id, source })?;

    debug!(order_id = %order_id, lines = lines.len(), "Order fetched");
    Ok(Order { header, lines })
}
