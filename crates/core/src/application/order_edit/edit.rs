// Edit Order Use Case
//
// Phases:
//   1. open log entry      ┐
//   2. address update      ├ business transaction
//   3. quantity updates    ┘
//   4. optional pause (commit gate)
//   5. business commit, then close log entry in its own transaction

use super::EditSettings;
use crate::application::commit_gate::CommitGate;
use crate::domain::{
    AuditEntry, AuditEvent, CorrelationRef, EditRequest, ProductId, Quantity,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, Session, SessionError, TimeProvider};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Rows touched by one quantity update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineResult {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub rows: u64,
}

/// Result of a fully committed and logged edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub reference: CorrelationRef,
    pub header_rows: u64,
    pub line_results: Vec<LineResult>,
}

impl EditOutcome {
    /// Requested products whose update matched no line
    pub fn unmatched_products(&self) -> Vec<ProductId> {
        self.line_results
            .iter()
            .filter(|r| r.rows == 0)
            .map(|r| r.product_id)
            .collect()
    }
}

/// Execute the edit protocol
///
/// # Arguments
///
/// * `session` - Session, exclusively borrowed for the whole protocol
/// * `id_provider` - Source of the correlation reference suffix
/// * `time_provider` - Clock for the reference and the log payloads
/// * `settings` - Engine settings (reference prefix)
/// * `request` - The edit to apply
/// * `pause` - When present, the protocol waits on it before committing
pub async fn execute(
    session: &mut dyn Session,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    settings: &EditSettings,
    request: &EditRequest,
    pause: Option<CommitGate>,
) -> Result<EditOutcome> {
    let reference = CorrelationRef::generate(
        &settings.reference_prefix,
        time_provider.now(),
        &id_provider.generate_id(),
    );

    let span = info_span!(
        "edit_order",
        order_id = %request.order_id,
        reference = %reference,
        isolation = %session.isolation_level(),
    );

    run(session, time_provider, request, pause, reference)
        .instrument(span)
        .await
}

async fn run(
    session: &mut dyn Session,
    time_provider: &dyn TimeProvider,
    request: &EditRequest,
    pause: Option<CommitGate>,
    reference: CorrelationRef,
) -> Result<EditOutcome> {
    info!(lines = request.lines().len(), "Edit started");

    let (header_rows, line_results) =
        match apply_changes(session, time_provider, request, &reference).await {
            Ok(applied) => applied,
            Err(source) => return Err(abort(session, reference, source).await),
        };

    if let Some(gate) = pause {
        info!("Paused before commit: updates issued, transaction open");
        if let Err(abandoned) = gate.hold().await {
            let source = SessionError::Other(abandoned.to_string());
            return Err(abort(session, reference, source).await);
        }
        info!("Resume signal received");
    }

    if let Err(source) = session.commit().await {
        error!(error = %source, "Business commit failed");
        if let Err(e) = session.rollback().await {
            warn!(error = %e, "Rollback after failed commit also failed");
        }
        return Err(AppError::Commit { reference, source });
    }
    info!("Business transaction committed");

    // Separate transaction: a failure here leaves the business commit in place
    let close = AuditEntry::new(
        AuditEvent::Close,
        request.order_id,
        time_provider.now(),
        reference.clone(),
    );
    if let Err(source) = write_close_log(session, &close).await {
        error!(error = %source, "Close log entry failed; business changes stay committed");
        if let Err(e) = session.rollback().await {
            warn!(error = %e, "Rollback of close log transaction failed");
        }
        return Err(AppError::AuditLog { reference, source });
    }
    info!("Close log entry committed");

    Ok(EditOutcome {
        reference,
        header_rows,
        line_results,
    })
}

/// Phases 1-3, all inside the implicit business transaction
async fn apply_changes(
    session: &mut dyn Session,
    time_provider: &dyn TimeProvider,
    request: &EditRequest,
    reference: &CorrelationRef,
) -> std::result::Result<(u64, Vec<LineResult>), SessionError> {
    let order_id = request.order_id;

    let open = AuditEntry::new(
        AuditEvent::Open,
        order_id,
        time_provider.now(),
        reference.clone(),
    );
    session.insert_audit_entry(&open).await?;
    debug!("Open log entry written");

    let header_rows = session
        .update_order_address(order_id, &request.address)
        .await?;
    if header_rows == 0 {
        warn!("Address update matched no order header");
    } else {
        debug!(rows = header_rows, "Address updated");
    }

    let mut line_results = Vec::with_capacity(request.lines().len());
    for edit in request.lines() {
        let rows = session
            .update_line_quantity(order_id, edit.product_id, edit.quantity)
            .await?;
        if rows == 0 {
            warn!(product_id = edit.product_id, "Quantity update matched no line");
        } else {
            debug!(
                product_id = edit.product_id,
                quantity = edit.quantity,
                "Quantity updated"
            );
        }
        line_results.push(LineResult {
            product_id: edit.product_id,
            quantity: edit.quantity,
            rows,
        });
    }

    Ok((header_rows, line_results))
}

async fn write_close_log(
    session: &mut dyn Session,
    entry: &AuditEntry,
) -> std::result::Result<(), SessionError> {
    session.insert_audit_entry(entry).await?;
    session.commit().await
}

/// Roll back the business transaction and build the error to return
async fn abort(
    session: &mut dyn Session,
    reference: CorrelationRef,
    source: SessionError,
) -> AppError {
    error!(error = %source, "Edit failed, rolling back");

    let rollback_error = session.rollback().await.err();
    match &rollback_error {
        None => info!("Rollback completed"),
        Some(e) => error!(error = %e, "Rollback failed"),
    }

    AppError::Transaction {
        reference,
        source,
        rollback_error,
    }
}
