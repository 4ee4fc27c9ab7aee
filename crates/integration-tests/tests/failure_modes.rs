//! Injected failures around a real SQLite session

mod common;

use common::{edit_42, order_42, service, TestDb};
use order_edit_core::domain::{IsolationLevel, TrailStatus};
use order_edit_core::port::session::mocks::{Fault, FaultySession};
use order_edit_core::port::Session;
use order_edit_core::AppError;

async fn faulty(db: &TestDb, fault: Fault) -> FaultySession {
    FaultySession::new(db.session(IsolationLevel::ReadCommitted).await, fault)
}

async fn assert_untouched(db: &TestDb) {
    let mut session = db.session(IsolationLevel::ReadCommitted).await;
    let order = service()
        .fetch_order(session.as_mut(), order_42())
        .await
        .unwrap();
    assert_eq!(order.header.address, "A");
    assert_eq!(order.line(1).unwrap().quantity, 5);
    assert_eq!(order.line(2).unwrap().quantity, 10);
}

#[tokio::test]
async fn test_line_failure_rolls_back_address_and_open_entry() {
    let db = TestDb::seeded().await;
    let mut session = faulty(&db, Fault::LineUpdate(2)).await;
    let request = edit_42().with_line(2, 7);

    let err = service()
        .edit_order(&mut session, &request, None)
        .await
        .unwrap_err();

    match &err {
        AppError::Transaction {
            reference,
            rollback_error,
            ..
        } => {
            assert!(reference.as_str().starts_with("G1-"));
            assert!(rollback_error.is_none());
        }
        other => panic!("expected transaction error, got {:?}", other),
    }
    assert!(!session.in_transaction());

    assert_untouched(&db).await;
    assert!(db.audit_rows().await.is_empty());
}

#[tokio::test]
async fn test_address_failure_rolls_back_open_entry() {
    let db = TestDb::seeded().await;
    let mut session = faulty(&db, Fault::AddressUpdate).await;

    let err = service()
        .edit_order(&mut session, &edit_42(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Transaction { .. }));
    assert_untouched(&db).await;
    assert!(db.audit_rows().await.is_empty());
}

#[tokio::test]
async fn test_rollback_failure_is_reported_with_cause() {
    let db = TestDb::seeded().await;
    // Rollback fault only: the edit itself fails through the abandoned gate
    let mut session = faulty(&db, Fault::Rollback).await;
    let (gate, handle) = order_edit_core::application::commit_gate();
    drop(handle);

    let err = service()
        .edit_order(&mut session, &edit_42(), Some(gate))
        .await
        .unwrap_err();

    match err {
        AppError::Transaction { rollback_error, .. } => assert!(rollback_error.is_some()),
        other => panic!("expected transaction error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_commit_failure_leaves_order_unchanged() {
    let db = TestDb::seeded().await;
    let mut session = faulty(&db, Fault::BusinessCommit).await;

    let err = service()
        .edit_order(&mut session, &edit_42(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Commit { .. }));
    assert!(!err.is_business_applied());
    assert!(!session.in_transaction());

    assert_untouched(&db).await;
    assert!(db.audit_rows().await.is_empty());
}

#[tokio::test]
async fn test_close_log_failure_keeps_business_changes() {
    let db = TestDb::seeded().await;
    let svc = service();
    let mut session = faulty(&db, Fault::CloseLog).await;

    let err = svc
        .edit_order(&mut session, &edit_42(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AuditLog { .. }));
    assert!(err.is_business_applied());
    assert!(!session.in_transaction());

    let mut reader = db.session(IsolationLevel::ReadCommitted).await;
    let order = svc.fetch_order(reader.as_mut(), order_42()).await.unwrap();
    assert_eq!(order.header.address, "B");
    assert_eq!(order.line(1).unwrap().quantity, 9);

    let rows = db.audit_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "O");
    assert_eq!(rows[0].1, err.reference().unwrap().as_str());

    let trails = svc.audit_trail(reader.as_mut(), order_42()).await.unwrap();
    assert_eq!(trails.len(), 1);
    assert_eq!(trails[0].status(), TrailStatus::Incomplete);
}

#[tokio::test]
async fn test_configure_failure_is_configuration_error() {
    let db = TestDb::seeded().await;
    let mut session = faulty(&db, Fault::ApplyIsolation).await;

    let err = service()
        .configure(&mut session, IsolationLevel::Snapshot)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Configuration {
            level: IsolationLevel::Snapshot,
            ..
        }
    ));
    assert_eq!(session.isolation_level(), IsolationLevel::ReadCommitted);
}
