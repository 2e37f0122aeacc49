use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    AddItemCmd, AssignCmd, AuditIssue, CreateBillCmd, Engine, EngineError, Money,
    PaymentListFilter, PaymentMethod, PaymentState, PaymentStatus, RecordPaymentCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Bill of 124.00 with payer "alice", participants "bob" and "carol", and a
/// Pizza item (18.99 × 2) fully claimed by bob.
async fn bill_with_bob_claim(engine: &Engine) -> (Uuid, Uuid) {
    let bill = engine
        .create_bill(CreateBillCmd::new(
            "Dinner",
            "alice",
            Money::new(100_00),
            Money::new(8_00),
            Money::new(16_00),
            Money::new(124_00),
            Utc::now(),
        ))
        .await
        .unwrap();
    for member in ["bob", "carol"] {
        engine
            .add_participant(bill.id, member, "alice", Utc::now())
            .await
            .unwrap();
    }
    let item = engine
        .add_line_item(AddItemCmd::new(
            bill.id,
            "alice",
            "Pizza",
            Money::new(18_99),
            2,
        ))
        .await
        .unwrap();
    engine
        .assign(AssignCmd::new(
            bill.id,
            item.id,
            "bob",
            2,
            Money::new(37_98),
            Utc::now(),
        ))
        .await
        .unwrap();
    (bill.id, item.id)
}

#[tokio::test]
async fn recompute_folds_assignments_into_owed_totals() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let rows = engine.recompute_balances(bill_id, "alice").await.unwrap();
    assert_eq!(rows.len(), 3);

    let bob = rows.iter().find(|r| r.user_id == "bob").unwrap();
    assert_eq!(bob.total_owed, Money::new(37_98));
    assert_eq!(bob.amount_paid, Money::ZERO);
    assert_eq!(bob.balance_remaining, Money::new(37_98));
    assert_eq!(bob.payment_status, PaymentStatus::Pending);

    // Participants with no claims owe nothing.
    let carol = rows.iter().find(|r| r.user_id == "carol").unwrap();
    assert_eq!(carol.total_owed, Money::ZERO);
    assert_eq!(carol.balance_remaining, Money::ZERO);
}

#[tokio::test]
async fn recompute_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let first = engine.recompute_balances(bill_id, "alice").await.unwrap();
    let second = engine.recompute_balances(bill_id, "alice").await.unwrap();
    assert_eq!(first, second);

    let listed = engine.list_balances(bill_id, "alice").await.unwrap();
    assert_eq!(listed, second);
}

#[tokio::test]
async fn balance_identity_holds_after_every_fold() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let payment = engine
        .record_payment(
            RecordPaymentCmd::new(bill_id, "bob", Money::new(10_00), Utc::now())
                .method(PaymentMethod::Mobile),
        )
        .await
        .unwrap();
    engine
        .complete_payment(bill_id, payment.id, "bob", Utc::now())
        .await
        .unwrap();

    let rows = engine.recompute_balances(bill_id, "alice").await.unwrap();
    for row in rows {
        assert_eq!(
            row.balance_remaining,
            row.total_owed.saturating_remainder(row.amount_paid)
        );
    }
}

#[tokio::test]
async fn pending_payments_do_not_count() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "bob",
            Money::new(37_98),
            Utc::now(),
        ))
        .await
        .unwrap();

    let bob = engine
        .participant_balance(bill_id, "bob", "alice")
        .await
        .unwrap();
    assert_eq!(bob.amount_paid, Money::ZERO);
    assert_eq!(bob.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn completed_payment_settles_the_sender() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let payment = engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "bob",
            Money::new(37_98),
            Utc::now(),
        ))
        .await
        .unwrap();
    let balance = engine
        .complete_payment(bill_id, payment.id, "bob", Utc::now())
        .await
        .unwrap();

    assert_eq!(balance.amount_paid, Money::new(37_98));
    assert_eq!(balance.balance_remaining, Money::ZERO);
    assert_eq!(balance.payment_status, PaymentStatus::Paid);

    // The single-row fold and the full recompute agree.
    let rows = engine.recompute_balances(bill_id, "alice").await.unwrap();
    let bob = rows.iter().find(|r| r.user_id == "bob").unwrap();
    assert_eq!(*bob, balance);
}

#[tokio::test]
async fn partial_payment_marks_the_row_partial() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let payment = engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "bob",
            Money::new(10_00),
            Utc::now(),
        ))
        .await
        .unwrap();
    let balance = engine
        .complete_payment(bill_id, payment.id, "bob", Utc::now())
        .await
        .unwrap();

    assert_eq!(balance.payment_status, PaymentStatus::Partial);
    assert_eq!(balance.balance_remaining, Money::new(27_98));
}

#[tokio::test]
async fn payment_transitions_are_one_directional() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let payment = engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "bob",
            Money::new(37_98),
            Utc::now(),
        ))
        .await
        .unwrap();
    engine
        .complete_payment(bill_id, payment.id, "bob", Utc::now())
        .await
        .unwrap();

    let err = engine
        .cancel_payment(bill_id, payment.id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));

    let cancelled = engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "carol",
            Money::new(5_00),
            Utc::now(),
        ))
        .await
        .unwrap();
    engine
        .cancel_payment(bill_id, cancelled.id, "carol")
        .await
        .unwrap();
    let err = engine
        .complete_payment(bill_id, cancelled.id, "carol", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));
}

#[tokio::test]
async fn idempotency_key_returns_the_existing_payment() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    let first = engine
        .record_payment(
            RecordPaymentCmd::new(bill_id, "bob", Money::new(37_98), Utc::now())
                .idempotency_key("bob-settles-up"),
        )
        .await
        .unwrap();
    let second = engine
        .record_payment(
            RecordPaymentCmd::new(bill_id, "bob", Money::new(37_98), Utc::now())
                .idempotency_key("bob-settles-up"),
        )
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let payments = engine
        .list_payments(bill_id, "alice", 10, &PaymentListFilter::default())
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
}

#[tokio::test]
async fn payments_paginate_newest_first() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, _item_id) = bill_with_bob_claim(&engine).await;

    for _ in 0..5 {
        engine
            .record_payment(RecordPaymentCmd::new(
                bill_id,
                "bob",
                Money::new(1_00),
                Utc::now(),
            ))
            .await
            .unwrap();
    }

    let (page, cursor) = engine
        .list_payments_page(bill_id, "alice", 2, None, &PaymentListFilter::default())
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    let cursor = cursor.expect("more pages expected");

    let (rest, _next) = engine
        .list_payments_page(
            bill_id,
            "alice",
            10,
            Some(cursor),
            &PaymentListFilter::default(),
        )
        .await
        .unwrap();
    assert_eq!(rest.len(), 3);

    let mut seen: Vec<Uuid> = page.iter().chain(rest.iter()).map(|p| p.id).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5, "pages must not overlap");

    let filtered = engine
        .list_payments(
            bill_id,
            "alice",
            10,
            &PaymentListFilter {
                states: Some(vec![PaymentState::Completed]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(filtered.is_empty());
}

#[tokio::test]
async fn settle_requires_everyone_paid_and_freezes_the_bill() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, item_id) = bill_with_bob_claim(&engine).await;

    let err = engine.settle_bill(bill_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));

    let payment = engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "bob",
            Money::new(37_98),
            Utc::now(),
        ))
        .await
        .unwrap();
    engine
        .complete_payment(bill_id, payment.id, "bob", Utc::now())
        .await
        .unwrap();

    // An unclaimed item does not block settlement; nobody owes for it.
    let beer = engine
        .add_line_item(AddItemCmd::new(
            bill_id,
            "alice",
            "Beer",
            Money::new(6_00),
            4,
        ))
        .await
        .unwrap();

    engine.settle_bill(bill_id, "alice").await.unwrap();

    // A settled bill is immutable, even with pool capacity left.
    let err = engine
        .assign(AssignCmd::new(
            bill_id,
            beer.id,
            "carol",
            1,
            Money::new(6_00),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));

    let err = engine.settle_bill(bill_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));
    let _ = item_id;
}

#[tokio::test]
async fn removing_an_item_cascades_claims_and_refolds() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, item_id) = bill_with_bob_claim(&engine).await;

    engine
        .remove_line_item(bill_id, item_id, "alice")
        .await
        .unwrap();

    let assignments = engine.list_assignments(bill_id, "alice").await.unwrap();
    assert!(assignments.is_empty());

    let bob = engine
        .participant_balance(bill_id, "bob", "alice")
        .await
        .unwrap();
    assert_eq!(bob.total_owed, Money::ZERO);
    assert_eq!(bob.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn create_bill_rejects_totals_that_do_not_reconcile() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_bill(CreateBillCmd::new(
            "Dinner",
            "alice",
            Money::new(100_00),
            Money::new(8_00),
            Money::new(16_00),
            Money::new(124_50),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::TotalMismatch {
            expected: Money::new(124_00),
            actual: Money::new(124_50),
        }
    );
}

#[tokio::test]
async fn audit_reports_partial_assignment_as_a_warning() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, item_id) = bill_with_bob_claim(&engine).await;

    // A second, half-claimed item.
    let beer = engine
        .add_line_item(AddItemCmd::new(
            bill_id,
            "alice",
            "Beer",
            Money::new(6_00),
            4,
        ))
        .await
        .unwrap();
    engine
        .assign(AssignCmd::new(
            bill_id,
            beer.id,
            "carol",
            2,
            Money::new(12_00),
            Utc::now(),
        ))
        .await
        .unwrap();

    let report = engine
        .audit_consistency(bill_id, "alice", Utc::now())
        .await
        .unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.errors().count(), 0);
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        warnings[0],
        AuditIssue::PartiallyAssigned {
            item_id: id,
            assigned: 2,
            total_quantity: 4,
        } if *id == beer.id
    ));
    let _ = item_id;
}

#[tokio::test]
async fn audit_flags_corrupted_rows_without_stopping() {
    let (engine, db) = engine_with_db().await;
    let (bill_id, item_id) = bill_with_bob_claim(&engine).await;

    // Corrupt the stored amount and the pool counter behind the engine's
    // back; the auditor must report both findings.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE assignments SET assigned_amount_minor = assigned_amount_minor + 100 \
         WHERE bill_id = ?",
        vec![bill_id.to_string().into()],
    ))
    .await
    .unwrap();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE line_items SET reserved_quantity = 5 WHERE id = ?",
        vec![item_id.to_string().into()],
    ))
    .await
    .unwrap();

    let report = engine
        .audit_consistency(bill_id, "alice", Utc::now())
        .await
        .unwrap();
    assert!(!report.is_consistent());

    let has_amount_mismatch = report.issues.iter().any(|issue| {
        matches!(
            issue,
            AuditIssue::AmountMismatch {
                expected,
                stored,
                ..
            } if *expected == Money::new(37_98) && *stored == Money::new(38_98)
        )
    });
    let has_pool_drift = report.issues.iter().any(|issue| {
        matches!(
            issue,
            AuditIssue::PoolDrift {
                item_id: id,
                reserved_quantity: 5,
                assigned: 2,
            } if *id == item_id
        )
    });
    assert!(has_amount_mismatch);
    assert!(has_pool_drift);
}

#[tokio::test]
async fn audit_flags_over_assignment_injected_behind_the_engine() {
    let (engine, db) = engine_with_db().await;
    let (bill_id, item_id) = bill_with_bob_claim(&engine).await;

    // Inject a rogue claim that bypasses the pool entirely.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO assignments \
         (id, item_id, bill_id, user_id, quantity, assigned_amount_minor, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            Uuid::new_v4().to_string().into(),
            item_id.to_string().into(),
            bill_id.to_string().into(),
            "carol".into(),
            3_i64.into(),
            56_97_i64.into(),
            Utc::now().into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();

    let report = engine
        .audit_consistency(bill_id, "alice", Utc::now())
        .await
        .unwrap();
    assert!(!report.is_consistent());
    assert!(report.issues.iter().any(|issue| {
        matches!(
            issue,
            AuditIssue::OverAssigned {
                item_id: id,
                assigned: 5,
                total_quantity: 2,
            } if *id == item_id
        )
    }));
}

#[tokio::test]
async fn cancelled_bill_rejects_further_writes() {
    let (engine, _db) = engine_with_db().await;
    let (bill_id, item_id) = bill_with_bob_claim(&engine).await;

    let beer = engine
        .add_line_item(AddItemCmd::new(
            bill_id,
            "alice",
            "Beer",
            Money::new(6_00),
            4,
        ))
        .await
        .unwrap();

    engine.cancel_bill(bill_id, "alice").await.unwrap();

    let err = engine
        .assign(AssignCmd::new(
            bill_id,
            beer.id,
            "carol",
            1,
            Money::new(6_00),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));
    let _ = item_id;

    let err = engine
        .record_payment(RecordPaymentCmd::new(
            bill_id,
            "bob",
            Money::new(1_00),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));
}
