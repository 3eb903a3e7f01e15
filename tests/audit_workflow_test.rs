mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use stockledger_api::{
    entities::stock_audit::AuditStatus,
    entities::stock_movement::MovementType,
    errors::ServiceError,
    services::audits::{CountItemCommand, CreateAuditCommand, ReconcileCommand},
    services::movements::RecordMovementCommand,
    AppState,
};
use uuid::Uuid;

fn audit_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
}

async fn create_audit(state: &AppState, branch_id: Uuid) -> stockledger_api::entities::stock_audit::Model {
    state
        .audits
        .create_audit(CreateAuditCommand {
            branch_id,
            audit_date: audit_date(),
            notes: Some("quarterly count".into()),
            created_by: Uuid::new_v4(),
        })
        .await
        .expect("audit created")
}

fn count(branch_id: Uuid, audit_id: Uuid, product_id: Uuid, actual: i32) -> CountItemCommand {
    CountItemCommand {
        branch_id,
        audit_id,
        product_id,
        actual_quantity: actual,
        counted_by: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn full_audit_cycle_counts_completes_and_reconciles() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "AMOX-500", 70).await;

    let audit = create_audit(&state, branch_id).await;
    assert_eq!(audit.status, "pending");
    assert_eq!(audit.total_items, 0);
    assert_eq!(audit.counted_items, 0);
    assert_eq!(audit.discrepancies, 0);

    // First count moves the audit to in_progress and snapshots expected=70
    let item = state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 65))
        .await
        .expect("count recorded");
    assert_eq!(item.expected_quantity, 70);
    assert_eq!(item.actual_quantity, 65);
    assert_eq!(item.difference, -5);

    let (audit_after_count, items) = state
        .audits
        .get_audit_with_items(branch_id, audit.id)
        .await
        .unwrap();
    assert_eq!(audit_after_count.status, "in_progress");
    assert_eq!(audit_after_count.counted_items, 1);
    assert_eq!(audit_after_count.total_items, 1);
    assert_eq!(audit_after_count.discrepancies, 1);
    assert_eq!(items.len(), 1);

    // Completing never touches the catalog by itself
    let completed = state
        .audits
        .complete_audit(branch_id, audit.id)
        .await
        .expect("audit completes");
    assert_eq!(completed.status, "completed");
    assert!(completed.completed_at.is_some());
    assert_eq!(
        state
            .catalog
            .get_quantity(branch_id, product.id)
            .await
            .unwrap(),
        70
    );

    // Reconciling emits the adjustment through the ledger
    let movement = state
        .audits
        .reconcile(ReconcileCommand {
            branch_id,
            audit_id: audit.id,
            product_id: product.id,
            created_by: Uuid::new_v4(),
        })
        .await
        .expect("reconcile commits");
    assert_eq!(movement.r#type, "adjustment");
    assert_eq!(movement.quantity, 5);
    assert_eq!(movement.previous_quantity, 70);
    assert_eq!(movement.new_quantity, 65);
    assert_eq!(
        state
            .catalog
            .get_quantity(branch_id, product.id)
            .await
            .unwrap(),
        65
    );

    // Each item reconciles at most once
    let err = state
        .audits
        .reconcile(ReconcileCommand {
            branch_id,
            audit_id: audit.id,
            product_id: product.id,
            created_by: Uuid::new_v4(),
        })
        .await
        .expect_err("second reconcile must fail");
    assert_matches!(err, ServiceError::AlreadyReconciled(_));
}

#[tokio::test]
async fn recount_replaces_the_prior_item() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "IBU-400", 50).await;

    let audit = create_audit(&state, branch_id).await;
    state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 48))
        .await
        .unwrap();
    let item = state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 50))
        .await
        .expect("recount recorded");
    assert_eq!(item.difference, 0);

    let (audit, items) = state
        .audits
        .get_audit_with_items(branch_id, audit.id)
        .await
        .unwrap();
    assert_eq!(items.len(), 1, "recount must replace, not duplicate");
    assert_eq!(audit.total_items, 1);
    assert_eq!(audit.counted_items, 1);
    assert_eq!(audit.discrepancies, 0, "replaced discrepancy must clear");
}

#[tokio::test]
async fn state_machine_rejects_invalid_transitions() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "PARA-500", 50).await;

    // complete() requires in_progress
    let audit = create_audit(&state, branch_id).await;
    assert_matches!(
        state
            .audits
            .complete_audit(branch_id, audit.id)
            .await
            .expect_err("pending audit cannot complete"),
        ServiceError::InvalidState(_)
    );

    // cancel() is final: no counts, no completion, no second cancel
    let cancelled = state
        .audits
        .cancel_audit(branch_id, audit.id)
        .await
        .expect("pending audit cancels");
    assert_eq!(cancelled.status, "cancelled");
    assert_matches!(
        state
            .audits
            .add_item(count(branch_id, audit.id, product.id, 10))
            .await
            .expect_err("cancelled audit accepts no counts"),
        ServiceError::InvalidState(_)
    );
    assert_matches!(
        state
            .audits
            .cancel_audit(branch_id, audit.id)
            .await
            .expect_err("cancel is terminal"),
        ServiceError::InvalidState(_)
    );

    // completed audits cannot be cancelled
    let audit = create_audit(&state, branch_id).await;
    state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 50))
        .await
        .unwrap();
    state
        .audits
        .complete_audit(branch_id, audit.id)
        .await
        .unwrap();
    assert_matches!(
        state
            .audits
            .cancel_audit(branch_id, audit.id)
            .await
            .expect_err("completed audit cannot be cancelled"),
        ServiceError::InvalidState(_)
    );

    // reconcile() requires completion
    let audit = create_audit(&state, branch_id).await;
    state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 45))
        .await
        .unwrap();
    assert_matches!(
        state
            .audits
            .reconcile(ReconcileCommand {
                branch_id,
                audit_id: audit.id,
                product_id: product.id,
                created_by: Uuid::new_v4(),
            })
            .await
            .expect_err("in-progress audit cannot reconcile"),
        ServiceError::InvalidState(_)
    );
}

#[tokio::test]
async fn reconcile_applies_difference_as_a_relative_delta() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "CLAR-250", 70).await;

    let audit = create_audit(&state, branch_id).await;
    // Count finds 5 missing while live quantity is 70
    state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 65))
        .await
        .unwrap();

    // A sale lands between the count and the reconciliation
    state
        .movements
        .record_movement(RecordMovementCommand {
            product_id: product.id,
            branch_id,
            movement_type: MovementType::Out,
            direction: None,
            quantity: 10,
            reason: "sale".into(),
            reference_number: None,
            notes: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    state
        .audits
        .complete_audit(branch_id, audit.id)
        .await
        .unwrap();
    let movement = state
        .audits
        .reconcile(ReconcileCommand {
            branch_id,
            audit_id: audit.id,
            product_id: product.id,
            created_by: Uuid::new_v4(),
        })
        .await
        .expect("reconcile commits");

    // The -5 difference applies on top of the intervening sale: 70-10-5
    assert_eq!(movement.previous_quantity, 60);
    assert_eq!(movement.new_quantity, 55);
    assert_matches!(
        movement.movement_type(),
        Some(MovementType::Adjustment)
    );
    assert_eq!(
        state
            .catalog
            .get_quantity(branch_id, product.id)
            .await
            .unwrap(),
        55
    );
}

#[tokio::test]
async fn reconcile_rejects_items_without_discrepancy() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "DICLO-50", 30).await;

    let audit = create_audit(&state, branch_id).await;
    state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 30))
        .await
        .unwrap();
    state
        .audits
        .complete_audit(branch_id, audit.id)
        .await
        .unwrap();

    assert_matches!(
        state
            .audits
            .reconcile(ReconcileCommand {
                branch_id,
                audit_id: audit.id,
                product_id: product.id,
                created_by: Uuid::new_v4(),
            })
            .await
            .expect_err("zero difference has nothing to reconcile"),
        ServiceError::ValidationError(_)
    );
}

#[tokio::test]
async fn reconcile_increase_direction_for_surplus_counts() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "VITD-5000", 40).await;

    let audit = create_audit(&state, branch_id).await;
    state
        .audits
        .add_item(count(branch_id, audit.id, product.id, 43))
        .await
        .unwrap();
    state
        .audits
        .complete_audit(branch_id, audit.id)
        .await
        .unwrap();
    let movement = state
        .audits
        .reconcile(ReconcileCommand {
            branch_id,
            audit_id: audit.id,
            product_id: product.id,
            created_by: Uuid::new_v4(),
        })
        .await
        .expect("surplus reconciles upward");

    assert_eq!(movement.delta(), 3);
    assert_eq!(
        state
            .catalog
            .get_quantity(branch_id, product.id)
            .await
            .unwrap(),
        43
    );
}

#[tokio::test]
async fn audits_are_branch_scoped() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let other_branch = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "KETO-30", 25).await;

    let audit = create_audit(&state, branch_id).await;
    assert_matches!(
        state
            .audits
            .get_audit(other_branch, audit.id)
            .await
            .expect_err("cross-branch audit read must fail"),
        ServiceError::NotFound(_)
    );
    assert_matches!(
        state
            .audits
            .add_item(count(other_branch, audit.id, product.id, 20))
            .await
            .expect_err("cross-branch count must fail"),
        ServiceError::NotFound(_)
    );

    let (listed, total) = state
        .audits
        .list_audits(other_branch, Some(AuditStatus::Pending), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(listed.is_empty());
}
