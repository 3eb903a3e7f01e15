mod common;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use stockledger_api::{
    entities::stock_movement::MovementType,
    services::audits::{CountItemCommand, CreateAuditCommand},
    services::movements::RecordMovementCommand,
};
use uuid::Uuid;

#[tokio::test]
async fn stats_reflect_committed_state_per_branch() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let other_branch = Uuid::new_v4();

    // unit_price is 12.50 throughout the seed helper
    let healthy = common::seed_product_with_levels(&state, branch_id, "AMOX-500", 100, 10).await;
    let low = common::seed_product_with_levels(&state, branch_id, "IBU-200", 5, 10).await;
    let _empty = common::seed_product_with_levels(&state, branch_id, "PARA-650", 0, 10).await;
    let _foreign = common::seed_product_with_levels(&state, other_branch, "AMOX-500", 999, 10).await;

    state
        .movements
        .record_movement(RecordMovementCommand {
            product_id: healthy.id,
            branch_id,
            movement_type: MovementType::Out,
            direction: None,
            quantity: 20,
            reason: "sale".into(),
            reference_number: None,
            notes: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let _pending_audit = state
        .audits
        .create_audit(CreateAuditCommand {
            branch_id,
            audit_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            notes: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let completed_audit = state
        .audits
        .create_audit(CreateAuditCommand {
            branch_id,
            audit_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            notes: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();
    state
        .audits
        .add_item(CountItemCommand {
            branch_id,
            audit_id: completed_audit.id,
            product_id: low.id,
            actual_quantity: 5,
            counted_by: Uuid::new_v4(),
        })
        .await
        .unwrap();
    state
        .audits
        .complete_audit(branch_id, completed_audit.id)
        .await
        .unwrap();

    let stats = state.stats.get_stats(branch_id, None, None).await.unwrap();

    assert_eq!(stats.total_products, 3);
    assert_eq!(stats.active_products, 3);
    assert_eq!(stats.low_stock_products, 1);
    assert_eq!(stats.out_of_stock_products, 1);
    // 80 * 12.50 + 5 * 12.50 + 0 * 12.50
    assert_eq!(stats.total_stock_value, Decimal::new(106250, 2));
    assert_eq!(stats.movements_recorded, 1);
    assert_eq!(stats.pending_audits, 1);
    assert_eq!(stats.completed_audits, 1);

    // The other branch sees only its own product and no activity
    let foreign_stats = state
        .stats
        .get_stats(other_branch, None, None)
        .await
        .unwrap();
    assert_eq!(foreign_stats.total_products, 1);
    assert_eq!(foreign_stats.movements_recorded, 0);
    assert_eq!(foreign_stats.pending_audits, 0);
    assert_eq!(foreign_stats.completed_audits, 0);
}

#[tokio::test]
async fn movement_window_bounds_the_count() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let product = common::seed_product(&state, branch_id, "OME-20", 50).await;

    state
        .movements
        .record_movement(RecordMovementCommand {
            product_id: product.id,
            branch_id,
            movement_type: MovementType::Out,
            direction: None,
            quantity: 5,
            reason: "sale".into(),
            reference_number: None,
            notes: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let now = Utc::now();
    let in_window = state
        .stats
        .get_stats(branch_id, Some(now - Duration::hours(1)), Some(now + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(in_window.movements_recorded, 1);

    let stale_window = state
        .stats
        .get_stats(
            branch_id,
            Some(now - Duration::hours(3)),
            Some(now - Duration::hours(2)),
        )
        .await
        .unwrap();
    assert_eq!(stale_window.movements_recorded, 0);
}

#[tokio::test]
async fn cancelled_audits_are_excluded_from_audit_counts() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();

    let audit = state
        .audits
        .create_audit(CreateAuditCommand {
            branch_id,
            audit_date: NaiveDate::from_ymd_opt(2025, 3, 16).unwrap(),
            notes: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();
    state.audits.cancel_audit(branch_id, audit.id).await.unwrap();

    let stats = state.stats.get_stats(branch_id, None, None).await.unwrap();
    assert_eq!(stats.pending_audits, 0);
    assert_eq!(stats.completed_audits, 0);
}

#[tokio::test]
async fn low_stock_listing_matches_the_projection() {
    let state = common::setup().await;
    let branch_id = Uuid::new_v4();
    let _healthy = common::seed_product_with_levels(&state, branch_id, "ASP-100", 100, 10).await;
    let low = common::seed_product_with_levels(&state, branch_id, "ASP-300", 3, 10).await;
    let _empty = common::seed_product_with_levels(&state, branch_id, "ASP-500", 0, 10).await;

    let (items, total) = state
        .catalog
        .list_low_stock(branch_id, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1, "out-of-stock products are not low stock");
    assert_eq!(items[0].id, low.id);

    let stats = state.stats.get_stats(branch_id, None, None).await.unwrap();
    assert_eq!(stats.low_stock_products, total);
}
