//! Property-based tests for the ledger's replay invariant.
//!
//! These drive randomized movement scripts through the real service stack
//! and check the invariants that must hold for every input: the quantity
//! always equals the signed sum of committed deltas, refused movements
//! leave no trace, and the previous/new chain never breaks.

mod common;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use stockledger_api::{
    entities::stock_movement::{self, Entity as StockMovement, MovementDirection, MovementType},
    errors::ServiceError,
    services::movements::RecordMovementCommand,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
enum Op {
    In(i32),
    Out(i32),
    AdjustUp(i32),
    AdjustDown(i32),
    Transfer(i32),
}

impl Op {
    fn delta(&self) -> i32 {
        match self {
            Op::In(q) | Op::AdjustUp(q) => *q,
            Op::Out(q) | Op::AdjustDown(q) | Op::Transfer(q) => -(*q),
        }
    }

    fn command(&self, product_id: Uuid, branch_id: Uuid) -> RecordMovementCommand {
        let (movement_type, direction, quantity) = match *self {
            Op::In(q) => (MovementType::In, None, q),
            Op::Out(q) => (MovementType::Out, None, q),
            Op::AdjustUp(q) => (
                MovementType::Adjustment,
                Some(MovementDirection::Increase),
                q,
            ),
            Op::AdjustDown(q) => (
                MovementType::Adjustment,
                Some(MovementDirection::Decrease),
                q,
            ),
            Op::Transfer(q) => (MovementType::Transfer, None, q),
        };
        RecordMovementCommand {
            product_id,
            branch_id,
            movement_type,
            direction,
            quantity,
            reason: "property script".into(),
            reference_number: None,
            notes: None,
            created_by: Uuid::new_v4(),
        }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    (0u8..5, 1i32..40).prop_map(|(kind, quantity)| match kind {
        0 => Op::In(quantity),
        1 => Op::Out(quantity),
        2 => Op::AdjustUp(quantity),
        3 => Op::AdjustDown(quantity),
        _ => Op::Transfer(quantity),
    })
}

proptest! {
    // Each case builds a fresh in-memory database, so keep the case count
    // low enough for the suite to stay fast
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn quantity_always_equals_signed_sum_of_committed_deltas(
        initial in 0i32..200,
        script in prop::collection::vec(op_strategy(), 1..25),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        rt.block_on(async move {
            let state = common::setup().await;
            let branch_id = Uuid::new_v4();
            let product = common::seed_product(&state, branch_id, "PROP-SKU", initial).await;

            let mut expected = initial;
            let mut committed = 0usize;
            for op in &script {
                let result = state
                    .movements
                    .record_movement(op.command(product.id, branch_id))
                    .await;
                match result {
                    Ok(movement) => {
                        committed += 1;
                        expected += op.delta();
                        prop_assert_eq!(movement.new_quantity, expected);
                        prop_assert_eq!(
                            movement.new_quantity - movement.previous_quantity,
                            op.delta()
                        );
                    }
                    Err(ServiceError::InsufficientStock(_)) => {
                        // Refused movements must leave both sides untouched
                        prop_assert!(expected + op.delta() < 0);
                    }
                    Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {}", e))),
                }
            }

            let final_quantity = state
                .catalog
                .get_quantity(branch_id, product.id)
                .await
                .expect("final read");
            prop_assert_eq!(final_quantity, expected);
            prop_assert!(final_quantity >= 0);

            // Replay the persisted ledger: the chain must be unbroken and
            // land exactly on the live quantity
            let rows = StockMovement::find()
                .filter(stock_movement::Column::ProductId.eq(product.id))
                .order_by_asc(stock_movement::Column::CreatedAt)
                .all(state.db.as_ref())
                .await
                .expect("ledger read");
            prop_assert_eq!(rows.len(), committed);
            let mut running = initial;
            for row in &rows {
                prop_assert_eq!(row.previous_quantity, running);
                running = row.new_quantity;
                prop_assert!(running >= 0);
            }
            prop_assert_eq!(running, final_quantity);
            Ok(())
        })?;
    }
}
