//! Stock arithmetic. Pure; stores call these while holding the level
//! exclusively.

use crate::models::{
    AdjustStock, AdjustmentResult, MovementOutcome, MovementType, StockLevel, StockMovement,
};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("{movement_type} quantity must be greater than zero")]
    NonPositiveQuantity { movement_type: MovementType },

    #[error("adjustment quantity must not be negative")]
    NegativeCount,

    #[error("reorder level must not be negative")]
    NegativeReorderLevel,

    #[error("quantity exceeds the largest supported stock level")]
    OutOfRange,

    #[error("insufficient stock: {available} on hand, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::InsufficientStock { .. } => AppError::BusinessRule(anyhow::Error::new(err)),
            _ => AppError::BadRequest(anyhow::Error::new(err)),
        }
    }
}

/// What a store must persist for one adjustment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    Applied(AdjustmentResult),
    /// The level stays as it was; only the movement is written, and the
    /// caller receives `error`.
    Rejected {
        movement: StockMovement,
        error: StockError,
    },
}

/// Input checks that do not depend on the current level.
pub fn check_quantity(movement_type: MovementType, quantity: i32) -> Result<(), StockError> {
    match movement_type {
        MovementType::In | MovementType::Out if quantity <= 0 => {
            Err(StockError::NonPositiveQuantity { movement_type })
        }
        MovementType::Adjustment if quantity < 0 => Err(StockError::NegativeCount),
        _ => Ok(()),
    }
}

/// The quantity a movement would leave on hand. May be negative; the caller
/// decides whether that is allowed.
pub fn resulting_quantity(
    current: i32,
    movement_type: MovementType,
    quantity: i32,
) -> Result<i32, StockError> {
    let next = match movement_type {
        MovementType::In => current.checked_add(quantity),
        MovementType::Out => current.checked_sub(quantity),
        MovementType::Adjustment => Some(quantity),
    };
    next.ok_or(StockError::OutOfRange)
}

/// Plan an adjustment of `level`. Errors are input errors that record
/// nothing; an insufficient-stock outcome comes back as `Rejected`.
pub fn plan(
    level: &StockLevel,
    input: &AdjustStock,
    now: DateTime<Utc>,
) -> Result<Adjustment, StockError> {
    check_quantity(input.movement_type, input.quantity)?;
    let previous = level.current_quantity;
    let next = resulting_quantity(previous, input.movement_type, input.quantity)?;

    let movement = |outcome| StockMovement {
        movement_id: Uuid::new_v4(),
        tenant_id: level.tenant_id,
        product_id: level.product_id,
        branch_id: level.branch_id,
        movement_type: input.movement_type,
        quantity: input.quantity,
        previous_quantity: previous,
        new_quantity: next,
        outcome,
        reference: input.reference.clone(),
        reason: input.reason.clone(),
        notes: input.notes.clone(),
        created_utc: now,
    };

    if next < 0 {
        return Ok(Adjustment::Rejected {
            movement: movement(MovementOutcome::Rejected),
            error: StockError::InsufficientStock {
                available: previous,
                requested: input.quantity,
            },
        });
    }

    let mut updated = level.clone();
    updated.current_quantity = next;
    updated.available_quantity = next - updated.reserved_quantity;
    updated.updated_utc = now;
    if input.movement_type == MovementType::In {
        updated.last_restocked_utc = Some(now);
    }

    Ok(Adjustment::Applied(AdjustmentResult {
        level: updated,
        movement: movement(MovementOutcome::Applied),
    }))
}

pub fn with_reorder_level(
    level: &StockLevel,
    reorder_level: i32,
    now: DateTime<Utc>,
) -> Result<StockLevel, StockError> {
    if reorder_level < 0 {
        return Err(StockError::NegativeReorderLevel);
    }
    let mut updated = level.clone();
    updated.reorder_level = reorder_level;
    updated.updated_utc = now;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockKey;

    fn level_with(current: i32) -> StockLevel {
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4(), Some(Uuid::new_v4()));
        let mut level = StockLevel::empty(key, Utc::now());
        level.current_quantity = current;
        level.available_quantity = current;
        level
    }

    fn adjust(level: &StockLevel, movement_type: MovementType, quantity: i32) -> AdjustStock {
        AdjustStock {
            tenant_id: level.tenant_id,
            product_id: level.product_id,
            branch_id: level.branch_id,
            movement_type,
            quantity,
            reference: Some("JO-1".to_string()),
            reason: None,
            notes: None,
        }
    }

    fn applied(adjustment: Adjustment) -> AdjustmentResult {
        match adjustment {
            Adjustment::Applied(result) => result,
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[test]
    fn receiving_stock_adds_and_marks_restock() {
        let level = level_with(5);
        let now = Utc::now();
        let result = applied(plan(&level, &adjust(&level, MovementType::In, 7), now).unwrap());

        assert_eq!(result.level.current_quantity, 12);
        assert_eq!(result.level.available_quantity, 12);
        assert_eq!(result.level.last_restocked_utc, Some(now));
        assert_eq!(result.movement.previous_quantity, 5);
        assert_eq!(result.movement.new_quantity, 12);
        assert_eq!(result.movement.outcome, MovementOutcome::Applied);
        assert_eq!(result.movement.reference.as_deref(), Some("JO-1"));
    }

    #[test]
    fn issuing_stock_subtracts_without_restock() {
        let level = level_with(5);
        let result = applied(plan(&level, &adjust(&level, MovementType::Out, 5), Utc::now()).unwrap());
        assert_eq!(result.level.current_quantity, 0);
        assert!(result.level.last_restocked_utc.is_none());
    }

    #[test]
    fn adjustment_sets_absolute_count() {
        let level = level_with(40);
        let result = applied(
            plan(&level, &adjust(&level, MovementType::Adjustment, 3), Utc::now()).unwrap(),
        );
        assert_eq!(result.level.current_quantity, 3);

        let result = applied(
            plan(&level, &adjust(&level, MovementType::Adjustment, 0), Utc::now()).unwrap(),
        );
        assert_eq!(result.level.current_quantity, 0);
    }

    #[test]
    fn issuing_more_than_on_hand_is_rejected() {
        let level = level_with(5);
        let adjustment = plan(&level, &adjust(&level, MovementType::Out, 10), Utc::now()).unwrap();

        let Adjustment::Rejected { movement, error } = adjustment else {
            panic!("expected rejection");
        };
        assert_eq!(movement.outcome, MovementOutcome::Rejected);
        assert_eq!(movement.previous_quantity, 5);
        assert_eq!(movement.new_quantity, -5);
        assert_eq!(
            error,
            StockError::InsufficientStock {
                available: 5,
                requested: 10
            }
        );
        assert!(matches!(AppError::from(error), AppError::BusinessRule(_)));
    }

    #[test]
    fn quantity_rules_depend_on_movement_type() {
        assert_eq!(
            check_quantity(MovementType::In, 0),
            Err(StockError::NonPositiveQuantity {
                movement_type: MovementType::In
            })
        );
        assert!(check_quantity(MovementType::Out, -3).is_err());
        assert_eq!(
            check_quantity(MovementType::Adjustment, -1),
            Err(StockError::NegativeCount)
        );
        assert!(check_quantity(MovementType::Adjustment, 0).is_ok());

        let level = level_with(1);
        let err = plan(&level, &adjust(&level, MovementType::In, 0), Utc::now()).unwrap_err();
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        assert_eq!(
            resulting_quantity(i32::MAX, MovementType::In, 1),
            Err(StockError::OutOfRange)
        );
        assert_eq!(resulting_quantity(0, MovementType::Out, i32::MAX), Ok(-i32::MAX));
    }

    #[test]
    fn reserved_stock_reduces_availability() {
        let mut level = level_with(10);
        level.reserved_quantity = 4;
        level.available_quantity = 6;
        level.reorder_level = 5;
        assert!(!level.is_low());

        let result = applied(plan(&level, &adjust(&level, MovementType::Out, 1), Utc::now()).unwrap());
        assert_eq!(result.level.available_quantity, 5);
        assert!(result.level.is_low());
    }

    #[test]
    fn reorder_level_must_not_be_negative() {
        let level = level_with(3);
        assert_eq!(
            with_reorder_level(&level, -1, Utc::now()),
            Err(StockError::NegativeReorderLevel)
        );
        let updated = with_reorder_level(&level, 8, Utc::now()).unwrap();
        assert_eq!(updated.reorder_level, 8);
        assert!(updated.is_low());
    }
}
