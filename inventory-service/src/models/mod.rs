//! Domain models for inventory-service.

mod stock;

pub use stock::{
    AdjustStock, AdjustmentResult, MovementOutcome, MovementType, StockKey, StockLevel,
    StockMovement,
};

/// A stored enum value that is not part of the closed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
