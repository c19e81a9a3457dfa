//! Stock level and movement models.

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Receive stock: `current += quantity`.
    In,
    /// Issue stock: `current -= quantity`.
    Out,
    /// Physical count: `current = quantity`.
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            other => Err(UnknownVariant::new("movement type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementOutcome {
    Applied,
    Rejected,
}

impl MovementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementOutcome::Applied => "APPLIED",
            MovementOutcome::Rejected => "REJECTED",
        }
    }
}

impl FromStr for MovementOutcome {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPLIED" => Ok(MovementOutcome::Applied),
            "REJECTED" => Ok(MovementOutcome::Rejected),
            other => Err(UnknownVariant::new("movement outcome", other)),
        }
    }
}

/// Identity of a stock level. A missing branch is a key of its own, not a
/// wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Option<Uuid>,
}

impl StockKey {
    pub fn new(tenant_id: Uuid, product_id: Uuid, branch_id: Option<Uuid>) -> Self {
        Self {
            tenant_id,
            product_id,
            branch_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub current_quantity: i32,
    pub reserved_quantity: i32,
    /// `current_quantity - reserved_quantity`.
    pub available_quantity: i32,
    pub reorder_level: i32,
    pub last_restocked_utc: Option<DateTime<Utc>>,
    pub updated_utc: DateTime<Utc>,
}

impl StockLevel {
    /// A level that has never been touched: everything at zero.
    pub fn empty(key: StockKey, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: key.tenant_id,
            product_id: key.product_id,
            branch_id: key.branch_id,
            current_quantity: 0,
            reserved_quantity: 0,
            available_quantity: 0,
            reorder_level: 0,
            last_restocked_utc: None,
            updated_utc: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.product_id, self.branch_id)
    }

    pub fn is_low(&self) -> bool {
        self.available_quantity <= self.reorder_level
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub previous_quantity: i32,
    /// The quantity the movement would produce, even when rejected.
    pub new_quantity: i32,
    pub outcome: MovementOutcome,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AdjustStock {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl AdjustStock {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.product_id, self.branch_id)
    }
}

/// An applied adjustment: the updated level and its movement record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentResult {
    pub level: StockLevel,
    pub movement: StockMovement,
}
