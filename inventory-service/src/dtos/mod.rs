//! Request bodies and query strings for the stock routes.

use crate::models::{AdjustStock, MovementType};
use serde::Deserialize;
use service_core::extract::TenantContext;
use service_core::pagination::PageParams;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    pub product_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub movement_type: MovementType,
    /// Per-type rules (positive for IN/OUT) are enforced by the service.
    #[validate(range(min = 0, message = "quantity must not be negative"))]
    pub quantity: i32,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl AdjustStockRequest {
    pub fn into_adjust(self, tenant: TenantContext) -> AdjustStock {
        AdjustStock {
            tenant_id: tenant.tenant_id,
            product_id: self.product_id,
            branch_id: self.branch_id,
            movement_type: self.movement_type,
            quantity: self.quantity,
            reference: self.reference,
            reason: self.reason,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetReorderLevelRequest {
    pub branch_id: Option<Uuid>,
    #[validate(range(min = 0, message = "reorder level must not be negative"))]
    pub reorder_level: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct BranchQuery {
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementsQuery {
    pub branch_id: Option<Uuid>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl MovementsQuery {
    pub fn page(&self) -> PageParams {
        PageParams::new(self.page, self.page_size)
    }
}
