//! Application service over a `StockStore`.

use crate::models::{
    AdjustStock, AdjustmentResult, MovementOutcome, StockKey, StockLevel, StockMovement,
};
use crate::services::adjustment::{self, StockError};
use crate::services::metrics::{STOCK_MOVEMENTS_TOTAL, STOCK_UNITS_TOTAL};
use crate::services::store::StockStore;
use service_core::error::AppError;
use service_core::extract::TenantContext;
use service_core::pagination::{Page, PageParams};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn StockStore>,
}

fn level_not_found(key: &StockKey) -> AppError {
    match key.branch_id {
        Some(branch_id) => AppError::NotFound(anyhow::anyhow!(
            "No stock level for product {} at branch {}",
            key.product_id,
            branch_id
        )),
        None => AppError::NotFound(anyhow::anyhow!(
            "No stock level for product {}",
            key.product_id
        )),
    }
}

impl InventoryService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.store.health_check().await
    }

    pub async fn adjust_stock(&self, input: AdjustStock) -> Result<AdjustmentResult, AppError> {
        // Malformed quantities never reach the movement log.
        adjustment::check_quantity(input.movement_type, input.quantity)?;

        match self.store.adjust_stock(&input).await {
            Ok(result) => {
                STOCK_MOVEMENTS_TOTAL
                    .with_label_values(&[
                        input.movement_type.as_str(),
                        MovementOutcome::Applied.as_str(),
                    ])
                    .inc();
                STOCK_UNITS_TOTAL
                    .with_label_values(&[input.movement_type.as_str()])
                    .inc_by(f64::from(input.quantity));

                info!(
                    tenant_id = %input.tenant_id,
                    product_id = %input.product_id,
                    branch_id = ?input.branch_id,
                    movement_type = %input.movement_type,
                    quantity = input.quantity,
                    previous_quantity = result.movement.previous_quantity,
                    new_quantity = result.level.current_quantity,
                    "Stock adjusted"
                );
                Ok(result)
            }
            Err(e) => {
                if matches!(e, AppError::BusinessRule(_)) {
                    STOCK_MOVEMENTS_TOTAL
                        .with_label_values(&[
                            input.movement_type.as_str(),
                            MovementOutcome::Rejected.as_str(),
                        ])
                        .inc();
                    warn!(
                        tenant_id = %input.tenant_id,
                        product_id = %input.product_id,
                        movement_type = %input.movement_type,
                        quantity = input.quantity,
                        error = %e,
                        "Stock adjustment rejected"
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn get_stock_level(
        &self,
        tenant: TenantContext,
        product_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Result<StockLevel, AppError> {
        let key = StockKey::new(tenant.tenant_id, product_id, branch_id);
        self.store
            .get_level(&key)
            .await?
            .ok_or_else(|| level_not_found(&key))
    }

    pub async fn list_movements(
        &self,
        tenant: TenantContext,
        product_id: Uuid,
        branch_id: Option<Uuid>,
        page: PageParams,
    ) -> Result<Page<StockMovement>, AppError> {
        let key = StockKey::new(tenant.tenant_id, product_id, branch_id);
        self.store.list_movements(&key, page).await
    }

    pub async fn set_reorder_level(
        &self,
        tenant: TenantContext,
        product_id: Uuid,
        branch_id: Option<Uuid>,
        reorder_level: i32,
    ) -> Result<StockLevel, AppError> {
        if reorder_level < 0 {
            return Err(StockError::NegativeReorderLevel.into());
        }

        let key = StockKey::new(tenant.tenant_id, product_id, branch_id);
        let level = self.store.set_reorder_level(&key, reorder_level).await?;

        info!(
            tenant_id = %tenant.tenant_id,
            product_id = %product_id,
            branch_id = ?branch_id,
            reorder_level,
            "Reorder level updated"
        );
        Ok(level)
    }

    pub async fn list_low_stock(
        &self,
        tenant: TenantContext,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<StockLevel>, AppError> {
        self.store.list_low_stock(tenant.tenant_id, branch_id).await
    }
}
