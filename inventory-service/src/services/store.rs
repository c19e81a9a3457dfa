//! Persistence seam for stock levels and movements.

use crate::models::{AdjustStock, AdjustmentResult, StockKey, StockLevel, StockMovement};
use async_trait::async_trait;
use service_core::error::AppError;
use service_core::pagination::{Page, PageParams};
use uuid::Uuid;

#[async_trait]
pub trait StockStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Apply one movement while holding the level exclusively, creating the
    /// level at zero if it does not exist. An insufficient-stock attempt is
    /// still recorded as a rejected movement before the error is returned.
    async fn adjust_stock(&self, input: &AdjustStock) -> Result<AdjustmentResult, AppError>;

    async fn get_level(&self, key: &StockKey) -> Result<Option<StockLevel>, AppError>;

    /// Newest first.
    async fn list_movements(
        &self,
        key: &StockKey,
        page: PageParams,
    ) -> Result<Page<StockMovement>, AppError>;

    /// Creates the level at zero if it does not exist.
    async fn set_reorder_level(
        &self,
        key: &StockKey,
        reorder_level: i32,
    ) -> Result<StockLevel, AppError>;

    /// Levels at or below their reorder level. `branch_id = None` spans
    /// every branch.
    async fn list_low_stock(
        &self,
        tenant_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<StockLevel>, AppError>;
}
