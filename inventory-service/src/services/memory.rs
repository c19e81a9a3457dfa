//! In-process `StockStore` for local development and tests.

use crate::models::{AdjustStock, AdjustmentResult, StockKey, StockLevel, StockMovement};
use crate::services::adjustment::{self, Adjustment};
use crate::services::store::StockStore;
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use service_core::pagination::{Page, PageParams};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct InventoryState {
    levels: HashMap<StockKey, StockLevel>,
    /// Append-only, oldest first.
    movements: Vec<StockMovement>,
}

impl InventoryState {
    fn level_or_empty(&self, key: StockKey) -> StockLevel {
        self.levels
            .get(&key)
            .cloned()
            .unwrap_or_else(|| StockLevel::empty(key, Utc::now()))
    }
}

#[derive(Default)]
pub struct MemoryStockStore {
    state: Mutex<InventoryState>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn adjust_stock(&self, input: &AdjustStock) -> Result<AdjustmentResult, AppError> {
        let mut state = self.state.lock().await;
        let current = state.level_or_empty(input.key());

        match adjustment::plan(&current, input, Utc::now())? {
            Adjustment::Applied(result) => {
                state.levels.insert(input.key(), result.level.clone());
                state.movements.push(result.movement.clone());
                Ok(result)
            }
            Adjustment::Rejected { movement, error } => {
                // First touch still creates the level, as it does in Postgres.
                state.levels.entry(input.key()).or_insert(current);
                state.movements.push(movement);
                Err(error.into())
            }
        }
    }

    async fn get_level(&self, key: &StockKey) -> Result<Option<StockLevel>, AppError> {
        let state = self.state.lock().await;
        Ok(state.levels.get(key).cloned())
    }

    async fn list_movements(
        &self,
        key: &StockKey,
        page: PageParams,
    ) -> Result<Page<StockMovement>, AppError> {
        let state = self.state.lock().await;
        let movements: Vec<StockMovement> = state
            .movements
            .iter()
            .rev()
            .filter(|m| {
                m.tenant_id == key.tenant_id
                    && m.product_id == key.product_id
                    && m.branch_id == key.branch_id
            })
            .cloned()
            .collect();
        Ok(Page::from_vec(movements, page))
    }

    async fn set_reorder_level(
        &self,
        key: &StockKey,
        reorder_level: i32,
    ) -> Result<StockLevel, AppError> {
        let mut state = self.state.lock().await;
        let current = state.level_or_empty(*key);
        let updated = adjustment::with_reorder_level(&current, reorder_level, Utc::now())?;
        state.levels.insert(*key, updated.clone());
        Ok(updated)
    }

    async fn list_low_stock(
        &self,
        tenant_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<StockLevel>, AppError> {
        let state = self.state.lock().await;
        let mut levels: Vec<StockLevel> = state
            .levels
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .filter(|l| branch_id.is_none() || l.branch_id == branch_id)
            .filter(|l| l.is_low())
            .cloned()
            .collect();
        levels.sort_by_key(|l| (l.product_id, l.branch_id));
        Ok(levels)
    }
}
