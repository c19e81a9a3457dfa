//! Stock handlers. Every route is scoped to the caller's tenant.

use crate::dtos::{AdjustStockRequest, BranchQuery, MovementsQuery, SetReorderLevelRequest};
use crate::models::{AdjustmentResult, StockLevel, StockMovement};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use service_core::extract::{TenantContext, ValidatedJson};
use service_core::pagination::Page;
use uuid::Uuid;

/// Apply an IN/OUT/ADJUSTMENT movement. Insufficient stock is a 400 and
/// leaves a rejected movement behind.
pub async fn adjust_stock(
    State(state): State<AppState>,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<AdjustStockRequest>,
) -> Result<(StatusCode, Json<AdjustmentResult>), AppError> {
    tracing::info!(
        tenant_id = %tenant.tenant_id,
        product_id = %payload.product_id,
        movement_type = %payload.movement_type,
        quantity = payload.quantity,
        "Adjusting stock"
    );

    let result = state
        .inventory
        .adjust_stock(payload.into_adjust(tenant))
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_stock_level(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<StockLevel>, AppError> {
    let level = state
        .inventory
        .get_stock_level(tenant, product_id, query.branch_id)
        .await?;
    Ok(Json(level))
}

pub async fn list_movements(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
    Query(query): Query<MovementsQuery>,
) -> Result<Json<Page<StockMovement>>, AppError> {
    let page = state
        .inventory
        .list_movements(tenant, product_id, query.branch_id, query.page())
        .await?;
    Ok(Json(page))
}

pub async fn set_reorder_level(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<SetReorderLevelRequest>,
) -> Result<Json<StockLevel>, AppError> {
    let level = state
        .inventory
        .set_reorder_level(tenant, product_id, payload.branch_id, payload.reorder_level)
        .await?;
    Ok(Json(level))
}

/// Levels whose available quantity is at or below the reorder level.
/// Without `branch_id` every branch is included.
pub async fn list_low_stock(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Vec<StockLevel>>, AppError> {
    let levels = state
        .inventory
        .list_low_stock(tenant, query.branch_id)
        .await?;
    Ok(Json(levels))
}
