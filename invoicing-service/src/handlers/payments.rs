//! Payment handlers.

use crate::dtos::RecordPaymentRequest;
use crate::models::Payment;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use service_core::extract::{TenantContext, ValidatedJson};
use uuid::Uuid;

/// Apply a payment to an invoice.
pub async fn record_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    tracing::info!(
        tenant_id = %tenant.tenant_id,
        invoice_id = %payload.invoice_id,
        amount = %payload.amount,
        payment_method = payload.payment_method.as_str(),
        "Recording payment"
    );

    let payment = state
        .invoicing
        .record_payment(payload.into_record(tenant))
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state.invoicing.get_payment(tenant, payment_id).await?;
    Ok(Json(payment))
}
