//! Invoice handlers. Every route is scoped to the caller's tenant.

use crate::dtos::{CreateInvoiceRequest, ListInvoicesQuery, PageQuery};
use crate::models::{Invoice, InvoiceDetail, ListInvoicesFilter, Payment};
use crate::services::ledger::CloseAction;
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

pub async fn create_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    tracing::info!(
        tenant_id = %tenant.tenant_id,
        customer_id = %payload.customer_id,
        items = payload.items.len(),
        "Creating invoice"
    );

    let detail = state
        .invoicing
        .create_invoice(payload.into_create(tenant))
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = state.invoicing.get_invoice(tenant, invoice_id).await?;
    Ok(Json(detail))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Page<Invoice>>, AppError> {
    let page = state
        .invoicing
        .list_invoices(tenant, query.filter(), query.page())
        .await?;
    Ok(Json(page))
}

pub async fn list_customer_invoices(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Invoice>>, AppError> {
    let filter = ListInvoicesFilter {
        customer_id: Some(customer_id),
        ..Default::default()
    };
    let page = state
        .invoicing
        .list_invoices(tenant, filter, query.params())
        .await?;
    Ok(Json(page))
}

pub async fn list_job_order_invoices(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(job_order_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Invoice>>, AppError> {
    let filter = ListInvoicesFilter {
        job_order_id: Some(job_order_id),
        ..Default::default()
    };
    let page = state
        .invoicing
        .list_invoices(tenant, filter, query.params())
        .await?;
    Ok(Json(page))
}

/// Soft delete; the invoice disappears from every read.
pub async fn delete_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.invoicing.delete_invoice(tenant, invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .invoicing
        .close_invoice(tenant, invoice_id, CloseAction::Cancel)
        .await?;
    Ok(Json(invoice))
}

pub async fn void_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .invoicing
        .close_invoice(tenant, invoice_id, CloseAction::Void)
        .await?;
    Ok(Json(invoice))
}

pub async fn list_invoice_payments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.invoicing.list_payments(tenant, invoice_id).await?;
    Ok(Json(payments))
}
