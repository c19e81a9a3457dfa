//! Persistence seam for the ledger.
//!
//! Every method takes the tenant explicitly; implementations must never
//! return or touch another tenant's rows, and must treat soft-deleted
//! invoices as absent.

use crate::models::{
    CreateInvoice, Invoice, InvoiceDetail, ListInvoicesFilter, Payment, PaymentApplied,
    RecordPayment,
};
use crate::services::ledger::CloseAction;
use async_trait::async_trait;
use service_core::error::AppError;
use service_core::pagination::{Page, PageParams};
use uuid::Uuid;

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Allocate the invoice number and persist the invoice with its items
    /// atomically.
    async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError>;

    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError>;

    /// Newest first.
    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &ListInvoicesFilter,
        page: PageParams,
    ) -> Result<Page<Invoice>, AppError>;

    /// Returns `false` when there was no live invoice to delete.
    async fn soft_delete_invoice(&self, tenant_id: Uuid, invoice_id: Uuid)
        -> Result<bool, AppError>;

    async fn close_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        action: CloseAction,
    ) -> Result<Option<Invoice>, AppError>;

    /// Validate and apply a payment while holding the invoice exclusively.
    /// Fails with `NotFound` for an unknown or deleted invoice.
    async fn record_payment(&self, input: &RecordPayment) -> Result<PaymentApplied, AppError>;

    async fn get_payment(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError>;

    /// `None` when the invoice is unknown or deleted.
    async fn list_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Vec<Payment>>, AppError>;
}

pub(crate) fn invoice_not_found(invoice_id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
}
