//! Application service: the operations exposed over HTTP, on top of an
//! `InvoiceStore`.

use crate::models::{
    CreateInvoice, Invoice, InvoiceDetail, ListInvoicesFilter, Payment, RecordPayment,
};
use crate::services::ledger::{self, CloseAction};
use crate::services::metrics::{
    INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL, REJECTIONS_TOTAL,
};
use crate::services::store::{invoice_not_found, InvoiceStore};
use rust_decimal::prelude::ToPrimitive;
use service_core::error::AppError;
use service_core::extract::TenantContext;
use service_core::pagination::{Page, PageParams};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct InvoicingService {
    store: Arc<dyn InvoiceStore>,
}

fn note_rejection(operation: &'static str, err: &AppError) {
    if matches!(err, AppError::BadRequest(_) | AppError::BusinessRule(_)) {
        REJECTIONS_TOTAL
            .with_label_values(&[operation, err.code()])
            .inc();
        warn!(operation, error = %err, "Ledger rejected request");
    }
}

impl InvoicingService {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.store.health_check().await
    }

    pub async fn create_invoice(&self, input: CreateInvoice) -> Result<InvoiceDetail, AppError> {
        // Reject bad input before a number is allocated.
        if let Err(e) = ledger::compute_totals(&input) {
            let err = AppError::from(e);
            note_rejection("create_invoice", &err);
            return Err(err);
        }

        let detail = self.store.create_invoice(&input).await?;
        let invoice = &detail.invoice;

        INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        INVOICE_AMOUNT_TOTAL.inc_by(invoice.total_amount.to_f64().unwrap_or_default());

        info!(
            tenant_id = %invoice.tenant_id,
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok(detail)
    }

    pub async fn get_invoice(
        &self,
        tenant: TenantContext,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, AppError> {
        self.store
            .get_invoice(tenant.tenant_id, invoice_id)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))
    }

    pub async fn list_invoices(
        &self,
        tenant: TenantContext,
        filter: ListInvoicesFilter,
        page: PageParams,
    ) -> Result<Page<Invoice>, AppError> {
        self.store
            .list_invoices(tenant.tenant_id, &filter, page)
            .await
    }

    pub async fn delete_invoice(
        &self,
        tenant: TenantContext,
        invoice_id: Uuid,
    ) -> Result<(), AppError> {
        if !self
            .store
            .soft_delete_invoice(tenant.tenant_id, invoice_id)
            .await?
        {
            return Err(invoice_not_found(invoice_id));
        }

        info!(tenant_id = %tenant.tenant_id, invoice_id = %invoice_id, "Invoice deleted");
        Ok(())
    }

    pub async fn close_invoice(
        &self,
        tenant: TenantContext,
        invoice_id: Uuid,
        action: CloseAction,
    ) -> Result<Invoice, AppError> {
        let invoice = match self
            .store
            .close_invoice(tenant.tenant_id, invoice_id, action)
            .await
        {
            Ok(Some(invoice)) => invoice,
            Ok(None) => return Err(invoice_not_found(invoice_id)),
            Err(e) => {
                note_rejection("close_invoice", &e);
                return Err(e);
            }
        };

        INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        info!(
            tenant_id = %tenant.tenant_id,
            invoice_id = %invoice_id,
            status = %invoice.status,
            "Invoice closed"
        );

        Ok(invoice)
    }

    pub async fn record_payment(&self, input: RecordPayment) -> Result<Payment, AppError> {
        let applied = match self.store.record_payment(&input).await {
            Ok(applied) => applied,
            Err(e) => {
                note_rejection("record_payment", &e);
                return Err(e);
            }
        };
        let payment = applied.payment;

        PAYMENTS_TOTAL
            .with_label_values(&[payment.payment_method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL.inc_by(payment.amount.to_f64().unwrap_or_default());

        info!(
            tenant_id = %input.tenant_id,
            invoice_id = %input.invoice_id,
            payment_number = %payment.payment_number,
            amount = %payment.amount,
            balance = %applied.invoice.balance,
            status = %applied.invoice.status,
            "Payment applied"
        );

        Ok(payment)
    }

    pub async fn get_payment(
        &self,
        tenant: TenantContext,
        payment_id: Uuid,
    ) -> Result<Payment, AppError> {
        self.store
            .get_payment(tenant.tenant_id, payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id)))
    }

    pub async fn list_payments(
        &self,
        tenant: TenantContext,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        self.store
            .list_payments(tenant.tenant_id, invoice_id)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))
    }
}
