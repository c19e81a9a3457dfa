//! In-process `InvoiceStore` for local development and tests.
//!
//! A single mutex serializes writers, so numbering and balance updates see
//! a consistent snapshot the same way the Postgres store's row locks do.

use crate::models::{
    CreateInvoice, Invoice, InvoiceDetail, ListInvoicesFilter, Payment, PaymentApplied,
    RecordPayment,
};
use crate::services::ledger::{self, CloseAction};
use crate::services::numbering::{self, NumberPrefix};
use crate::services::store::{invoice_not_found, InvoiceStore};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use service_core::pagination::{Page, PageParams};
use service_core::soft_delete::{live, SoftDeletable};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct LedgerState {
    invoices: HashMap<Uuid, InvoiceDetail>,
}

impl LedgerState {
    fn live_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> Option<&InvoiceDetail> {
        self.invoices
            .get(&invoice_id)
            .filter(|d| d.invoice.tenant_id == tenant_id && !d.is_deleted())
    }

    fn live_invoice_mut(
        &mut self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Option<&mut InvoiceDetail> {
        self.invoices
            .get_mut(&invoice_id)
            .filter(|d| d.invoice.tenant_id == tenant_id && !d.is_deleted())
    }

    /// Numbers are unique per tenant, so deleted records still count.
    fn next_invoice_number(&self, tenant_id: Uuid, day: NaiveDate) -> String {
        let existing = self
            .invoices
            .values()
            .filter(|d| d.invoice.tenant_id == tenant_id)
            .map(|d| d.invoice.invoice_number.as_str());
        numbering::next_after(existing, NumberPrefix::Invoice, day)
    }

    fn next_payment_number(&self, tenant_id: Uuid, day: NaiveDate) -> String {
        let existing = self
            .invoices
            .values()
            .filter(|d| d.invoice.tenant_id == tenant_id)
            .flat_map(|d| d.payments.iter())
            .map(|p| p.payment_number.as_str());
        numbering::next_after(existing, NumberPrefix::Payment, day)
    }
}

#[derive(Default)]
pub struct MemoryInvoiceStore {
    state: Mutex<LedgerState>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let number = state.next_invoice_number(input.tenant_id, now.date_naive());
        let detail = ledger::draft_invoice(input, number, now)?;
        state
            .invoices
            .insert(detail.invoice.invoice_id, detail.clone());
        Ok(detail)
    }

    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let state = self.state.lock().await;
        let found = state
            .invoices
            .get(&invoice_id)
            .filter(|d| d.invoice.tenant_id == tenant_id)
            .cloned();
        Ok(live(found))
    }

    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &ListInvoicesFilter,
        page: PageParams,
    ) -> Result<Page<Invoice>, AppError> {
        let state = self.state.lock().await;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|d| !d.is_deleted())
            .map(|d| &d.invoice)
            .filter(|i| i.tenant_id == tenant_id && filter.matches(i))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| {
            b.created_utc
                .cmp(&a.created_utc)
                .then_with(|| b.invoice_number.cmp(&a.invoice_number))
        });
        Ok(Page::from_vec(invoices, page))
    }

    async fn soft_delete_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state.live_invoice_mut(tenant_id, invoice_id) {
            Some(detail) => {
                detail.mark_deleted(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        action: CloseAction,
    ) -> Result<Option<Invoice>, AppError> {
        let mut state = self.state.lock().await;
        let Some(detail) = state.live_invoice_mut(tenant_id, invoice_id) else {
            return Ok(None);
        };
        let updated = ledger::close_invoice(&detail.invoice, action, Utc::now())?;
        detail.invoice = updated.clone();
        Ok(Some(updated))
    }

    async fn record_payment(&self, input: &RecordPayment) -> Result<PaymentApplied, AppError> {
        let mut state = self.state.lock().await;
        let invoice = state
            .live_invoice(input.tenant_id, input.invoice_id)
            .map(|d| d.invoice.clone())
            .ok_or_else(|| invoice_not_found(input.invoice_id))?;

        ledger::check_payment(&invoice, input.amount)?;
        let now = Utc::now();
        let number = state.next_payment_number(input.tenant_id, now.date_naive());
        let applied = ledger::apply_payment(&invoice, input, number, now)?;

        let detail = state
            .live_invoice_mut(input.tenant_id, input.invoice_id)
            .ok_or_else(|| invoice_not_found(input.invoice_id))?;
        detail.invoice = applied.invoice.clone();
        detail.payments.push(applied.payment.clone());

        Ok(applied)
    }

    async fn get_payment(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .invoices
            .values()
            .filter(|d| d.invoice.tenant_id == tenant_id && !d.is_deleted())
            .flat_map(|d| d.payments.iter())
            .find(|p| p.payment_id == payment_id)
            .cloned())
    }

    async fn list_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Vec<Payment>>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .live_invoice(tenant_id, invoice_id)
            .map(|d| d.payments.clone()))
    }
}
