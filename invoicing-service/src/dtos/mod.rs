//! Request bodies and query strings accepted by the HTTP surface.
//!
//! Enum fields are closed types, so unknown values are rejected while the
//! body is deserialized. Money rules live in the ledger, not here.

use crate::models::{
    CreateInvoice, CreateInvoiceItem, InvoiceStatus, ItemType, ListInvoicesFilter, PaymentMethod,
    RecordPayment,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::extract::TenantContext;
use service_core::pagination::PageParams;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub job_order_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 2000))]
    pub terms: Option<String>,
    #[validate(length(min = 1, message = "invoice must contain at least one item"), nested)]
    pub items: Vec<CreateInvoiceItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateInvoiceItemRequest {
    pub item_type: ItemType,
    pub catalog_item_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(range(min = 1, message = "quantity must be greater than zero"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
}

impl CreateInvoiceRequest {
    pub fn into_create(self, tenant: TenantContext) -> CreateInvoice {
        CreateInvoice {
            tenant_id: tenant.tenant_id,
            customer_id: self.customer_id,
            job_order_id: self.job_order_id,
            branch_id: self.branch_id,
            tax_rate: self.tax_rate,
            discount_amount: self.discount_amount,
            due_date: self.due_date,
            notes: self.notes,
            terms: self.terms,
            items: self
                .items
                .into_iter()
                .map(|item| CreateInvoiceItem {
                    item_type: item.item_type,
                    catalog_item_id: item.catalog_item_id,
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount_amount: item.discount_amount,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    /// Defaults to today (UTC).
    pub payment_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl RecordPaymentRequest {
    pub fn into_record(self, tenant: TenantContext) -> RecordPayment {
        RecordPayment {
            tenant_id: tenant.tenant_id,
            invoice_id: self.invoice_id,
            amount: self.amount,
            payment_method: self.payment_method,
            payment_date: self
                .payment_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            reference_number: self.reference_number,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub job_order_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListInvoicesQuery {
    pub fn filter(&self) -> ListInvoicesFilter {
        ListInvoicesFilter {
            status: self.status,
            customer_id: self.customer_id,
            job_order_id: self.job_order_id,
            branch_id: self.branch_id,
        }
    }

    pub fn page(&self) -> PageParams {
        PageParams::new(self.page, self.page_size)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn params(&self) -> PageParams {
        PageParams::new(self.page, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_payment_method_is_rejected() {
        let body = r#"{
            "invoice_id": "6f1c1c9e-3f5e-4c4e-9d1e-0c5f3b2a1d00",
            "amount": "100.00",
            "payment_method": "BITCOIN"
        }"#;
        assert!(serde_json::from_str::<RecordPaymentRequest>(body).is_err());
    }

    #[test]
    fn empty_items_fail_validation() {
        let body = r#"{
            "customer_id": "6f1c1c9e-3f5e-4c4e-9d1e-0c5f3b2a1d00",
            "tax_rate": "0.12",
            "items": []
        }"#;
        let request: CreateInvoiceRequest = serde_json::from_str(body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn nested_item_rules_are_checked() {
        let body = r#"{
            "customer_id": "6f1c1c9e-3f5e-4c4e-9d1e-0c5f3b2a1d00",
            "items": [
                {"item_type": "PART", "description": "Brake pads", "quantity": 0, "unit_price": "10"}
            ]
        }"#;
        let request: CreateInvoiceRequest = serde_json::from_str(body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn payment_date_defaults_to_today() {
        let body = r#"{
            "invoice_id": "6f1c1c9e-3f5e-4c4e-9d1e-0c5f3b2a1d00",
            "amount": "100.00",
            "payment_method": "GCASH"
        }"#;
        let request: RecordPaymentRequest = serde_json::from_str(body).unwrap();
        let record = request.into_record(TenantContext::new(Uuid::new_v4()));
        assert_eq!(record.payment_date, Utc::now().date_naive());
        assert_eq!(record.payment_method, PaymentMethod::Gcash);
    }
}
