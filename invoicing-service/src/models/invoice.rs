//! Invoice model for invoicing-service.

use super::{CreateInvoiceItem, InvoiceItem, Payment, UnknownVariant};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::soft_delete::SoftDeletable;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::PartiallyPaid => "PARTIALLY_PAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
            InvoiceStatus::Void => "VOID",
        }
    }

    /// Whether a payment may be applied in this status. A `PAID` invoice
    /// passes this check and is then stopped by the balance check.
    pub fn accepts_payments(&self) -> bool {
        !matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Cancelled | InvoiceStatus::Void
        )
    }

    /// Whether the invoice may still be cancelled or voided.
    pub fn can_be_closed(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "PENDING" => Ok(InvoiceStatus::Pending),
            "PARTIALLY_PAID" => Ok(InvoiceStatus::PartiallyPaid),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "CANCELLED" => Ok(InvoiceStatus::Cancelled),
            "VOID" => Ok(InvoiceStatus::Void),
            other => Err(UnknownVariant::new("invoice status", other)),
        }
    }
}

/// Invoice header. Money fields always carry two decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub branch_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub job_order_id: Option<Uuid>,
    pub status: InvoiceStatus,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
    pub invoice_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_utc: Option<DateTime<Utc>>,
}

impl SoftDeletable for Invoice {
    fn deleted_utc(&self) -> Option<DateTime<Utc>> {
        self.deleted_utc
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_utc = Some(at);
        self.updated_utc = at;
    }
}

/// Invoice with the records it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

impl SoftDeletable for InvoiceDetail {
    fn deleted_utc(&self) -> Option<DateTime<Utc>> {
        self.invoice.deleted_utc
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.invoice.mark_deleted(at);
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub job_order_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

impl ListInvoicesFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.status.map_or(true, |s| invoice.status == s)
            && self.customer_id.map_or(true, |id| invoice.customer_id == id)
            && self.job_order_id.map_or(true, |id| invoice.job_order_id == Some(id))
            && self.branch_id.map_or(true, |id| invoice.branch_id == Some(id))
    }
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub job_order_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub tax_rate: Decimal,
    pub discount_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub items: Vec<CreateInvoiceItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Pending,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
            InvoiceStatus::Void,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("SETTLED".parse::<InvoiceStatus>().is_err());
        assert!(serde_json::from_str::<InvoiceStatus>("\"paid\"").is_err());
    }

    #[test]
    fn payable_and_closable_states() {
        assert!(InvoiceStatus::Pending.accepts_payments());
        assert!(InvoiceStatus::PartiallyPaid.accepts_payments());
        assert!(!InvoiceStatus::Void.accepts_payments());
        assert!(!InvoiceStatus::Cancelled.accepts_payments());
        assert!(!InvoiceStatus::Draft.accepts_payments());

        assert!(InvoiceStatus::Pending.can_be_closed());
        assert!(!InvoiceStatus::Paid.can_be_closed());
        assert!(!InvoiceStatus::Void.can_be_closed());
    }
}
