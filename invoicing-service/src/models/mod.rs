//! Domain models for invoicing-service.

mod invoice;
mod invoice_item;
mod payment;

pub use invoice::{
    CreateInvoice, Invoice, InvoiceDetail, InvoiceStatus, ListInvoicesFilter,
};
pub use invoice_item::{CreateInvoiceItem, InvoiceItem, ItemType};
pub use payment::{Payment, PaymentApplied, PaymentMethod, PaymentStatus, RecordPayment};

/// A stored enum value that is not part of the closed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
