//! Invoice ledger rules: line pricing, invoice totals, payment application
//! and status derivation.
//!
//! Everything here is pure. Stores call into these functions while they hold
//! whatever lock or transaction makes the surrounding read-modify-write safe.

use crate::models::{
    CreateInvoice, Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus, Payment, PaymentApplied,
    PaymentStatus, RecordPayment,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use uuid::Uuid;

pub const MONEY_SCALE: u32 = 2;
pub const TAX_RATE_SCALE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invoice must contain at least one item")]
    EmptyItems,

    #[error("item {line}: quantity must be greater than zero")]
    InvalidQuantity { line: usize },

    #[error("item {line}: unit price must not be negative")]
    NegativeUnitPrice { line: usize },

    #[error("item {line}: discount must be between 0 and the line subtotal")]
    InvalidItemDiscount { line: usize },

    #[error("tax rate must be between 0 and 1")]
    InvalidTaxRate,

    #[error("discount amount must not be negative")]
    NegativeDiscount,

    #[error("invoice total must be greater than zero")]
    NonPositiveTotal,

    #[error("{field} has too many decimal places")]
    TooPrecise { field: &'static str },

    #[error("{field} exceeds the largest supported amount")]
    OutOfRange { field: &'static str },

    #[error("payment amount must be greater than zero")]
    InvalidAmount,

    #[error("invoice is {status} and does not accept payments")]
    NotPayable { status: InvoiceStatus },

    #[error("payment amount {amount} exceeds invoice balance {balance}")]
    ExceedsBalance { amount: Decimal, balance: Decimal },

    #[error("invoice cannot move from {from} to {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotPayable { .. }
            | LedgerError::ExceedsBalance { .. }
            | LedgerError::InvalidTransition { .. } => {
                AppError::BusinessRule(anyhow::Error::new(err))
            }
            _ => AppError::BadRequest(anyhow::Error::new(err)),
        }
    }
}

/// Administrative transitions out of the payable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    Cancel,
    Void,
}

impl CloseAction {
    pub fn target_status(&self) -> InvoiceStatus {
        match self {
            CloseAction::Cancel => InvoiceStatus::Cancelled,
            CloseAction::Void => InvoiceStatus::Void,
        }
    }
}

/// Largest value a `NUMERIC(14, 2)` column holds.
pub fn max_money() -> Decimal {
    Decimal::new(99_999_999_999_999, MONEY_SCALE)
}

/// Round to cents, halves away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `round2` with the scale fixed at two places, so `1300` renders as `1300.00`.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded = round2(value);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Tax rate at the fixed four-place scale it is stored with.
pub fn rate(value: Decimal) -> Decimal {
    let mut rate = value.normalize();
    rate.rescale(TAX_RATE_SCALE);
    rate
}

fn check_scale(value: Decimal, max_scale: u32, field: &'static str) -> Result<(), LedgerError> {
    if value.normalize().scale() > max_scale {
        return Err(LedgerError::TooPrecise { field });
    }
    Ok(())
}

fn check_money(value: Decimal, field: &'static str) -> Result<(), LedgerError> {
    check_scale(value, MONEY_SCALE, field)?;
    if value > max_money() {
        return Err(LedgerError::OutOfRange { field });
    }
    Ok(())
}

/// Amounts for a single priced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrice {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Price one line: tax applies to the line after its own discount.
pub fn price_line(
    quantity: i32,
    unit_price: Decimal,
    discount: Decimal,
    tax_rate: Decimal,
) -> LinePrice {
    let subtotal = money(Decimal::from(quantity) * unit_price);
    let discount = money(discount);
    let taxable = subtotal - discount;
    let tax = money(taxable * tax_rate);
    LinePrice {
        subtotal,
        discount,
        tax,
        total: taxable + tax,
    }
}

/// Header amounts of a new invoice plus the per-line breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub lines: Vec<LinePrice>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

/// Validate a new invoice and compute its totals.
///
/// Line discounts only shrink each line's taxable base. The header
/// `discount_amount` is the caller's value and is the only discount taken
/// off `subtotal`, so `total_amount = subtotal - discount_amount + tax_amount`.
pub fn compute_totals(input: &CreateInvoice) -> Result<InvoiceTotals, LedgerError> {
    if input.items.is_empty() {
        return Err(LedgerError::EmptyItems);
    }

    check_scale(input.tax_rate, TAX_RATE_SCALE, "tax_rate")?;
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(LedgerError::InvalidTaxRate);
    }

    if input.discount_amount < Decimal::ZERO {
        return Err(LedgerError::NegativeDiscount);
    }
    check_money(input.discount_amount, "discount_amount")?;

    let mut lines = Vec::with_capacity(input.items.len());
    for (index, item) in input.items.iter().enumerate() {
        let line = index + 1;
        if item.quantity <= 0 {
            return Err(LedgerError::InvalidQuantity { line });
        }
        if item.unit_price < Decimal::ZERO {
            return Err(LedgerError::NegativeUnitPrice { line });
        }
        check_money(item.unit_price, "unit_price")?;
        check_money(item.discount_amount, "item discount_amount")?;

        let gross = Decimal::from(item.quantity) * item.unit_price;
        if item.discount_amount < Decimal::ZERO || item.discount_amount > gross {
            return Err(LedgerError::InvalidItemDiscount { line });
        }

        lines.push(price_line(
            item.quantity,
            item.unit_price,
            item.discount_amount,
            input.tax_rate,
        ));
    }

    let subtotal: Decimal = lines.iter().map(|l| l.subtotal).sum();
    let tax_amount: Decimal = lines.iter().map(|l| l.tax).sum();
    let discount_amount = money(input.discount_amount);
    let total_amount = subtotal - discount_amount + tax_amount;

    // Payments are positive, so the invoice must owe something.
    if total_amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveTotal);
    }
    if subtotal > max_money() || total_amount > max_money() {
        return Err(LedgerError::OutOfRange {
            field: "total_amount",
        });
    }

    Ok(InvoiceTotals {
        lines,
        subtotal: money(subtotal),
        tax_amount: money(tax_amount),
        discount_amount: money(discount_amount),
        total_amount: money(total_amount),
    })
}

/// Build a new `PENDING` invoice with its items.
pub fn draft_invoice(
    input: &CreateInvoice,
    invoice_number: String,
    now: DateTime<Utc>,
) -> Result<InvoiceDetail, LedgerError> {
    let totals = compute_totals(input)?;
    let invoice_id = Uuid::new_v4();

    let items = input
        .items
        .iter()
        .zip(&totals.lines)
        .enumerate()
        .map(|(index, (item, price))| InvoiceItem {
            item_id: Uuid::new_v4(),
            invoice_id,
            item_type: item.item_type,
            catalog_item_id: item.catalog_item_id,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: money(item.unit_price),
            discount_amount: price.discount,
            subtotal: price.subtotal,
            tax_amount: price.tax,
            total_amount: money(price.total),
            sort_order: index as i32,
        })
        .collect();

    let invoice = Invoice {
        invoice_id,
        tenant_id: input.tenant_id,
        invoice_number,
        branch_id: input.branch_id,
        customer_id: input.customer_id,
        job_order_id: input.job_order_id,
        status: InvoiceStatus::Pending,
        tax_rate: rate(input.tax_rate),
        subtotal: totals.subtotal,
        tax_amount: totals.tax_amount,
        discount_amount: totals.discount_amount,
        total_amount: totals.total_amount,
        amount_paid: money(Decimal::ZERO),
        balance: totals.total_amount,
        invoice_date: now,
        due_date: input.due_date,
        paid_date: None,
        notes: input.notes.clone(),
        terms: input.terms.clone(),
        created_utc: now,
        updated_utc: now,
        deleted_utc: None,
    };

    Ok(InvoiceDetail {
        invoice,
        items,
        payments: Vec::new(),
    })
}

/// Check that `amount` may be applied to `invoice` right now.
pub fn check_payment(invoice: &Invoice, amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    check_scale(amount, MONEY_SCALE, "amount")?;

    if !invoice.status.accepts_payments() {
        return Err(LedgerError::NotPayable {
            status: invoice.status,
        });
    }

    if amount > invoice.balance {
        return Err(LedgerError::ExceedsBalance {
            amount,
            balance: invoice.balance,
        });
    }

    Ok(())
}

/// Apply a payment, returning the new payment and the updated invoice.
/// `invoice` is left untouched when the payment is rejected.
pub fn apply_payment(
    invoice: &Invoice,
    input: &RecordPayment,
    payment_number: String,
    now: DateTime<Utc>,
) -> Result<PaymentApplied, LedgerError> {
    check_payment(invoice, input.amount)?;

    let amount = money(input.amount);
    let payment = Payment {
        payment_id: Uuid::new_v4(),
        tenant_id: invoice.tenant_id,
        payment_number,
        invoice_id: invoice.invoice_id,
        amount,
        payment_method: input.payment_method,
        status: PaymentStatus::Completed,
        payment_date: input.payment_date,
        reference_number: input.reference_number.clone(),
        notes: input.notes.clone(),
        created_utc: now,
    };

    let mut updated = invoice.clone();
    updated.amount_paid = money(updated.amount_paid + amount);
    updated.balance = money(updated.total_amount - updated.amount_paid);
    updated.updated_utc = now;
    derive_status(&mut updated, now);

    Ok(PaymentApplied {
        payment,
        invoice: updated,
    })
}

/// Status after a payment: settled invoices become `PAID` (stamping
/// `paid_date` once), partly settled ones `PARTIALLY_PAID`.
pub fn derive_status(invoice: &mut Invoice, now: DateTime<Utc>) {
    if invoice.balance <= Decimal::ZERO {
        invoice.status = InvoiceStatus::Paid;
        if invoice.paid_date.is_none() {
            invoice.paid_date = Some(now);
        }
    } else if invoice.amount_paid > Decimal::ZERO {
        invoice.status = InvoiceStatus::PartiallyPaid;
    }
}

/// Cancel or void an invoice that is still open for payment.
pub fn close_invoice(
    invoice: &Invoice,
    action: CloseAction,
    now: DateTime<Utc>,
) -> Result<Invoice, LedgerError> {
    let target = action.target_status();
    if !invoice.status.can_be_closed() {
        return Err(LedgerError::InvalidTransition {
            from: invoice.status,
            to: target,
        });
    }

    let mut updated = invoice.clone();
    updated.status = target;
    updated.updated_utc = now;
    Ok(updated)
}
