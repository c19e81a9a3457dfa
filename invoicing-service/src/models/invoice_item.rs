//! Invoice line items. Items are immutable once the invoice is created.

use super::UnknownVariant;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Service,
    Part,
    Labor,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Service => "SERVICE",
            ItemType::Part => "PART",
            ItemType::Labor => "LABOR",
        }
    }
}

impl FromStr for ItemType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERVICE" => Ok(ItemType::Service),
            "PART" => Ok(ItemType::Part),
            "LABOR" => Ok(ItemType::Labor),
            other => Err(UnknownVariant::new("item type", other)),
        }
    }
}

/// Priced line on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub item_type: ItemType,
    pub catalog_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub sort_order: i32,
}

/// Input for one line of a new invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub item_type: ItemType,
    pub catalog_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
}
