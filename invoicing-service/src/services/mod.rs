//! Services module for invoicing-service.

pub mod database;
pub mod invoicing;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod numbering;
pub mod store;

pub use database::Database;
pub use invoicing::InvoicingService;
pub use memory::MemoryInvoiceStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::InvoiceStore;
