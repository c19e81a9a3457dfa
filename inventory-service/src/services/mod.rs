//! Business logic and persistence for inventory-service.

pub mod adjustment;
pub mod database;
pub mod inventory;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use inventory::InventoryService;
pub use memory::MemoryStockStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::StockStore;
