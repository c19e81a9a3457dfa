//! Prometheus metrics for inventory-service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Stock movements by type and outcome.
pub static STOCK_MOVEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inventory_stock_movements_total",
        "Total number of stock movements by type and outcome",
        &["movement_type", "outcome"]
    )
    .expect("Failed to register stock_movements_total")
});

/// Units moved by applied movements, by type.
pub static STOCK_UNITS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inventory_stock_units_total",
        "Total units moved by applied stock movements",
        &["movement_type"]
    )
    .expect("Failed to register stock_units_total")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "inventory_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&STOCK_MOVEMENTS_TOTAL);
    Lazy::force(&STOCK_UNITS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format, HTTP metrics included.
pub fn get_metrics() -> String {
    service_core::observability::render_metrics()
}
