//! Application startup and lifecycle management.

use crate::config::{InventoryConfig, StoreBackend};
use crate::handlers::{self, stock};
use crate::services::{init_metrics, Database, InventoryService, MemoryStockStore, StockStore};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{request_id_middleware, RequestSpan};
use service_core::observability::install_recorder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub inventory: InventoryService,
}

impl AppState {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self {
            inventory: InventoryService::new(store),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/stock/adjustments", post(stock::adjust_stock))
        .route("/stock/low", get(stock::list_low_stock))
        .route("/stock/:product_id", get(stock::get_stock_level))
        .route("/stock/:product_id/movements", get(stock::list_movements))
        .route(
            "/stock/:product_id/reorder-level",
            put(stock::set_reorder_level),
        )
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: InventoryConfig) -> Result<Self, AppError> {
        init_metrics();
        install_recorder();

        let store: Arc<dyn StockStore> = match config.store {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory stock store; data will not survive a restart");
                Arc::new(MemoryStockStore::new())
            }
            StoreBackend::Postgres => {
                let database = config.database.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?;

                let db = Database::new(
                    &database.url,
                    database.max_connections,
                    database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;

                Arc::new(db)
            }
        };

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, store = ?config.store, "Inventory service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(store),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "inventory-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
