//! Application startup and lifecycle management.

use crate::config::{InvoicingConfig, StoreBackend};
use crate::handlers::{self, invoices, payments};
use crate::services::{init_metrics, Database, InvoiceStore, InvoicingService, MemoryInvoiceStore};
use axum::{
    middleware,
    routing::{get, post},
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
    pub invoicing: InvoicingService,
}

impl AppState {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self {
            invoicing: InvoicingService::new(store),
        }
    }
}

/// Full HTTP surface: business routes plus health, readiness and metrics.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route(
            "/invoices/customer/:customer_id",
            get(invoices::list_customer_invoices),
        )
        .route(
            "/invoices/job-order/:job_order_id",
            get(invoices::list_job_order_invoices),
        )
        .route(
            "/invoices/:invoice_id",
            get(invoices::get_invoice).delete(invoices::delete_invoice),
        )
        .route("/invoices/:invoice_id/cancel", post(invoices::cancel_invoice))
        .route("/invoices/:invoice_id/void", post(invoices::void_invoice))
        .route(
            "/invoices/:invoice_id/payments",
            get(invoices::list_invoice_payments),
        )
        .route("/payments", post(payments::record_payment))
        .route("/payments/:payment_id", get(payments::get_payment))
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
    /// Build the application with the given configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        init_metrics();
        install_recorder();

        let store: Arc<dyn InvoiceStore> = match config.store {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory invoice store; data will not survive a restart");
                Arc::new(MemoryInvoiceStore::new())
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

        tracing::info!(port = port, store = ?config.store, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(store),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
