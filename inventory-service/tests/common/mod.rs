//! Common test utilities for inventory-service integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use inventory_service::services::MemoryStockStore;
use inventory_service::startup::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use tower::util::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,inventory_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Router over a fresh in-memory store, plus a tenant to act as.
#[derive(Clone)]
pub struct TestApp {
    router: Router,
    pub tenant_id: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        init_tracing();
        let state = AppState::new(Arc::new(MemoryStockStore::new()));
        Self {
            router: build_router(state),
            tenant_id: Uuid::new_v4(),
        }
    }

    /// Same store, different tenant.
    pub fn as_tenant(&self, tenant_id: Uuid) -> Self {
        Self {
            router: self.router.clone(),
            tenant_id,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        tenant: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tenant_id) = tenant {
            builder = builder.header("x-tenant-id", tenant_id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(self.tenant_id), None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(self.tenant_id), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(self.tenant_id), Some(body))
            .await
    }

    pub async fn adjust(
        &self,
        product_id: Uuid,
        branch_id: Option<Uuid>,
        movement_type: &str,
        quantity: i64,
    ) -> (StatusCode, Value) {
        self.post(
            "/stock/adjustments",
            json!({
                "product_id": product_id,
                "branch_id": branch_id,
                "movement_type": movement_type,
                "quantity": quantity,
            }),
        )
        .await
    }

    /// Current quantity on hand, asserting the level exists.
    pub async fn on_hand(&self, product_id: Uuid, branch_id: Option<Uuid>) -> i64 {
        let uri = match branch_id {
            Some(branch_id) => format!("/stock/{product_id}?branch_id={branch_id}"),
            None => format!("/stock/{product_id}"),
        };
        let (status, level) = self.get(&uri).await;
        assert_eq!(status, StatusCode::OK, "missing level: {level}");
        level["current_quantity"].as_i64().unwrap()
    }
}
