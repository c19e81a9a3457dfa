//! Common test utilities for invoicing-service integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use invoicing_service::services::MemoryInvoiceStore;
use invoicing_service::startup::{build_router, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::{Arc, Once};
use tower::util::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug")
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
        let state = AppState::new(Arc::new(MemoryInvoiceStore::new()));
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

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(self.tenant_id), None).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(self.tenant_id), None)
            .await
    }

    /// Create an invoice and return the response body, asserting 201.
    pub async fn create_invoice(&self, body: Value) -> Value {
        let (status, invoice) = self.post("/invoices", body).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {invoice}");
        invoice
    }

    pub async fn pay(&self, invoice_id: &str, amount: &str) -> (StatusCode, Value) {
        self.post(
            "/payments",
            json!({
                "invoice_id": invoice_id,
                "amount": amount,
                "payment_method": "CASH",
            }),
        )
        .await
    }
}

/// Two lines (2 x 500 and 1 x 300) at 12% tax, no discount.
pub fn two_line_invoice(customer_id: Uuid) -> Value {
    json!({
        "customer_id": customer_id,
        "tax_rate": "0.12",
        "discount_amount": "0",
        "items": [
            {"item_type": "SERVICE", "description": "Tune-up", "quantity": 2, "unit_price": "500"},
            {"item_type": "PART", "description": "Spark plug set", "quantity": 1, "unit_price": "300"}
        ]
    })
}

/// Read a decimal serialized as a JSON string.
pub fn dec(value: &Value) -> Decimal {
    let text = value
        .as_str()
        .unwrap_or_else(|| panic!("expected a decimal string, got {value}"));
    Decimal::from_str(text).unwrap()
}

pub fn d(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

pub fn id_of(value: &Value, field: &str) -> String {
    value[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {field} in {value}"))
        .to_string()
}
