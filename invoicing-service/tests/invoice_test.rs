//! Invoice integration tests for invoicing-service.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{d, dec, id_of, two_line_invoice, TestApp};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

#[tokio::test]
async fn create_invoice_computes_totals() {
    let app = TestApp::new();
    let invoice = app.create_invoice(two_line_invoice(Uuid::new_v4())).await;

    assert_eq!(dec(&invoice["subtotal"]), d("1300"));
    assert_eq!(dec(&invoice["tax_amount"]), d("156"));
    assert_eq!(dec(&invoice["discount_amount"]), Decimal::ZERO);
    assert_eq!(dec(&invoice["total_amount"]), d("1456"));
    assert_eq!(dec(&invoice["amount_paid"]), Decimal::ZERO);
    assert_eq!(dec(&invoice["balance"]), d("1456"));
    assert_eq!(invoice["status"], "PENDING");
    assert_eq!(invoice["total_amount"], "1456.00");
    assert!(invoice["paid_date"].is_null());

    let items = invoice["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(dec(&items[0]["subtotal"]), d("1000"));
    assert_eq!(dec(&items[0]["tax_amount"]), d("120"));
    assert_eq!(dec(&items[1]["total_amount"]), d("336"));
    assert_eq!(items[1]["item_type"], "PART");
}

#[tokio::test]
async fn invoice_numbers_follow_the_daily_sequence() {
    let app = TestApp::new();
    let customer_id = Uuid::new_v4();
    let stem = format!("INV-{}-", Utc::now().format("%Y%m%d"));

    let first = app.create_invoice(two_line_invoice(customer_id)).await;
    let second = app.create_invoice(two_line_invoice(customer_id)).await;

    assert_eq!(first["invoice_number"], format!("{stem}0001"));
    assert_eq!(second["invoice_number"], format!("{stem}0002"));

    // Sequences are per tenant.
    let other = app.as_tenant(Uuid::new_v4());
    let theirs = other.create_invoice(two_line_invoice(customer_id)).await;
    assert_eq!(theirs["invoice_number"], format!("{stem}0001"));
}

#[tokio::test]
async fn concurrent_creation_never_duplicates_numbers() {
    let app = TestApp::new();
    let customer_id = Uuid::new_v4();

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.create_invoice(two_line_invoice(customer_id)).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for invoice in futures::future::join_all(handles).await {
        let invoice = invoice.unwrap();
        assert!(numbers.insert(id_of(&invoice, "invoice_number")));
    }
    assert_eq!(numbers.len(), 25);
}

#[tokio::test]
async fn totals_invariant_holds_for_varied_item_sets() {
    let app = TestApp::new();
    let customer_id = Uuid::new_v4();
    let tax_rates = ["0", "0.05", "0.12", "0.075", "1"];

    // Small linear congruential generator keeps the cases reproducible.
    let mut seed: u64 = 42;
    let mut next = move |bound: u64| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) % bound
    };

    for case in 0..30 {
        let item_count = 1 + next(5) as usize;
        let items: Vec<_> = (0..item_count)
            .map(|i| {
                let quantity = 1 + next(9);
                let cents = next(500_000);
                let unit_price = Decimal::new(cents as i64, 2);
                let gross = unit_price * Decimal::from(quantity);
                let discount = if i % 2 == 0 {
                    (gross * Decimal::new(next(50) as i64, 2)).round_dp(2)
                } else {
                    Decimal::ZERO
                };
                json!({
                    "item_type": "LABOR",
                    "description": format!("line {i}"),
                    "quantity": quantity,
                    "unit_price": unit_price.to_string(),
                    "discount_amount": discount.to_string(),
                })
            })
            .collect();

        let body = json!({
            "customer_id": customer_id,
            "tax_rate": tax_rates[case % tax_rates.len()],
            "discount_amount": "0",
            "items": items,
        });
        let invoice = app.create_invoice(body).await;

        let subtotal = dec(&invoice["subtotal"]);
        let discount = dec(&invoice["discount_amount"]);
        let tax = dec(&invoice["tax_amount"]);
        let total = dec(&invoice["total_amount"]);
        assert_eq!(total, subtotal - discount + tax, "case {case}: {invoice}");
        assert_eq!(dec(&invoice["balance"]), total);

        let line_sum: Decimal = invoice["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| dec(&item["total_amount"]) + dec(&item["discount_amount"]))
            .sum();
        assert_eq!(line_sum, total, "case {case}");
    }
}

#[tokio::test]
async fn header_discount_is_kept_and_line_discounts_reduce_tax() {
    let app = TestApp::new();
    let invoice = app
        .create_invoice(json!({
            "customer_id": Uuid::new_v4(),
            "tax_rate": "0.12",
            "discount_amount": "56",
            "items": [
                {"item_type": "SERVICE", "description": "Tune-up", "quantity": 2, "unit_price": "500", "discount_amount": "100"}
            ]
        }))
        .await;

    assert_eq!(dec(&invoice["subtotal"]), d("1000"));
    assert_eq!(dec(&invoice["discount_amount"]), d("56"));
    // (1000 - 100) * 0.12
    assert_eq!(dec(&invoice["tax_amount"]), d("108"));
    assert_eq!(dec(&invoice["total_amount"]), d("1052"));
    assert_eq!(dec(&invoice["balance"]), d("1052"));
    assert_eq!(dec(&invoice["items"][0]["discount_amount"]), d("100"));
    assert_eq!(dec(&invoice["items"][0]["total_amount"]), d("1008"));
}

#[tokio::test]
async fn untaxed_line_discount_leaves_amount_owed_at_subtotal() {
    let app = TestApp::new();
    let invoice = app
        .create_invoice(json!({
            "customer_id": Uuid::new_v4(),
            "tax_rate": "0",
            "discount_amount": "0",
            "items": [
                {"item_type": "SERVICE", "description": "Tune-up", "quantity": 2, "unit_price": "500", "discount_amount": "100"}
            ]
        }))
        .await;

    assert_eq!(dec(&invoice["subtotal"]), d("1000"));
    assert_eq!(dec(&invoice["discount_amount"]), Decimal::ZERO);
    assert_eq!(dec(&invoice["tax_amount"]), Decimal::ZERO);
    assert_eq!(dec(&invoice["total_amount"]), d("1000"));
}

#[tokio::test]
async fn invoices_that_owe_nothing_are_rejected() {
    let app = TestApp::new();
    let customer_id = Uuid::new_v4();

    let (status, error) = app
        .post(
            "/invoices",
            json!({"customer_id": customer_id, "discount_amount": "10", "items": [
                {"item_type": "PART", "description": "Washer", "quantity": 1, "unit_price": "10"}
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "invalid_input");
    assert!(error["error"].as_str().unwrap().contains("greater than zero"));

    let (status, _) = app
        .post(
            "/invoices",
            json!({"customer_id": customer_id, "items": [
                {"item_type": "LABOR", "description": "Inspection", "quantity": 1, "unit_price": "0"}
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = app.get("/invoices").await;
    assert_eq!(page["total"], 0);

    // The smallest payable invoice can still be settled.
    let invoice = app
        .create_invoice(json!({"customer_id": customer_id, "discount_amount": "9.99", "items": [
            {"item_type": "PART", "description": "Washer", "quantity": 1, "unit_price": "10"}
        ]}))
        .await;
    let (status, payment) = app.pay(&id_of(&invoice, "invoice_id"), "0.01").await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");
    let (_, settled) = app.get(&format!("/invoices/{}", id_of(&invoice, "invoice_id"))).await;
    assert_eq!(settled["status"], "PAID");
    assert!(settled["paid_date"].is_string());
}

#[tokio::test]
async fn invalid_invoices_are_rejected() {
    let app = TestApp::new();
    let customer_id = Uuid::new_v4();

    let cases = [
        json!({"customer_id": customer_id, "tax_rate": "0.12", "items": []}),
        json!({"customer_id": customer_id, "tax_rate": "1.2", "items": [
            {"item_type": "SERVICE", "description": "x", "quantity": 1, "unit_price": "10"}
        ]}),
        json!({"customer_id": customer_id, "items": [
            {"item_type": "SERVICE", "description": "x", "quantity": 0, "unit_price": "10"}
        ]}),
        json!({"customer_id": customer_id, "items": [
            {"item_type": "SERVICE", "description": "x", "quantity": 1, "unit_price": "-10"}
        ]}),
        json!({"customer_id": customer_id, "items": [
            {"item_type": "WIDGET", "description": "x", "quantity": 1, "unit_price": "10"}
        ]}),
        json!({"customer_id": customer_id, "discount_amount": "11", "items": [
            {"item_type": "PART", "description": "x", "quantity": 1, "unit_price": "10"}
        ]}),
        json!({"customer_id": "not-a-uuid", "items": [
            {"item_type": "PART", "description": "x", "quantity": 1, "unit_price": "10"}
        ]}),
    ];

    for body in cases {
        let (status, error) = app.post("/invoices", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}, error: {error}");
        assert_eq!(error["code"], "invalid_input", "body: {body}");
    }

    let (_, page) = app.get("/invoices").await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn requests_without_tenant_are_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .send(
            Method::POST,
            "/invoices",
            None,
            Some(two_line_invoice(Uuid::new_v4())),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::GET, "/invoices", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_invoice_returns_items_and_payments() {
    let app = TestApp::new();
    let invoice = app.create_invoice(two_line_invoice(Uuid::new_v4())).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, fetched) = app.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["invoice_number"], invoice["invoice_number"]);
    assert_eq!(fetched["items"].as_array().unwrap().len(), 2);
    assert_eq!(fetched["payments"].as_array().unwrap().len(), 0);

    let (status, error) = app.get(&format!("/invoices/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "not_found");
}

#[tokio::test]
async fn invoices_are_isolated_per_tenant() {
    let app = TestApp::new();
    let invoice = app.create_invoice(two_line_invoice(Uuid::new_v4())).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let intruder = app.as_tenant(Uuid::new_v4());
    let (status, _) = intruder.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = intruder.delete(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = intruder.get("/invoices").await;
    assert_eq!(page["total"], 0);

    let (status, _) = app.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn list_invoices_filters_and_paginates() {
    let app = TestApp::new();
    let customer_a = Uuid::new_v4();
    let customer_b = Uuid::new_v4();
    let job_order = Uuid::new_v4();

    for _ in 0..3 {
        app.create_invoice(two_line_invoice(customer_a)).await;
    }
    let mut with_job = two_line_invoice(customer_b);
    with_job["job_order_id"] = json!(job_order);
    let linked = app.create_invoice(with_job).await;

    let (status, page) = app.get("/invoices?page=1&page_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 4);
    assert_eq!(page["page_size"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    // Newest first.
    assert_eq!(page["items"][0]["invoice_id"], linked["invoice_id"]);

    let (_, page) = app.get("/invoices?page=2&page_size=3").await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let (_, page) = app
        .get(&format!("/invoices/customer/{customer_a}"))
        .await;
    assert_eq!(page["total"], 3);

    let (_, page) = app
        .get(&format!("/invoices/job-order/{job_order}"))
        .await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["invoice_id"], linked["invoice_id"]);

    let (_, page) = app.get(&format!("/invoices?customer_id={customer_b}&status=PENDING")).await;
    assert_eq!(page["total"], 1);

    let (_, page) = app.get("/invoices?status=PAID").await;
    assert_eq!(page["total"], 0);

    let (_, page) = app.get("/invoices?page_size=1000").await;
    assert_eq!(page["page_size"], 100);
}

#[tokio::test]
async fn soft_deleted_invoice_disappears() {
    let app = TestApp::new();
    let customer_id = Uuid::new_v4();
    let invoice = app.create_invoice(two_line_invoice(customer_id)).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, body) = app.delete(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = app.get(&format!("/invoices/customer/{customer_id}")).await;
    assert_eq!(page["total"], 0);

    let (status, _) = app.get(&format!("/invoices/{invoice_id}/payments")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The deleted invoice keeps its number.
    let next = app.create_invoice(two_line_invoice(customer_id)).await;
    assert_ne!(next["invoice_number"], invoice["invoice_number"]);
}

#[tokio::test]
async fn cancel_and_void_follow_the_state_machine() {
    let app = TestApp::new();
    let invoice = app.create_invoice(two_line_invoice(Uuid::new_v4())).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, cancelled) = app
        .post_empty(&format!("/invoices/{invoice_id}/cancel"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["balance"], invoice["balance"]);

    let (status, error) = app
        .post_empty(&format!("/invoices/{invoice_id}/void"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "business_rule_violation");

    let paid = app.create_invoice(two_line_invoice(Uuid::new_v4())).await;
    let paid_id = id_of(&paid, "invoice_id");
    let (status, _) = app.pay(&paid_id, "1456").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = app.post_empty(&format!("/invoices/{paid_id}/void")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "business_rule_violation");

    let (status, _) = app
        .post_empty(&format!("/invoices/{}/void", Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn operational_endpoints_respond() {
    let app = TestApp::new();

    let (status, health) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");

    let (status, _) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);

    app.create_invoice(two_line_invoice(Uuid::new_v4())).await;
    let (status, metrics) = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics
        .as_str()
        .unwrap_or_default()
        .contains("invoicing_invoices_total"));
}

#[tokio::test]
async fn application_binds_an_ephemeral_port() {
    common::init_tracing();
    let app = invoicing_service::startup::Application::build(
        invoicing_service::config::InvoicingConfig::in_memory(),
    )
    .await
    .expect("in-memory application builds");
    assert_ne!(app.port(), 0);
}

#[tokio::test]
async fn numbers_carry_the_day_of_their_record() {
    let app = TestApp::new();
    let invoice = app.create_invoice(two_line_invoice(Uuid::new_v4())).await;
    let day = |timestamp: &serde_json::Value| timestamp.as_str().unwrap()[..10].replace('-', "");

    let invoice_day = day(&invoice["invoice_date"]);
    assert!(
        invoice["invoice_number"]
            .as_str()
            .unwrap()
            .starts_with(&format!("INV-{invoice_day}-")),
        "{invoice}"
    );

    let (status, payment) = app.pay(&id_of(&invoice, "invoice_id"), "100").await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_day = day(&payment["created_utc"]);
    assert!(
        payment["payment_number"]
            .as_str()
            .unwrap()
            .starts_with(&format!("PAY-{payment_day}-")),
        "{payment}"
    );
}
