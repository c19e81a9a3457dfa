//! PostgreSQL-backed store tests.
//!
//! Run with a scratch database:
//! `TEST_DATABASE_URL=postgres://... cargo test -p invoicing-service -- --ignored`

mod common;

use chrono::Utc;
use common::d;
use invoicing_service::models::{
    CreateInvoice, CreateInvoiceItem, InvoiceStatus, ItemType, ListInvoicesFilter, PaymentMethod,
    RecordPayment,
};
use invoicing_service::services::ledger::CloseAction;
use invoicing_service::services::{Database, InvoiceStore};
use service_core::error::AppError;
use service_core::pagination::PageParams;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

async fn connect() -> Database {
    common::init_tracing();
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let db = Database::new(&url, 10, 1).await.expect("connect");
    db.run_migrations().await.expect("migrations");
    db
}

fn scenario_invoice(tenant_id: Uuid) -> CreateInvoice {
    CreateInvoice {
        tenant_id,
        customer_id: Uuid::new_v4(),
        job_order_id: None,
        branch_id: None,
        tax_rate: d("0.12"),
        discount_amount: d("0"),
        due_date: None,
        notes: None,
        terms: None,
        items: vec![
            CreateInvoiceItem {
                item_type: ItemType::Service,
                catalog_item_id: None,
                description: "Tune-up".to_string(),
                quantity: 2,
                unit_price: d("500"),
                discount_amount: d("0"),
            },
            CreateInvoiceItem {
                item_type: ItemType::Part,
                catalog_item_id: None,
                description: "Spark plug set".to_string(),
                quantity: 1,
                unit_price: d("300"),
                discount_amount: d("0"),
            },
        ],
    }
}

fn cash(tenant_id: Uuid, invoice_id: Uuid, amount: &str) -> RecordPayment {
    RecordPayment {
        tenant_id,
        invoice_id,
        amount: d(amount),
        payment_method: PaymentMethod::Cash,
        payment_date: Utc::now().date_naive(),
        reference_number: None,
        notes: None,
    }
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn invoice_lifecycle_round_trips_through_postgres() {
    let db = connect().await;
    let tenant_id = Uuid::new_v4();

    let created = db.create_invoice(&scenario_invoice(tenant_id)).await.unwrap();
    let invoice_id = created.invoice.invoice_id;
    assert_eq!(created.invoice.total_amount, d("1456.00"));
    assert_eq!(created.items.len(), 2);
    assert_eq!(
        created.invoice.invoice_number,
        format!("INV-{}-0001", Utc::now().format("%Y%m%d"))
    );

    let fetched = db.get_invoice(tenant_id, invoice_id).await.unwrap().unwrap();
    assert_eq!(fetched.invoice.invoice_number, created.invoice.invoice_number);
    assert_eq!(fetched.invoice.tax_amount, d("156.00"));
    assert_eq!(fetched.items, created.items);
    assert!(fetched.payments.is_empty());

    let partial = db
        .record_payment(&cash(tenant_id, invoice_id, "500"))
        .await
        .unwrap();
    assert_eq!(partial.invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(partial.invoice.balance, d("956.00"));

    let overdraw = db.record_payment(&cash(tenant_id, invoice_id, "2000")).await;
    assert!(matches!(overdraw, Err(AppError::BusinessRule(_))));

    let settled = db
        .record_payment(&cash(tenant_id, invoice_id, "956"))
        .await
        .unwrap();
    assert_eq!(settled.invoice.status, InvoiceStatus::Paid);
    assert!(settled.invoice.paid_date.is_some());

    let payments = db.list_payments(tenant_id, invoice_id).await.unwrap().unwrap();
    assert_eq!(payments.len(), 2);
    let payment = db
        .get_payment(tenant_id, payments[0].payment_id)
        .await
        .unwrap();
    assert!(payment.is_some());

    let closed = db
        .close_invoice(tenant_id, invoice_id, CloseAction::Void)
        .await;
    assert!(matches!(closed, Err(AppError::BusinessRule(_))));

    let page = db
        .list_invoices(tenant_id, &ListInvoicesFilter::default(), PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    assert!(db.soft_delete_invoice(tenant_id, invoice_id).await.unwrap());
    assert!(db.get_invoice(tenant_id, invoice_id).await.unwrap().is_none());
    assert!(!db.soft_delete_invoice(tenant_id, invoice_id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn concurrent_creation_allocates_distinct_numbers() {
    let db = Arc::new(connect().await);
    let tenant_id = Uuid::new_v4();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.create_invoice(&scenario_invoice(tenant_id)).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for result in futures::future::join_all(handles).await {
        let created = result.unwrap().unwrap();
        assert!(numbers.insert(created.invoice.invoice_number));
    }
    assert_eq!(numbers.len(), 10);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn concurrent_payments_do_not_overdraw() {
    let db = Arc::new(connect().await);
    let tenant_id = Uuid::new_v4();
    let created = db.create_invoice(&scenario_invoice(tenant_id)).await.unwrap();
    let invoice_id = created.invoice.invoice_id;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move {
                db.record_payment(&cash(tenant_id, invoice_id, "100")).await
            })
        })
        .collect();

    let accepted = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(accepted, 14);

    let invoice = db.get_invoice(tenant_id, invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.invoice.amount_paid, d("1400.00"));
    assert_eq!(invoice.invoice.balance, d("56.00"));
}
