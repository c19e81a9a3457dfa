//! PostgreSQL store for invoicing-service.

use crate::models::{
    CreateInvoice, Invoice, InvoiceDetail, InvoiceItem, ListInvoicesFilter, Payment,
    PaymentApplied, RecordPayment, UnknownVariant,
};
use crate::services::ledger::{self, CloseAction};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::numbering::{self, NumberPrefix};
use crate::services::store::{invoice_not_found, InvoiceStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::pagination::{Page, PageParams};
use service_core::soft_delete::NOT_DELETED;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, tenant_id, invoice_number, branch_id, customer_id, \
    job_order_id, status, tax_rate, subtotal, tax_amount, discount_amount, total_amount, \
    amount_paid, balance, invoice_date, due_date, paid_date, notes, terms, created_utc, \
    updated_utc, deleted_utc";

const ITEM_COLUMNS: &str = "item_id, invoice_id, item_type, catalog_item_id, description, \
    quantity, unit_price, discount_amount, subtotal, tax_amount, total_amount, sort_order";

const PAYMENT_COLUMNS: &str = "p.payment_id, p.tenant_id, p.payment_number, p.invoice_id, \
    p.amount, p.payment_method, p.status, p.payment_date, p.reference_number, p.notes, \
    p.created_utc";

#[derive(FromRow)]
struct InvoiceRow {
    invoice_id: Uuid,
    tenant_id: Uuid,
    invoice_number: String,
    branch_id: Option<Uuid>,
    customer_id: Uuid,
    job_order_id: Option<Uuid>,
    status: String,
    tax_rate: Decimal,
    subtotal: Decimal,
    tax_amount: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    amount_paid: Decimal,
    balance: Decimal,
    invoice_date: DateTime<Utc>,
    due_date: Option<NaiveDate>,
    paid_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    terms: Option<String>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
    deleted_utc: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            invoice_id: row.invoice_id,
            tenant_id: row.tenant_id,
            invoice_number: row.invoice_number,
            branch_id: row.branch_id,
            customer_id: row.customer_id,
            job_order_id: row.job_order_id,
            status: row.status.parse().map_err(corrupt)?,
            tax_rate: row.tax_rate,
            subtotal: row.subtotal,
            tax_amount: row.tax_amount,
            discount_amount: row.discount_amount,
            total_amount: row.total_amount,
            amount_paid: row.amount_paid,
            balance: row.balance,
            invoice_date: row.invoice_date,
            due_date: row.due_date,
            paid_date: row.paid_date,
            notes: row.notes,
            terms: row.terms,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
            deleted_utc: row.deleted_utc,
        })
    }
}

#[derive(FromRow)]
struct ItemRow {
    item_id: Uuid,
    invoice_id: Uuid,
    item_type: String,
    catalog_item_id: Option<Uuid>,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    discount_amount: Decimal,
    subtotal: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    sort_order: i32,
}

impl TryFrom<ItemRow> for InvoiceItem {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(InvoiceItem {
            item_id: row.item_id,
            invoice_id: row.invoice_id,
            item_type: row.item_type.parse().map_err(corrupt)?,
            catalog_item_id: row.catalog_item_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            discount_amount: row.discount_amount,
            subtotal: row.subtotal,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            sort_order: row.sort_order,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    tenant_id: Uuid,
    payment_number: String,
    invoice_id: Uuid,
    amount: Decimal,
    payment_method: String,
    status: String,
    payment_date: NaiveDate,
    reference_number: Option<String>,
    notes: Option<String>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            payment_id: row.payment_id,
            tenant_id: row.tenant_id,
            payment_number: row.payment_number,
            invoice_id: row.invoice_id,
            amount: row.amount,
            payment_method: row.payment_method.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            payment_date: row.payment_date,
            reference_number: row.reference_number,
            notes: row.notes,
            created_utc: row.created_utc,
        })
    }
}

fn corrupt(err: UnknownVariant) -> AppError {
    AppError::DatabaseError(anyhow::Error::new(err))
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Bump the `(tenant, prefix, day)` counter inside the caller's
    /// transaction. The row lock taken by the upsert is held until commit,
    /// so concurrent allocations for the same key queue behind each other.
    async fn next_sequence(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        prefix: NumberPrefix,
        day: NaiveDate,
    ) -> Result<u32, AppError> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_counters (tenant_id, prefix, day, last_value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (tenant_id, prefix, day)
            DO UPDATE SET last_value = document_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(tenant_id)
        .bind(prefix.as_str())
        .bind(day)
        .fetch_one(conn)
        .await
        .map_err(db_error("Failed to allocate document number"))?;

        u32::try_from(value).map_err(|_| {
            AppError::InternalError(anyhow::anyhow!(
                "{} counter exhausted for {}",
                prefix,
                day
            ))
        })
    }

    async fn lock_invoice(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE tenant_id = $1 AND invoice_id = $2 AND {NOT_DELETED} \
             FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(conn)
        .await
        .map_err(db_error("Failed to lock invoice"))?;

        row.map(Invoice::try_from).transpose()
    }

    async fn fetch_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE tenant_id = $1 AND invoice_id = $2 AND {NOT_DELETED}"
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get invoice"))?;

        row.map(Invoice::try_from).transpose()
    }

    async fn fetch_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments p \
             WHERE p.invoice_id = $1 \
             ORDER BY p.created_utc, p.payment_number"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list payments"))?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, customer_id = %input.customer_id))]
    async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let now = Utc::now();
        let day = now.date_naive();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let sequence =
            Self::next_sequence(&mut *tx, input.tenant_id, NumberPrefix::Invoice, day).await?;
        let detail =
            ledger::draft_invoice(input, numbering::format(NumberPrefix::Invoice, day, sequence), now)?;
        let invoice = &detail.invoice;

        sqlx::query(&format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22)"
        ))
        .bind(invoice.invoice_id)
        .bind(invoice.tenant_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.branch_id)
        .bind(invoice.customer_id)
        .bind(invoice.job_order_id)
        .bind(invoice.status.as_str())
        .bind(invoice.tax_rate)
        .bind(invoice.subtotal)
        .bind(invoice.tax_amount)
        .bind(invoice.discount_amount)
        .bind(invoice.total_amount)
        .bind(invoice.amount_paid)
        .bind(invoice.balance)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(&invoice.notes)
        .bind(&invoice.terms)
        .bind(invoice.created_utc)
        .bind(invoice.updated_utc)
        .bind(invoice.deleted_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists",
                    invoice.invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        for item in &detail.items {
            sqlx::query(&format!(
                "INSERT INTO invoice_items (tenant_id, {ITEM_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
            ))
            .bind(invoice.tenant_id)
            .bind(item.item_id)
            .bind(item.invoice_id)
            .bind(item.item_type.as_str())
            .bind(item.catalog_item_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.discount_amount)
            .bind(item.subtotal)
            .bind(item.tax_amount)
            .bind(item.total_amount)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to create invoice item"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit invoice"))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            items = detail.items.len(),
            "Invoice created"
        );

        Ok(detail)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let Some(invoice) = self.fetch_invoice(tenant_id, invoice_id).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM invoice_items \
             WHERE invoice_id = $1 ORDER BY sort_order"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to get invoice items"))?
        .into_iter()
        .map(InvoiceItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let payments = self.fetch_payments(invoice_id).await?;

        timer.observe_duration();

        Ok(Some(InvoiceDetail {
            invoice,
            items,
            payments,
        }))
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        filter: &ListInvoicesFilter,
        page: PageParams,
    ) -> Result<Page<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let predicate = format!(
            "tenant_id = $1 AND {NOT_DELETED} \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::uuid IS NULL OR customer_id = $3) \
             AND ($4::uuid IS NULL OR job_order_id = $4) \
             AND ($5::uuid IS NULL OR branch_id = $5)"
        );
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM invoices WHERE {predicate}"))
            .bind(tenant_id)
            .bind(status)
            .bind(filter.customer_id)
            .bind(filter.job_order_id)
            .bind(filter.branch_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count invoices"))?;

        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE {predicate} \
             ORDER BY created_utc DESC, invoice_number DESC \
             LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(status)
        .bind(filter.customer_id)
        .bind(filter.job_order_id)
        .bind(filter.branch_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list invoices"))?;

        timer.observe_duration();

        let invoices = rows
            .into_iter()
            .map(Invoice::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(invoices, page, total.max(0) as u64))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn soft_delete_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["soft_delete_invoice"])
            .start_timer();

        let result = sqlx::query(&format!(
            "UPDATE invoices SET deleted_utc = NOW(), updated_utc = NOW() \
             WHERE tenant_id = $1 AND invoice_id = $2 AND {NOT_DELETED}"
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to delete invoice"))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn close_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        action: CloseAction,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let Some(invoice) = Self::lock_invoice(&mut *tx, tenant_id, invoice_id).await? else {
            return Ok(None);
        };
        let updated = ledger::close_invoice(&invoice, action, Utc::now())?;

        sqlx::query("UPDATE invoices SET status = $3, updated_utc = $4 WHERE tenant_id = $1 AND invoice_id = $2")
            .bind(tenant_id)
            .bind(invoice_id)
            .bind(updated.status.as_str())
            .bind(updated.updated_utc)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to update invoice status"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit status change"))?;

        timer.observe_duration();

        Ok(Some(updated))
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, invoice_id = %input.invoice_id))]
    async fn record_payment(&self, input: &RecordPayment) -> Result<PaymentApplied, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let now = Utc::now();
        let day = now.date_naive();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let invoice = Self::lock_invoice(&mut *tx, input.tenant_id, input.invoice_id)
            .await?
            .ok_or_else(|| invoice_not_found(input.invoice_id))?;

        ledger::check_payment(&invoice, input.amount)?;

        let sequence =
            Self::next_sequence(&mut *tx, input.tenant_id, NumberPrefix::Payment, day).await?;
        let applied = ledger::apply_payment(
            &invoice,
            input,
            numbering::format(NumberPrefix::Payment, day, sequence),
            now,
        )?;
        let payment = &applied.payment;
        let updated = &applied.invoice;

        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, tenant_id, payment_number, invoice_id, amount,
                payment_method, status, payment_date, reference_number, notes, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.tenant_id)
        .bind(&payment.payment_number)
        .bind(payment.invoice_id)
        .bind(payment.amount)
        .bind(payment.payment_method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.payment_date)
        .bind(&payment.reference_number)
        .bind(&payment.notes)
        .bind(payment.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Payment number '{}' already exists",
                    payment.payment_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)),
        })?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET amount_paid = $3, balance = $4, status = $5, paid_date = $6, updated_utc = $7
            WHERE tenant_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(updated.tenant_id)
        .bind(updated.invoice_id)
        .bind(updated.amount_paid)
        .bind(updated.balance)
        .bind(updated.status.as_str())
        .bind(updated.paid_date)
        .bind(updated.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update invoice balance"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit payment"))?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            payment_number = %payment.payment_number,
            balance = %updated.balance,
            status = %updated.status,
            "Payment recorded"
        );

        Ok(applied)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, payment_id = %payment_id))]
    async fn get_payment(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments p \
             JOIN invoices i ON i.invoice_id = p.invoice_id \
             WHERE p.tenant_id = $1 AND p.payment_id = $2 AND i.{NOT_DELETED}"
        ))
        .bind(tenant_id)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get payment"))?;

        timer.observe_duration();

        row.map(Payment::try_from).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn list_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Vec<Payment>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        if self.fetch_invoice(tenant_id, invoice_id).await?.is_none() {
            return Ok(None);
        }
        let payments = self.fetch_payments(invoice_id).await?;

        timer.observe_duration();

        Ok(Some(payments))
    }
}
