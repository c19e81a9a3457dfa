//! PostgreSQL store for inventory-service.

use crate::models::{
    AdjustStock, AdjustmentResult, StockKey, StockLevel, StockMovement, UnknownVariant,
};
use crate::services::adjustment::{self, Adjustment};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::StockStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use service_core::pagination::{Page, PageParams};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const LEVEL_COLUMNS: &str = "tenant_id, product_id, branch_id, current_quantity, \
    reserved_quantity, reorder_level, last_restocked_utc, updated_utc";

const MOVEMENT_COLUMNS: &str = "movement_id, tenant_id, product_id, branch_id, movement_type, \
    quantity, previous_quantity, new_quantity, outcome, reference, reason, notes, created_utc";

/// `branch_id` is part of the key even when NULL.
const KEY_MATCH: &str = "tenant_id = $1 AND product_id = $2 AND branch_id IS NOT DISTINCT FROM $3";

#[derive(FromRow)]
struct LevelRow {
    tenant_id: Uuid,
    product_id: Uuid,
    branch_id: Option<Uuid>,
    current_quantity: i32,
    reserved_quantity: i32,
    reorder_level: i32,
    last_restocked_utc: Option<DateTime<Utc>>,
    updated_utc: DateTime<Utc>,
}

impl From<LevelRow> for StockLevel {
    fn from(row: LevelRow) -> Self {
        StockLevel {
            tenant_id: row.tenant_id,
            product_id: row.product_id,
            branch_id: row.branch_id,
            current_quantity: row.current_quantity,
            reserved_quantity: row.reserved_quantity,
            available_quantity: row.current_quantity - row.reserved_quantity,
            reorder_level: row.reorder_level,
            last_restocked_utc: row.last_restocked_utc,
            updated_utc: row.updated_utc,
        }
    }
}

#[derive(FromRow)]
struct MovementRow {
    movement_id: Uuid,
    tenant_id: Uuid,
    product_id: Uuid,
    branch_id: Option<Uuid>,
    movement_type: String,
    quantity: i32,
    previous_quantity: i32,
    new_quantity: i32,
    outcome: String,
    reference: Option<String>,
    reason: Option<String>,
    notes: Option<String>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            movement_id: row.movement_id,
            tenant_id: row.tenant_id,
            product_id: row.product_id,
            branch_id: row.branch_id,
            movement_type: row.movement_type.parse().map_err(corrupt)?,
            quantity: row.quantity,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            outcome: row.outcome.parse().map_err(corrupt)?,
            reference: row.reference,
            reason: row.reason,
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
    #[instrument(skip(database_url), fields(service = "inventory-service"))]
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

    /// Make sure the level row exists, then lock it until the caller's
    /// transaction ends.
    async fn lock_level(conn: &mut PgConnection, key: &StockKey) -> Result<StockLevel, AppError> {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (tenant_id, product_id, branch_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, product_id, branch_id) DO NOTHING
            "#,
        )
        .bind(key.tenant_id)
        .bind(key.product_id)
        .bind(key.branch_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to create stock level"))?;

        let row = sqlx::query_as::<_, LevelRow>(&format!(
            "SELECT {LEVEL_COLUMNS} FROM stock_levels WHERE {KEY_MATCH} FOR UPDATE"
        ))
        .bind(key.tenant_id)
        .bind(key.product_id)
        .bind(key.branch_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("Failed to lock stock level"))?;

        Ok(row.into())
    }

    async fn insert_movement(
        conn: &mut PgConnection,
        movement: &StockMovement,
    ) -> Result<(), AppError> {
        sqlx::query(&format!(
            "INSERT INTO stock_movements ({MOVEMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(movement.movement_id)
        .bind(movement.tenant_id)
        .bind(movement.product_id)
        .bind(movement.branch_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.previous_quantity)
        .bind(movement.new_quantity)
        .bind(movement.outcome.as_str())
        .bind(&movement.reference)
        .bind(&movement.reason)
        .bind(&movement.notes)
        .bind(movement.created_utc)
        .execute(conn)
        .await
        .map_err(db_error("Failed to record stock movement"))?;
        Ok(())
    }

    async fn write_level(conn: &mut PgConnection, level: &StockLevel) -> Result<(), AppError> {
        sqlx::query(&format!(
            "UPDATE stock_levels \
             SET current_quantity = $4, reorder_level = $5, last_restocked_utc = $6, \
                 updated_utc = $7 \
             WHERE {KEY_MATCH}"
        ))
        .bind(level.tenant_id)
        .bind(level.product_id)
        .bind(level.branch_id)
        .bind(level.current_quantity)
        .bind(level.reorder_level)
        .bind(level.last_restocked_utc)
        .bind(level.updated_utc)
        .execute(conn)
        .await
        .map_err(db_error("Failed to update stock level"))?;
        Ok(())
    }
}

#[async_trait]
impl StockStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(
        skip(self, input),
        fields(tenant_id = %input.tenant_id, product_id = %input.product_id, movement_type = %input.movement_type)
    )]
    async fn adjust_stock(&self, input: &AdjustStock) -> Result<AdjustmentResult, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_stock"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let current = Self::lock_level(&mut *tx, &input.key()).await?;
        let outcome = match adjustment::plan(&current, input, Utc::now())? {
            Adjustment::Applied(result) => {
                Self::write_level(&mut *tx, &result.level).await?;
                Self::insert_movement(&mut *tx, &result.movement).await?;
                Ok(result)
            }
            Adjustment::Rejected { movement, error } => {
                Self::insert_movement(&mut *tx, &movement).await?;
                Err(AppError::from(error))
            }
        };

        // The rejected attempt is committed too; it is part of the audit log.
        tx.commit()
            .await
            .map_err(db_error("Failed to commit stock adjustment"))?;

        timer.observe_duration();
        outcome
    }

    #[instrument(skip(self), fields(tenant_id = %key.tenant_id, product_id = %key.product_id))]
    async fn get_level(&self, key: &StockKey) -> Result<Option<StockLevel>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_level"])
            .start_timer();

        let row = sqlx::query_as::<_, LevelRow>(&format!(
            "SELECT {LEVEL_COLUMNS} FROM stock_levels WHERE {KEY_MATCH}"
        ))
        .bind(key.tenant_id)
        .bind(key.product_id)
        .bind(key.branch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get stock level"))?;

        timer.observe_duration();
        Ok(row.map(StockLevel::from))
    }

    #[instrument(skip(self), fields(tenant_id = %key.tenant_id, product_id = %key.product_id))]
    async fn list_movements(
        &self,
        key: &StockKey,
        page: PageParams,
    ) -> Result<Page<StockMovement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_movements"])
            .start_timer();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM stock_movements WHERE {KEY_MATCH}"
        ))
        .bind(key.tenant_id)
        .bind(key.product_id)
        .bind(key.branch_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to count stock movements"))?;

        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE {KEY_MATCH} \
             ORDER BY created_utc DESC, movement_id DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(key.tenant_id)
        .bind(key.product_id)
        .bind(key.branch_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list stock movements"))?;

        timer.observe_duration();

        let movements = rows
            .into_iter()
            .map(StockMovement::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(movements, page, total.max(0) as u64))
    }

    #[instrument(skip(self), fields(tenant_id = %key.tenant_id, product_id = %key.product_id))]
    async fn set_reorder_level(
        &self,
        key: &StockKey,
        reorder_level: i32,
    ) -> Result<StockLevel, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_reorder_level"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let current = Self::lock_level(&mut *tx, key).await?;
        let updated = adjustment::with_reorder_level(&current, reorder_level, Utc::now())?;
        Self::write_level(&mut *tx, &updated).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit reorder level"))?;

        timer.observe_duration();
        Ok(updated)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_low_stock(
        &self,
        tenant_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<StockLevel>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_low_stock"])
            .start_timer();

        let rows = sqlx::query_as::<_, LevelRow>(&format!(
            "SELECT {LEVEL_COLUMNS} FROM stock_levels \
             WHERE tenant_id = $1 \
               AND ($2::uuid IS NULL OR branch_id = $2) \
               AND current_quantity - reserved_quantity <= reorder_level \
             ORDER BY product_id, branch_id NULLS FIRST"
        ))
        .bind(tenant_id)
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list low stock"))?;

        timer.observe_duration();
        Ok(rows.into_iter().map(StockLevel::from).collect())
    }
}
