use std::str::FromStr;

use async_trait::async_trait;
use cadence_core::intent::IntentKind;
use cadence_core::tracking::{SendMode, SendStatus, TrackingRow};
use cadence_core::{BatchId, ContactId, OrgId};
use cadence_store::error::StoreError;
use cadence_store::store::TrackingStore;
use cadence_store::types::{BatchFilter, BatchSummary, ClaimScope, DeliveryStatusUpdate, Outcome};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::migrations;

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StoreError::Backend(e.to_string()))?;

    if let Some(mode) = &config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => return Err(StoreError::Backend(format!("unknown ssl_mode: {other}"))),
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(path) = &config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

/// `PostgreSQL`-backed implementation of [`TrackingStore`].
pub struct PostgresTrackingStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresTrackingStore {
    /// Connects to `PostgreSQL`, builds a connection pool, and ensures the
    /// tracking schema exists.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool, config })
    }

    /// Builds a store from an already-constructed pool, e.g. one shared with
    /// another component. Still runs migrations.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool, config })
    }

    fn table(&self) -> String {
        self.config.tracking_table()
    }
}

fn row_to_tracking_row(row: &sqlx::postgres::PgRow) -> Result<TrackingRow, StoreError> {
    let kind: String = row.try_get("kind").map_err(sqlx_err)?;
    let send_status: String = row.try_get("send_status").map_err(sqlx_err)?;
    let send_mode: String = row.try_get("send_mode").map_err(sqlx_err)?;

    Ok(TrackingRow {
        id: Some(row.try_get("id").map_err(sqlx_err)?),
        org_id: OrgId::new(row.try_get("org_id").map_err(sqlx_err)?),
        contact_id: ContactId::from(row.try_get::<String, _>("contact_id").map_err(sqlx_err)?),
        kind: IntentKind::from_str(&kind).map_err(StoreError::Backend)?,
        scheduled_date: row.try_get::<NaiveDate, _>("scheduled_date").map_err(sqlx_err)?,
        send_status: SendStatus::from_str(&send_status).map_err(StoreError::Backend)?,
        send_mode: SendMode::from_str(&send_mode).map_err(StoreError::Backend)?,
        test_email: row.try_get("test_email").map_err(sqlx_err)?,
        send_attempt_count: row.try_get("send_attempt_count").map_err(sqlx_err)?,
        last_attempt_time: row.try_get("last_attempt_time").map_err(sqlx_err)?,
        last_error: row.try_get("last_error").map_err(sqlx_err)?,
        batch_id: BatchId::new(row.try_get::<String, _>("batch_id").map_err(sqlx_err)?),
        external_message_id: row.try_get("external_message_id").map_err(sqlx_err)?,
        delivery_status: row.try_get("delivery_status").map_err(sqlx_err)?,
        status_checked_at: row.try_get("status_checked_at").map_err(sqlx_err)?,
        status_details: row.try_get("status_details").map_err(sqlx_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(sqlx_err)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(sqlx_err)?,
    })
}

fn sqlx_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Maps a Postgres unique-violation (the `tracking_dedup_idx` constraint from
/// `migrations.rs`) on `row` to `StoreError::DuplicateRow`; any other error
/// passes through as a backend error.
fn duplicate_row_err(e: sqlx::Error, row: &TrackingRow) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::DuplicateRow {
                batch_id: row.batch_id.to_string(),
                contact_id: row.contact_id.to_string(),
                kind: row.kind.to_string(),
                scheduled_date: row.scheduled_date,
            };
        }
    }
    sqlx_err(e)
}

#[async_trait]
impl TrackingStore for PostgresTrackingStore {
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    async fn insert_batch(&self, rows: Vec<TrackingRow>) -> Result<BatchId, StoreError> {
        let batch_id = rows
            .first()
            .map(|r| r.batch_id.clone())
            .ok_or_else(|| StoreError::Backend("cannot insert an empty batch".into()))?;

        let table = self.table();
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;

        for row in &rows {
            let query = format!(
                "INSERT INTO {table}
                 (org_id, contact_id, kind, scheduled_date, send_status, send_mode,
                  test_email, send_attempt_count, batch_id, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())"
            );
            sqlx::query(&query)
                .bind(row.org_id.value())
                .bind(row.contact_id.as_str())
                .bind(row.kind.as_str())
                .bind(row.scheduled_date)
                .bind(row.send_status.as_str())
                .bind(row.send_mode.as_str())
                .bind(&row.test_email)
                .bind(row.send_attempt_count)
                .bind(row.batch_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| duplicate_row_err(e, row))?;
        }

        tx.commit().await.map_err(sqlx_err)?;
        debug!(batch_id = %batch_id, inserted = rows.len(), "inserted tracking batch");
        Ok(batch_id)
    }

    async fn list_batches(&self, filter: BatchFilter) -> Result<Vec<BatchSummary>, StoreError> {
        let table = self.table();
        let mut conditions = Vec::new();
        if filter.org_id.is_some() {
            conditions.push("org_id = $1".to_string());
        }
        if filter.send_mode.is_some() {
            conditions.push(format!("send_mode = ${}", conditions.len() + 1));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT batch_id, org_id, send_mode,
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE send_status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE send_status = 'processing') AS processing,
                    COUNT(*) FILTER (WHERE send_status IN ('sent','delivered','accepted')) AS sent,
                    COUNT(*) FILTER (WHERE send_status = 'deferred') AS deferred,
                    COUNT(*) FILTER (WHERE send_status = 'bounced') AS bounced,
                    COUNT(*) FILTER (WHERE send_status = 'dropped') AS dropped,
                    COUNT(*) FILTER (WHERE send_status = 'failed') AS failed,
                    COUNT(*) FILTER (WHERE send_status = 'skipped') AS skipped,
                    MIN(created_at) AS created_at
             FROM {table}
             {where_clause}
             GROUP BY batch_id, org_id, send_mode
             ORDER BY MIN(created_at) DESC"
        );

        let mut q = sqlx::query(&query);
        if let Some(org_id) = filter.org_id {
            q = q.bind(org_id.value());
        }
        if let Some(send_mode) = filter.send_mode {
            q = q.bind(send_mode.as_str());
        }

        let rows = q.fetch_all(&self.pool).await.map_err(sqlx_err)?;
        rows.into_iter().map(|r| summary_from_row(&r)).collect()
    }

    async fn get_batch(&self, batch_id: &BatchId) -> Result<BatchSummary, StoreError> {
        let table = self.table();
        let query = format!(
            "SELECT batch_id, org_id, send_mode,
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE send_status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE send_status = 'processing') AS processing,
                    COUNT(*) FILTER (WHERE send_status IN ('sent','delivered','accepted')) AS sent,
                    COUNT(*) FILTER (WHERE send_status = 'deferred') AS deferred,
                    COUNT(*) FILTER (WHERE send_status = 'bounced') AS bounced,
                    COUNT(*) FILTER (WHERE send_status = 'dropped') AS dropped,
                    COUNT(*) FILTER (WHERE send_status = 'failed') AS failed,
                    COUNT(*) FILTER (WHERE send_status = 'skipped') AS skipped,
                    MIN(created_at) AS created_at
             FROM {table}
             WHERE batch_id = $1
             GROUP BY batch_id, org_id, send_mode"
        );

        let row = sqlx::query(&query)
            .bind(batch_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?
            .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()))?;

        summary_from_row(&row)
    }

    #[instrument(skip(self), fields(batch_id = %batch_id))]
    async fn claim_chunk(
        &self,
        batch_id: &BatchId,
        scope: ClaimScope,
        limit: usize,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        let table = self.table();
        // SELECT ... FOR UPDATE SKIP LOCKED lets concurrent claimers on the
        // same batch never contend on the same rows. Postgres-specific
        // adaptation of the same claim-once invariant, not a port of any
        // particular upstream claiming query.
        let query = format!(
            "WITH claimed AS (
                SELECT id FROM {table}
                WHERE batch_id = $1 AND send_status = 'pending' AND scheduled_date <= $2
                ORDER BY id
                LIMIT $3
                FOR UPDATE SKIP LOCKED
             )
             UPDATE {table} SET send_status = 'processing', updated_at = NOW()
             WHERE id IN (SELECT id FROM claimed)
             RETURNING *"
        );

        let rows = sqlx::query(&query)
            .bind(batch_id.as_str())
            .bind(scope.not_after)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;

        rows.iter().map(row_to_tracking_row).collect()
    }

    async fn finalize(&self, row_id: i64, outcome: Outcome) -> Result<(), StoreError> {
        let table = self.table();
        let query = format!(
            "UPDATE {table}
             SET send_status = $2,
                 send_attempt_count = send_attempt_count + 1,
                 last_attempt_time = NOW(),
                 last_error = $3,
                 external_message_id = $4,
                 test_email = COALESCE($5, test_email),
                 updated_at = NOW()
             WHERE id = $1 AND send_status = 'processing'"
        );

        let result = sqlx::query(&query)
            .bind(row_id)
            .bind(outcome.send_status.as_str())
            .bind(&outcome.error)
            .bind(&outcome.external_message_id)
            .bind(&outcome.test_email)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidTransition {
                row_id,
                from: SendStatus::Pending,
                to: outcome.send_status,
            });
        }
        Ok(())
    }

    async fn mark_failed_as_retryable(
        &self,
        batch_id: &BatchId,
        n: usize,
        max_attempts: i32,
    ) -> Result<usize, StoreError> {
        let table = self.table();
        let query = format!(
            "WITH retryable AS (
                SELECT id FROM {table}
                WHERE batch_id = $1 AND send_status = 'failed' AND send_attempt_count < $3
                ORDER BY id
                LIMIT $2
             )
             UPDATE {table} SET send_status = 'pending', updated_at = NOW()
             WHERE id IN (SELECT id FROM retryable)"
        );
        let result = sqlx::query(&query)
            .bind(batch_id.as_str())
            .bind(n as i64)
            .bind(max_attempts)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn update_delivery_status(
        &self,
        row_id: i64,
        update: DeliveryStatusUpdate,
    ) -> Result<(), StoreError> {
        let table = self.table();
        let terminal_status = update.terminal_send_status();
        let query = format!(
            "UPDATE {table}
             SET delivery_status = $2, status_details = $3, status_checked_at = $4, updated_at = NOW(),
                 send_status = COALESCE($5, send_status)
             WHERE id = $1"
        );
        let result = sqlx::query(&query)
            .bind(row_id)
            .bind(&update.delivery_status)
            .bind(&update.status_details)
            .bind(update.checked_at)
            .bind(terminal_status.map(SendStatus::as_str))
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(row_id));
        }
        Ok(())
    }

    async fn list_stale_for_status_check(
        &self,
        batch_id: &BatchId,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        let table = self.table();
        let query = format!(
            "SELECT * FROM {table}
             WHERE batch_id = $1
               AND send_status IN ('sent', 'deferred')
               AND (status_checked_at IS NULL OR status_checked_at < $2)
             ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(batch_id.as_str())
            .bind(stale_before)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        rows.iter().map(row_to_tracking_row).collect()
    }
}

fn summary_from_row(row: &sqlx::postgres::PgRow) -> Result<BatchSummary, StoreError> {
    let send_mode: String = row.try_get("send_mode").map_err(sqlx_err)?;
    Ok(BatchSummary {
        batch_id: BatchId::new(row.try_get::<String, _>("batch_id").map_err(sqlx_err)?),
        org_id: OrgId::new(row.try_get("org_id").map_err(sqlx_err)?),
        send_mode: SendMode::from_str(&send_mode).map_err(StoreError::Backend)?,
        total: row.try_get("total").map_err(sqlx_err)?,
        pending: row.try_get("pending").map_err(sqlx_err)?,
        processing: row.try_get("processing").map_err(sqlx_err)?,
        sent: row.try_get("sent").map_err(sqlx_err)?,
        deferred: row.try_get("deferred").map_err(sqlx_err)?,
        bounced: row.try_get("bounced").map_err(sqlx_err)?,
        dropped: row.try_get("dropped").map_err(sqlx_err)?,
        failed: row.try_get("failed").map_err(sqlx_err)?,
        skipped: row.try_get("skipped").map_err(sqlx_err)?,
        created_at: row.try_get("created_at").map_err(sqlx_err)?,
    })
}
