use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the `email_send_tracking` table and its
/// secondary indexes if they do not already exist (§6).
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let table = config.tracking_table();
    let prefix = &config.table_prefix;

    let create_table = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            org_id BIGINT NOT NULL,
            contact_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            scheduled_date DATE NOT NULL,
            send_status TEXT NOT NULL,
            send_mode TEXT NOT NULL,
            test_email TEXT,
            send_attempt_count INTEGER NOT NULL DEFAULT 0,
            last_attempt_time TIMESTAMPTZ,
            last_error TEXT,
            batch_id TEXT NOT NULL,
            external_message_id TEXT,
            delivery_status TEXT,
            status_checked_at TIMESTAMPTZ,
            status_details TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"
    );

    sqlx::query(&create_table).execute(pool).await?;

    let indexes = [
        format!("CREATE INDEX IF NOT EXISTS {prefix}tracking_batch_id_idx ON {table} (batch_id)"),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_send_status_idx ON {table} (send_status)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_send_mode_idx ON {table} (send_mode)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_contact_id_idx ON {table} (contact_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_contact_kind_idx ON {table} (contact_id, kind)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_status_scheduled_idx ON {table} (send_status, scheduled_date)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_message_id_idx ON {table} (external_message_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}tracking_delivery_status_idx ON {table} (delivery_status)"
        ),
        // Enforces the (batch_id, contact_id, kind, scheduled_date) uniqueness
        // invariant (§4.5) at the database level, backstopping insert_batch's
        // own pre-insert check.
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {prefix}tracking_dedup_idx ON {table} (batch_id, contact_id, kind, scheduled_date)"
        ),
    ];

    for index in &indexes {
        sqlx::query(index).execute(pool).await?;
    }

    Ok(())
}
