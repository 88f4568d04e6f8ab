//! Database schema migrations
//!
//! Versioned changes applied after the `CREATE TABLE IF NOT EXISTS` pass.
//! Versions are tracked in `schema_version`. Every migration is idempotent.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations**
//! 2. **Always add new migrations** for each schema change
//! 3. **Use ALTER TABLE** so existing rows survive

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: secondary indexes for scoring reads and batch scans
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: secondary indexes");

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_events_customer_time ON events (customer_id, occurred_at)",
        "CREATE INDEX IF NOT EXISTS idx_customers_business ON customers (business_id)",
        "CREATE INDEX IF NOT EXISTS idx_property_municipality ON property_records (municipality COLLATE NOCASE)",
        "CREATE INDEX IF NOT EXISTS idx_property_county ON property_records (county COLLATE NOCASE)",
        "CREATE INDEX IF NOT EXISTS idx_ledger_identity ON network_event_ledger (network_identity_id, occurred_at)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: `network_opt_in` on businesses tables created by older
/// CRUD layers
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: businesses.network_opt_in");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('businesses') WHERE name = 'network_opt_in'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  network_opt_in column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE businesses ADD COLUMN network_opt_in INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await?;

    info!("  Added network_opt_in column to businesses table");
    Ok(())
}
