//! Database initialization
//!
//! Creates the SQLite database on first run and brings an existing one up to
//! the current schema. Every statement is idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets resolvers read while one writer holds the lock
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and run migrations on an open pool
///
/// Used directly by tests with `sqlite::memory:` pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;

    // Business-owned tables (written by the business CRUD layer)
    create_businesses_table(pool).await?;
    create_customers_table(pool).await?;
    create_events_table(pool).await?;

    // External property data (written by the scraper)
    create_property_records_table(pool).await?;

    // Network tables (written only by this system)
    create_network_identities_table(pool).await?;
    create_identity_links_table(pool).await?;
    create_identity_business_seen_table(pool).await?;
    create_network_event_ledger_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Businesses. `network_synced` and `customer_count_limit` are owned by the
/// billing/CRUD layer and only read here, except for `network_synced`
/// which a clean full resync sets.
pub async fn create_businesses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS businesses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            network_opt_in INTEGER NOT NULL DEFAULT 0,
            network_synced INTEGER NOT NULL DEFAULT 0,
            customer_count_limit INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Customers. `dedup_key` backs store-enforced import de-duplication.
pub async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            address TEXT,
            city TEXT,
            state TEXT,
            county TEXT,
            dedup_key TEXT,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (business_id, dedup_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Events (notes). Immutable once written.
pub async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            business_id TEXT NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
            severity INTEGER NOT NULL CHECK (severity BETWEEN 1 AND 5),
            event_type TEXT NOT NULL DEFAULT 'note',
            note TEXT NOT NULL DEFAULT '',
            occurred_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_property_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS property_records (
            id TEXT PRIMARY KEY,
            owner_name TEXT,
            address_full TEXT NOT NULL,
            property_class TEXT,
            municipality TEXT,
            county TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Network identities. Each hash column is independently unique; SQLite
/// UNIQUE allows any number of NULLs.
pub async fn create_network_identities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS network_identities (
            id TEXT PRIMARY KEY,
            phone_hash TEXT UNIQUE,
            phone_last_four TEXT,
            email_hash TEXT UNIQUE,
            email_domain TEXT,
            address_hash TEXT UNIQUE,
            weighted_score INTEGER NOT NULL DEFAULT 0 CHECK (weighted_score >= 0),
            risk_tier TEXT NOT NULL DEFAULT 'unknown',
            total_incidents INTEGER NOT NULL DEFAULT 0,
            total_positive_events INTEGER NOT NULL DEFAULT 0,
            clean_streak_months INTEGER NOT NULL DEFAULT 0,
            seen_by_business_count INTEGER NOT NULL DEFAULT 0,
            first_seen_at TIMESTAMP NOT NULL,
            last_seen_at TIMESTAMP NOT NULL,
            last_incident_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// At most one link per property record
pub async fn create_identity_links_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identity_links (
            id TEXT PRIMARY KEY,
            property_record_id TEXT NOT NULL UNIQUE REFERENCES property_records(id),
            network_identity_id TEXT NOT NULL REFERENCES network_identities(id),
            match_type TEXT NOT NULL CHECK (match_type IN ('address', 'auto_generated')),
            match_confidence REAL NOT NULL CHECK (match_confidence BETWEEN 0.0 AND 1.0),
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Distinct businesses that have resolved an identity
pub async fn create_identity_business_seen_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identity_business_seen (
            network_identity_id TEXT NOT NULL REFERENCES network_identities(id),
            business_id TEXT NOT NULL,
            first_seen_at TIMESTAMP NOT NULL,
            PRIMARY KEY (network_identity_id, business_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Every severity folded into a network identity, in application order.
///
/// The identity's counters are a fold over these rows ordered by
/// `occurred_at`. `event_id` is set for business event contributions and
/// makes them idempotent; direct applications leave it NULL. No raw
/// identifiers are stored here.
pub async fn create_network_event_ledger_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS network_event_ledger (
            id TEXT PRIMARY KEY,
            event_id TEXT UNIQUE REFERENCES events(id),
            network_identity_id TEXT NOT NULL REFERENCES network_identities(id),
            severity INTEGER NOT NULL CHECK (severity BETWEEN 1 AND 5),
            occurred_at TIMESTAMP NOT NULL,
            applied_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
