//! Business customer access
//!
//! Customers are owned by the business CRUD layer. This module reads them for
//! scoring and sync, and inserts them for bulk import with store-enforced
//! de-duplication.

use chrono::{DateTime, Utc};
use crn_common::db::Customer;
use crn_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str =
    "c.id, c.business_id, c.name, c.phone, c.email, c.address, c.city, c.state, c.county, c.created_at";

/// Pre-parsed customer row offered for import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(String),
    /// Same de-dup key already stored for this business
    Duplicate,
    /// Business is at its customer count limit
    LimitReached,
}

/// Insert one customer unless it duplicates a stored one or the business is
/// full
///
/// The duplicate check and the limit check run inside the INSERT itself, so
/// concurrent imports cannot both slip past either guard.
pub async fn insert_deduplicated(
    pool: &SqlitePool,
    business_id: &str,
    row: &NewCustomer,
    dedup_key: &str,
    customer_limit: Option<i64>,
    now: DateTime<Utc>,
) -> Result<InsertOutcome> {
    let id = Uuid::new_v4().to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO customers (
            id, business_id, name, phone, email, address, city, state, county, dedup_key, created_at
        )
        SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        WHERE ? IS NULL
           OR (SELECT COUNT(*) FROM customers WHERE business_id = ?) < ?
        ON CONFLICT(business_id, dedup_key) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(business_id)
    .bind(row.name.trim())
    .bind(&row.phone)
    .bind(&row.email)
    .bind(&row.address)
    .bind(&row.city)
    .bind(&row.state)
    .bind(&row.county)
    .bind(dedup_key)
    .bind(now)
    .bind(customer_limit)
    .bind(business_id)
    .bind(customer_limit)
    .execute(pool)
    .await?
    .rows_affected()
        == 1;

    if inserted {
        return Ok(InsertOutcome::Inserted(id));
    }

    let duplicate: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM customers WHERE business_id = ? AND dedup_key = ?)",
    )
    .bind(business_id)
    .bind(dedup_key)
    .fetch_one(pool)
    .await?;

    if duplicate {
        Ok(InsertOutcome::Duplicate)
    } else {
        Ok(InsertOutcome::LimitReached)
    }
}

pub async fn find_for_business(
    pool: &SqlitePool,
    business_id: &str,
    customer_id: &str,
) -> Result<Option<Customer>> {
    let sql = format!(
        "SELECT {} FROM customers c WHERE c.business_id = ? AND c.id = ?",
        CUSTOMER_COLUMNS
    );
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(business_id)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

    Ok(customer)
}

/// One keyset page of customers belonging to network-opted-in businesses,
/// optionally narrowed to one business
pub async fn fetch_opted_in_page(
    pool: &SqlitePool,
    business_id: Option<&str>,
    after_id: Option<&str>,
    limit: i64,
) -> Result<Vec<Customer>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM customers c
        JOIN businesses b ON b.id = c.business_id
        WHERE b.network_opt_in = 1
          AND (? IS NULL OR c.business_id = ?)
          AND (? IS NULL OR c.id > ?)
        ORDER BY c.id
        LIMIT ?
        "#,
        CUSTOMER_COLUMNS
    );
    let customers = sqlx::query_as::<_, Customer>(&sql)
        .bind(business_id)
        .bind(business_id)
        .bind(after_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(customers)
}

pub async fn count_for_business(pool: &SqlitePool, business_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE business_id = ?")
        .bind(business_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
