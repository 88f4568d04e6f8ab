//! Read access to business events

use crn_common::db::EventRecord;
use crn_common::Result;
use sqlx::SqlitePool;

const EVENT_COLUMNS: &str = "id, customer_id, business_id, severity, event_type, note, occurred_at";

pub async fn find_event(pool: &SqlitePool, event_id: &str) -> Result<Option<EventRecord>> {
    let sql = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
    let event = sqlx::query_as::<_, EventRecord>(&sql)
        .bind(event_id)
        .fetch_optional(pool)
        .await?;

    Ok(event)
}

/// A customer's events as recorded by one business, oldest first
pub async fn for_customer(
    pool: &SqlitePool,
    business_id: &str,
    customer_id: &str,
) -> Result<Vec<EventRecord>> {
    let sql = format!(
        "SELECT {} FROM events WHERE business_id = ? AND customer_id = ? ORDER BY occurred_at",
        EVENT_COLUMNS
    );
    let events = sqlx::query_as::<_, EventRecord>(&sql)
        .bind(business_id)
        .bind(customer_id)
        .fetch_all(pool)
        .await?;

    Ok(events)
}
