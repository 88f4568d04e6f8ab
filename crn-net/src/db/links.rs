//! Identity link persistence (property record -> network identity)

use chrono::{DateTime, Utc};
use crn_common::db::{IdentityLink, MatchType};
use crn_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Link a property record to an identity
///
/// A property record carries at most one link. Returns false when one
/// already existed, in which case nothing was written.
pub async fn insert_link(
    pool: &SqlitePool,
    property_record_id: &str,
    identity_id: &str,
    match_type: MatchType,
    confidence: f64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO identity_links (
            id, property_record_id, network_identity_id, match_type, match_confidence, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(property_record_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(property_record_id)
    .bind(identity_id)
    .bind(match_type.as_str())
    .bind(confidence.clamp(0.0, 1.0))
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected()
        == 1;

    Ok(inserted)
}

pub async fn find_for_property(
    pool: &SqlitePool,
    property_record_id: &str,
) -> Result<Option<IdentityLink>> {
    let link = sqlx::query_as::<_, IdentityLink>(
        r#"
        SELECT id, property_record_id, network_identity_id, match_type, match_confidence, created_at
        FROM identity_links
        WHERE property_record_id = ?
        "#,
    )
    .bind(property_record_id)
    .fetch_optional(pool)
    .await?;

    Ok(link)
}

/// Whether any link points at the identity owning this address hash
pub async fn exists_for_address_hash(pool: &SqlitePool, address_hash: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM identity_links l
            JOIN network_identities n ON n.id = l.network_identity_id
            WHERE n.address_hash = ?
        )
        "#,
    )
    .bind(address_hash)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

pub async fn count_links(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identity_links")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
