//! Network identity persistence
//!
//! Every write here is a single statement guarded by the UNIQUE constraints
//! on the hash columns. Callers never check for existence before writing.

use chrono::{DateTime, Utc};
use crn_common::db::NetworkIdentity;
use crn_common::reputation::{ReputationCounters, Severity};
use crn_common::{Error, HashedContact, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

const IDENTITY_COLUMNS: &str = r#"
    id, phone_hash, phone_last_four, email_hash, email_domain, address_hash,
    weighted_score, risk_tier, total_incidents, total_positive_events,
    clean_streak_months, seen_by_business_count,
    first_seen_at, last_seen_at, last_incident_at
"#;

/// Which unique hash column a lookup goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    Phone,
    Email,
    Address,
}

impl IdentityKey {
    fn column(self) -> &'static str {
        match self {
            IdentityKey::Phone => "phone_hash",
            IdentityKey::Email => "email_hash",
            IdentityKey::Address => "address_hash",
        }
    }
}

/// Hash keys (plus non-reversible metadata) offered for one person
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityKeys {
    pub phone_hash: Option<String>,
    pub phone_last_four: Option<String>,
    pub email_hash: Option<String>,
    pub email_domain: Option<String>,
    pub address_hash: Option<String>,
}

impl IdentityKeys {
    pub fn from_address_hash(address_hash: String) -> Self {
        Self {
            address_hash: Some(address_hash),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phone_hash.is_none() && self.email_hash.is_none() && self.address_hash.is_none()
    }

    /// Present keys in lookup priority: phone, then email, then address
    pub fn lookup_order(&self) -> Vec<(IdentityKey, &str)> {
        [
            (IdentityKey::Phone, self.phone_hash.as_deref()),
            (IdentityKey::Email, self.email_hash.as_deref()),
            (IdentityKey::Address, self.address_hash.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, hash)| hash.map(|h| (key, h)))
        .collect()
    }

    /// Short prefix of the strongest key, safe for log lines
    pub fn log_key(&self) -> &str {
        let key = self
            .phone_hash
            .as_deref()
            .or(self.email_hash.as_deref())
            .or(self.address_hash.as_deref())
            .unwrap_or("");
        &key[..key.len().min(12)]
    }
}

impl From<HashedContact> for IdentityKeys {
    fn from(contact: HashedContact) -> Self {
        Self {
            phone_hash: contact.phone_hash,
            phone_last_four: contact.phone_last_four,
            email_hash: contact.email_hash,
            email_domain: contact.email_domain,
            address_hash: None,
        }
    }
}

/// Insert a fresh identity unless any of its keys is already taken
///
/// Returns the new id, or `None` when a uniqueness constraint made the
/// insert a no-op (the caller re-reads the winning row).
pub async fn insert_if_absent(
    pool: &SqlitePool,
    keys: &IdentityKeys,
    now: DateTime<Utc>,
) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar(
        r#"
        INSERT INTO network_identities (
            id, phone_hash, phone_last_four, email_hash, email_domain, address_hash,
            weighted_score, risk_tier, total_incidents, total_positive_events,
            clean_streak_months, seen_by_business_count, first_seen_at, last_seen_at
        ) VALUES (?, ?, ?, ?, ?, ?, 0, 'unknown', 0, 0, 0, 0, ?, ?)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&keys.phone_hash)
    .bind(&keys.phone_last_four)
    .bind(&keys.email_hash)
    .bind(&keys.email_domain)
    .bind(&keys.address_hash)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<NetworkIdentity>> {
    let sql = format!("SELECT {} FROM network_identities WHERE id = ?", IDENTITY_COLUMNS);
    let identity = sqlx::query_as::<_, NetworkIdentity>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(identity)
}

pub async fn find_by_key(
    pool: &SqlitePool,
    key: IdentityKey,
    hash: &str,
) -> Result<Option<NetworkIdentity>> {
    let sql = format!(
        "SELECT {} FROM network_identities WHERE {} = ?",
        IDENTITY_COLUMNS,
        key.column()
    );
    let identity = sqlx::query_as::<_, NetworkIdentity>(&sql)
        .bind(hash)
        .fetch_optional(pool)
        .await?;

    Ok(identity)
}

/// First identity matching any offered key, in lookup priority
pub async fn find_by_keys(pool: &SqlitePool, keys: &IdentityKeys) -> Result<Option<NetworkIdentity>> {
    for (key, hash) in keys.lookup_order() {
        if let Some(identity) = find_by_key(pool, key, hash).await? {
            return Ok(Some(identity));
        }
    }
    Ok(None)
}

/// Fill in keys the identity does not carry yet
///
/// Each column is only written while it is NULL. A key already owned by a
/// different identity is left where it is. Returns how many keys were added.
pub async fn merge_keys(pool: &SqlitePool, id: &str, keys: &IdentityKeys) -> Result<usize> {
    let updates = [
        (
            "UPDATE network_identities SET phone_hash = ?, phone_last_four = ? WHERE id = ? AND phone_hash IS NULL",
            keys.phone_hash.as_deref(),
            keys.phone_last_four.as_deref(),
        ),
        (
            "UPDATE network_identities SET email_hash = ?, email_domain = ? WHERE id = ? AND email_hash IS NULL",
            keys.email_hash.as_deref(),
            keys.email_domain.as_deref(),
        ),
    ];

    let mut merged = 0;
    for (sql, hash, metadata) in updates {
        let Some(hash) = hash else { continue };
        let result = sqlx::query(sql)
            .bind(hash)
            .bind(metadata)
            .bind(id)
            .execute(pool)
            .await;
        merged += count_merged(result, id)?;
    }

    if let Some(address_hash) = keys.address_hash.as_deref() {
        let result = sqlx::query(
            "UPDATE network_identities SET address_hash = ? WHERE id = ? AND address_hash IS NULL",
        )
        .bind(address_hash)
        .bind(id)
        .execute(pool)
        .await;
        merged += count_merged(result, id)?;
    }

    Ok(merged)
}

fn count_merged(
    result: std::result::Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
    id: &str,
) -> Result<usize> {
    match result.map_err(Error::from) {
        Ok(done) => Ok(done.rows_affected() as usize),
        Err(Error::DuplicateKeyConflict(_)) => {
            debug!(identity_id = %id, "Key already owned by another identity, not merged");
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

pub async fn touch(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE network_identities SET last_seen_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record that a business resolved this identity
///
/// The counter moves only when the (identity, business) pair is new, so
/// repeated resolution by one business never double counts.
pub async fn record_business_sighting(
    pool: &SqlitePool,
    id: &str,
    business_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO identity_business_seen (network_identity_id, business_id, first_seen_at)
        VALUES (?, ?, ?)
        ON CONFLICT(network_identity_id, business_id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(business_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if inserted {
        sqlx::query(
            "UPDATE network_identities SET seen_by_business_count = seen_by_business_count + 1 WHERE id = ?",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(inserted)
}

/// One severity folded into an identity
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub identity_id: &'a str,
    /// Business event this came from; `None` for direct applications
    pub event_id: Option<&'a str>,
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
    pub applied_at: DateTime<Utc>,
}

/// Append to the ledger. Returns false when the business event was already
/// recorded.
pub async fn insert_ledger_entry(conn: &mut SqliteConnection, entry: &LedgerEntry<'_>) -> Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO network_event_ledger (
            id, event_id, network_identity_id, severity, occurred_at, applied_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(entry.event_id)
    .bind(entry.identity_id)
    .bind(i64::from(entry.severity))
    .bind(entry.occurred_at)
    .bind(entry.applied_at)
    .execute(conn)
    .await?
    .rows_affected()
        == 1;

    Ok(inserted)
}

/// Latest `occurred_at` in the identity's ledger
pub async fn latest_ledger_time(
    conn: &mut SqliteConnection,
    identity_id: &str,
) -> Result<Option<DateTime<Utc>>> {
    let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT occurred_at FROM network_event_ledger
        WHERE network_identity_id = ?
        ORDER BY occurred_at DESC
        LIMIT 1
        "#,
    )
    .bind(identity_id)
    .fetch_optional(conn)
    .await?;

    Ok(latest)
}

/// Full ledger history in application order
pub async fn ledger_history(
    conn: &mut SqliteConnection,
    identity_id: &str,
) -> Result<Vec<(Severity, DateTime<Utc>)>> {
    let rows: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT severity, occurred_at FROM network_event_ledger
        WHERE network_identity_id = ?
        ORDER BY occurred_at, applied_at, rowid
        "#,
    )
    .bind(identity_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|(severity, at)| Ok((Severity::new(severity)?, at)))
        .collect()
}

/// Incremental counter update for one severity, returning the new weighted
/// score, or `None` if the identity does not exist
pub async fn apply_increment(
    conn: &mut SqliteConnection,
    id: &str,
    severity: Severity,
    at: DateTime<Utc>,
) -> Result<Option<i64>> {
    let score: Option<i64> = if severity.is_negative() {
        sqlx::query_scalar(
            r#"
            UPDATE network_identities SET
                weighted_score = weighted_score + ?,
                total_incidents = total_incidents + 1,
                last_incident_at = ?,
                clean_streak_months = 0
            WHERE id = ?
            RETURNING weighted_score
            "#,
        )
        .bind(severity.incident_weight())
        .bind(at)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    } else {
        sqlx::query_scalar(
            r#"
            UPDATE network_identities SET
                weighted_score = MAX(0, weighted_score - ?),
                total_positive_events = total_positive_events + 1
            WHERE id = ?
            RETURNING weighted_score
            "#,
        )
        .bind(crn_common::tuning::POSITIVE_DECAY)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    };

    Ok(score)
}

/// Overwrite the history-derived counters. `clean_streak_months` belongs to
/// the periodic streak process and is not touched.
pub async fn store_counters(
    conn: &mut SqliteConnection,
    id: &str,
    counters: &ReputationCounters,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE network_identities SET
            weighted_score = ?,
            risk_tier = ?,
            total_incidents = ?,
            total_positive_events = ?,
            last_incident_at = ?
        WHERE id = ?
        "#,
    )
    .bind(counters.weighted_score)
    .bind(counters.risk_tier().as_str())
    .bind(counters.total_incidents)
    .bind(counters.total_positive_events)
    .bind(counters.last_incident_at)
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}

/// A late-arriving incident still ends the current streak
pub async fn reset_clean_streak(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    sqlx::query("UPDATE network_identities SET clean_streak_months = 0 WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn set_risk_tier(conn: &mut SqliteConnection, id: &str, tier: crn_common::RiskTier) -> Result<()> {
    sqlx::query("UPDATE network_identities SET risk_tier = ? WHERE id = ?")
        .bind(tier.as_str())
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn phone_keys(hash: &str) -> IdentityKeys {
        IdentityKeys {
            phone_hash: Some(hash.to_string()),
            phone_last_four: Some("4567".to_string()),
            ..IdentityKeys::default()
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_noop_on_taken_key() {
        let pool = test_pool().await;
        let now = Utc::now();

        let first = insert_if_absent(&pool, &phone_keys("p1"), now).await.unwrap();
        assert!(first.is_some());

        let second = insert_if_absent(&pool, &phone_keys("p1"), now).await.unwrap();
        assert!(second.is_none());

        let found = find_by_key(&pool, IdentityKey::Phone, "p1").await.unwrap().unwrap();
        assert_eq!(Some(found.id), first);
        assert_eq!(found.risk_tier, "unknown");
        assert_eq!(found.weighted_score, 0);
    }

    #[tokio::test]
    async fn test_merge_keys_only_fills_empty_columns() {
        let pool = test_pool().await;
        let now = Utc::now();
        let a = insert_if_absent(&pool, &phone_keys("p1"), now).await.unwrap().unwrap();
        let b = insert_if_absent(
            &pool,
            &IdentityKeys {
                email_hash: Some("taken".to_string()),
                ..IdentityKeys::default()
            },
            now,
        )
        .await
        .unwrap()
        .unwrap();

        // Email owned by b is not stolen; phone on a is not overwritten
        let offered = IdentityKeys {
            phone_hash: Some("p2".to_string()),
            email_hash: Some("taken".to_string()),
            address_hash: Some("addr".to_string()),
            ..IdentityKeys::default()
        };
        let merged = merge_keys(&pool, &a, &offered).await.unwrap();
        assert_eq!(merged, 1);

        let a_row = find_by_id(&pool, &a).await.unwrap().unwrap();
        assert_eq!(a_row.phone_hash.as_deref(), Some("p1"));
        assert_eq!(a_row.email_hash, None);
        assert_eq!(a_row.address_hash.as_deref(), Some("addr"));

        let b_row = find_by_id(&pool, &b).await.unwrap().unwrap();
        assert_eq!(b_row.email_hash.as_deref(), Some("taken"));
    }

    #[tokio::test]
    async fn test_business_sighting_counts_distinct_businesses() {
        let pool = test_pool().await;
        let now = Utc::now();
        let id = insert_if_absent(&pool, &phone_keys("p1"), now).await.unwrap().unwrap();

        assert!(record_business_sighting(&pool, &id, "biz-a", now).await.unwrap());
        assert!(!record_business_sighting(&pool, &id, "biz-a", now).await.unwrap());
        assert!(record_business_sighting(&pool, &id, "biz-b", now).await.unwrap());

        let row = find_by_id(&pool, &id).await.unwrap().unwrap();
        assert_eq!(row.seen_by_business_count, 2);
    }

    #[test]
    fn test_lookup_order_prefers_phone() {
        let keys = IdentityKeys {
            phone_hash: Some("phone".to_string()),
            email_hash: Some("email".to_string()),
            address_hash: Some("address".to_string()),
            ..IdentityKeys::default()
        };
        let order: Vec<IdentityKey> = keys.lookup_order().into_iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec![IdentityKey::Phone, IdentityKey::Email, IdentityKey::Address]);
        assert!(IdentityKeys::default().is_empty());
    }
}
