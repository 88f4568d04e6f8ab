//! Reputation aggregation
//!
//! Folds event severities into the shared counters of a network identity.
//! Every application appends to `network_event_ledger` inside the same
//! transaction as the counter update, so the counters can always be
//! recomputed from the ledger.

use chrono::{DateTime, Utc};
use crn_common::db::NetworkIdentity;
use crn_common::reputation::{ReputationCounters, Severity};
use crn_common::{hash_contact, Error, Result, RiskTier};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::db::identities::{self, LedgerEntry};
use crate::db::{businesses, customers, events};
use crate::models::IdentitySummary;
use crate::services::identity_resolver::IdentityResolver;
use crate::utils::{retry_on_lock, MAX_LOCK_WAIT_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyOutcome {
    Applied,
    AlreadyApplied,
}

/// Result of contributing one business event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionOutcome {
    pub event_id: String,
    /// The event had been contributed before; counters were not touched
    pub already_applied: bool,
    pub identity: IdentitySummary,
}

#[derive(Clone)]
pub struct ReputationAggregator {
    db: SqlitePool,
    resolver: IdentityResolver,
}

impl ReputationAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            resolver: IdentityResolver::new(db.clone()),
            db,
        }
    }

    /// Apply one severity to an identity, timestamped now
    pub async fn apply_event(&self, identity_id: &str, severity: Severity) -> Result<NetworkIdentity> {
        let now = Utc::now();
        let entry = LedgerEntry {
            identity_id,
            event_id: None,
            severity,
            occurred_at: now,
            applied_at: now,
        };

        retry_on_lock("apply event", MAX_LOCK_WAIT_MS, || self.apply_entry(&entry)).await?;

        debug!(identity_id, severity = severity.value(), "Applied event to identity");
        self.load(identity_id).await
    }

    /// Contribute a business event to the network
    ///
    /// The event's customer is hashed and resolved (counting the business
    /// sighting), then the event's severity is applied once. Contributing
    /// the same event again changes nothing.
    pub async fn contribute_event(&self, business_id: &str, event_id: &str) -> Result<ContributionOutcome> {
        let event = events::find_event(&self.db, event_id)
            .await?
            .filter(|e| e.business_id == business_id)
            .ok_or_else(|| Error::NotFound(format!("Event {}", event_id)))?;

        let business = businesses::find_by_id(&self.db, business_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Business {}", business_id)))?;
        if !business.network_opt_in {
            return Err(Error::InvalidInput(format!(
                "Business {} has not opted in to the network",
                business_id
            )));
        }

        let customer = customers::find_for_business(&self.db, business_id, &event.customer_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Customer {}", event.customer_id)))?;

        let severity = Severity::new(event.severity)?;
        let contact = hash_contact(customer.phone.as_deref(), customer.email.as_deref())?;
        let resolved = self.resolver.resolve(&contact, Some(business_id)).await?;

        let entry = LedgerEntry {
            identity_id: &resolved.identity_id,
            event_id: Some(event_id),
            severity,
            occurred_at: event.occurred_at,
            applied_at: Utc::now(),
        };
        let outcome =
            retry_on_lock("contribute event", MAX_LOCK_WAIT_MS, || self.apply_entry(&entry)).await?;

        let already_applied = outcome == ApplyOutcome::AlreadyApplied;
        if already_applied {
            debug!(event_id, identity_id = %resolved.identity_id, "Event already contributed");
        } else {
            info!(
                event_id,
                identity_id = %resolved.identity_id,
                severity = severity.value(),
                "Contributed event to network"
            );
        }

        let identity = self.load(&resolved.identity_id).await?;
        Ok(ContributionOutcome {
            event_id: event_id.to_string(),
            already_applied,
            identity: IdentitySummary::from(&identity),
        })
    }

    /// Recompute an identity's counters from its full ledger history
    pub async fn rebuild(&self, identity_id: &str) -> Result<NetworkIdentity> {
        retry_on_lock("rebuild reputation", MAX_LOCK_WAIT_MS, move || async move {
            let mut tx = self.db.begin().await?;
            ensure_exists(&mut tx, identity_id).await?;
            let counters = recompute(&mut tx, identity_id).await?;
            tx.commit().await?;
            Ok(counters)
        })
        .await
        .map(|counters| {
            info!(
                identity_id,
                weighted_score = counters.weighted_score,
                risk_tier = %counters.risk_tier(),
                "Rebuilt identity reputation"
            );
        })?;

        self.load(identity_id).await
    }

    /// Record one ledger entry and fold it into the counters, atomically
    ///
    /// An entry older than the newest one already in the ledger triggers a
    /// full recompute so the counters stay a fold over ascending time.
    async fn apply_entry(&self, entry: &LedgerEntry<'_>) -> Result<ApplyOutcome> {
        let mut tx = self.db.begin().await?;
        ensure_exists(&mut tx, entry.identity_id).await?;

        let latest = identities::latest_ledger_time(&mut tx, entry.identity_id).await?;

        if !identities::insert_ledger_entry(&mut tx, entry).await? {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        if latest.is_some_and(|latest| entry.occurred_at < latest) {
            warn!(
                identity_id = entry.identity_id,
                "Event older than identity history, recomputing counters"
            );
            recompute(&mut tx, entry.identity_id).await?;
            if entry.severity.is_negative() {
                identities::reset_clean_streak(&mut tx, entry.identity_id).await?;
            }
        } else {
            apply_incremental(&mut tx, entry.identity_id, entry.severity, entry.occurred_at).await?;
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn load(&self, identity_id: &str) -> Result<NetworkIdentity> {
        identities::find_by_id(&self.db, identity_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Network identity {}", identity_id)))
    }
}

async fn ensure_exists(conn: &mut SqliteConnection, identity_id: &str) -> Result<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM network_identities WHERE id = ?)")
            .bind(identity_id)
            .fetch_one(&mut *conn)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(Error::NotFound(format!("Network identity {}", identity_id)))
    }
}

async fn apply_incremental(
    conn: &mut SqliteConnection,
    identity_id: &str,
    severity: Severity,
    at: DateTime<Utc>,
) -> Result<()> {
    let score = identities::apply_increment(&mut *conn, identity_id, severity, at)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Network identity {}", identity_id)))?;

    identities::set_risk_tier(conn, identity_id, RiskTier::from_weighted_score(score)).await
}

async fn recompute(conn: &mut SqliteConnection, identity_id: &str) -> Result<ReputationCounters> {
    let history = identities::ledger_history(&mut *conn, identity_id).await?;
    let counters = ReputationCounters::fold(history);
    identities::store_counters(conn, identity_id, &counters).await?;
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::identities::{insert_if_absent, IdentityKeys};
    use crate::db::test_pool;
    use chrono::Duration;

    fn sev(v: i64) -> Severity {
        Severity::new(v).unwrap()
    }

    async fn new_identity(pool: &SqlitePool) -> String {
        insert_if_absent(pool, &IdentityKeys::from_address_hash("h".into()), Utc::now())
            .await
            .unwrap()
            .unwrap()
    }

    async fn seed_event(pool: &SqlitePool, opt_in: bool, severity: i64, days_ago: i64) -> String {
        sqlx::query("INSERT OR IGNORE INTO businesses (id, name, network_opt_in) VALUES ('biz', 'Biz', ?)")
            .bind(opt_in)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT OR IGNORE INTO customers (id, business_id, name, phone, created_at) VALUES ('cust', 'biz', 'Pat', '555-123-4567', ?)",
        )
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();

        let event_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO events (id, customer_id, business_id, severity, occurred_at) VALUES (?, 'cust', 'biz', ?, ?)",
        )
        .bind(&event_id)
        .bind(severity)
        .bind(Utc::now() - Duration::days(days_ago))
        .execute(pool)
        .await
        .unwrap();
        event_id
    }

    #[tokio::test]
    async fn test_negative_events_raise_score_and_tier() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool.clone());
        let id = new_identity(&pool).await;

        let after_moderate = aggregator.apply_event(&id, sev(3)).await.unwrap();
        assert_eq!(after_moderate.weighted_score, 12);
        assert_eq!(after_moderate.tier(), RiskTier::Low);
        assert_eq!(after_moderate.total_incidents, 1);
        assert!(after_moderate.last_incident_at.is_some());

        let after_severe = aggregator.apply_event(&id, sev(5)).await.unwrap();
        assert_eq!(after_severe.weighted_score, 42);
        assert_eq!(after_severe.tier(), RiskTier::High);
        assert!(after_severe.tier() >= after_moderate.tier());
    }

    #[tokio::test]
    async fn test_positive_event_decays_but_never_below_zero() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool.clone());
        let id = new_identity(&pool).await;

        let fresh = aggregator.apply_event(&id, sev(1)).await.unwrap();
        assert_eq!(fresh.weighted_score, 0);
        assert_eq!(fresh.total_positive_events, 1);
        assert_eq!(fresh.tier(), RiskTier::Unknown);

        aggregator.apply_event(&id, sev(4)).await.unwrap();
        let decayed = aggregator.apply_event(&id, sev(2)).await.unwrap();
        assert_eq!(decayed.weighted_score, 23);
        assert_eq!(decayed.tier(), RiskTier::Medium);
        assert_eq!(decayed.total_incidents, 1);
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool);

        let err = aggregator.apply_event("missing", sev(4)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = aggregator.rebuild("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rebuild_matches_incremental_counters() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool.clone());
        let id = new_identity(&pool).await;

        for v in [4, 1, 3, 2, 5] {
            aggregator.apply_event(&id, sev(v)).await.unwrap();
        }
        let incremental = identities::find_by_id(&pool, &id).await.unwrap().unwrap();

        // Corrupt the denormalized columns, then rebuild from the ledger
        sqlx::query("UPDATE network_identities SET weighted_score = 0, risk_tier = 'unknown' WHERE id = ?")
            .bind(&id)
            .execute(&pool)
            .await
            .unwrap();
        let rebuilt = aggregator.rebuild(&id).await.unwrap();

        assert_eq!(rebuilt.weighted_score, incremental.weighted_score);
        assert_eq!(rebuilt.risk_tier, incremental.risk_tier);
        assert_eq!(rebuilt.total_incidents, 3);
        assert_eq!(rebuilt.total_positive_events, 2);
    }

    #[tokio::test]
    async fn test_contribution_is_idempotent() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool.clone());
        let event_id = seed_event(&pool, true, 4, 2).await;

        let first = aggregator.contribute_event("biz", &event_id).await.unwrap();
        assert!(!first.already_applied);
        assert_eq!(first.identity.total_incidents, 1);
        assert_eq!(first.identity.seen_by_business_count, 1);
        assert_eq!(first.identity.risk_tier, RiskTier::Medium);

        let second = aggregator.contribute_event("biz", &event_id).await.unwrap();
        assert!(second.already_applied);
        assert_eq!(second.identity, first.identity);
    }

    #[tokio::test]
    async fn test_out_of_order_contribution_recomputes() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool.clone());
        let recent = seed_event(&pool, true, 5, 1).await;
        let older = seed_event(&pool, true, 1, 10).await;

        aggregator.contribute_event("biz", &recent).await.unwrap();
        let outcome = aggregator.contribute_event("biz", &older).await.unwrap();

        // Time order is positive (score stays 0) then severe: 30
        let row = identities::find_by_id(&pool, &outcome.identity.identity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.weighted_score, 30);
        assert_eq!(row.total_positive_events, 1);
        assert_eq!(row.tier(), RiskTier::High);
    }

    #[tokio::test]
    async fn test_contribution_requires_opt_in_and_ownership() {
        let pool = test_pool().await;
        let aggregator = ReputationAggregator::new(pool.clone());
        let event_id = seed_event(&pool, false, 4, 1).await;

        let err = aggregator.contribute_event("biz", &event_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = aggregator.contribute_event("other-biz", &event_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
