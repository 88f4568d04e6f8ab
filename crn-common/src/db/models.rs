//! Database models

use crate::reputation::{ReputationCounters, RiskTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub network_opt_in: bool,
    pub network_synced: bool,
    pub customer_count_limit: Option<i64>,
}

/// Business-owned customer. Never leaves its business.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Severity-tagged note recorded by a business against its customer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: String,
    pub customer_id: String,
    pub business_id: String,
    pub severity: i64,
    pub event_type: String,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

/// Row of the scraped, read-only property table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PropertyRecord {
    pub id: String,
    pub owner_name: Option<String>,
    pub address_full: String,
    pub property_class: Option<String>,
    pub municipality: Option<String>,
    pub county: Option<String>,
}

/// Pseudonymous cross-business aggregate
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NetworkIdentity {
    pub id: String,
    pub phone_hash: Option<String>,
    pub phone_last_four: Option<String>,
    pub email_hash: Option<String>,
    pub email_domain: Option<String>,
    pub address_hash: Option<String>,
    pub weighted_score: i64,
    pub risk_tier: String,
    pub total_incidents: i64,
    pub total_positive_events: i64,
    pub clean_streak_months: i64,
    pub seen_by_business_count: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_incident_at: Option<DateTime<Utc>>,
}

impl NetworkIdentity {
    /// Parsed risk tier; an unrecognized stored value is recomputed from the score
    pub fn tier(&self) -> RiskTier {
        self.risk_tier
            .parse()
            .unwrap_or_else(|_| RiskTier::from_weighted_score(self.weighted_score))
    }

    pub fn counters(&self) -> ReputationCounters {
        ReputationCounters {
            weighted_score: self.weighted_score,
            total_incidents: self.total_incidents,
            total_positive_events: self.total_positive_events,
            clean_streak_months: self.clean_streak_months,
            last_incident_at: self.last_incident_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Address,
    AutoGenerated,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Address => "address",
            MatchType::AutoGenerated => "auto_generated",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityLink {
    pub id: String,
    pub property_record_id: String,
    pub network_identity_id: String,
    pub match_type: String,
    pub match_confidence: f64,
    pub created_at: DateTime<Utc>,
}
