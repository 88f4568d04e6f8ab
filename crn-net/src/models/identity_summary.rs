//! Anonymized view of a network identity
//!
//! This is the only identity shape that leaves the service. It carries no
//! hashes and none of the stored contact metadata.

use chrono::{DateTime, Utc};
use crn_common::db::NetworkIdentity;
use crn_common::RiskTier;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub identity_id: String,
    pub risk_tier: RiskTier,
    pub total_incidents: i64,
    pub last_incident_at: Option<DateTime<Utc>>,
    pub seen_by_business_count: i64,
}

impl From<&NetworkIdentity> for IdentitySummary {
    fn from(identity: &NetworkIdentity) -> Self {
        Self {
            identity_id: identity.id.clone(),
            risk_tier: identity.tier(),
            total_incidents: identity.total_incidents,
            last_incident_at: identity.last_incident_at,
            seen_by_business_count: identity.seen_by_business_count,
        }
    }
}

impl From<NetworkIdentity> for IdentitySummary {
    fn from(identity: NetworkIdentity) -> Self {
        Self::from(&identity)
    }
}
