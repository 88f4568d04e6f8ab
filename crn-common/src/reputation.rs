//! Network reputation rules
//!
//! Pure side of the cross-business reputation aggregate. The stored
//! `weighted_score` and `risk_tier` of a network identity are denormalized
//! views of its event history and must always equal what
//! [`ReputationCounters::fold`] produces from that history.

use crate::tuning::{
    MODERATE_MULTIPLIER, NEGATIVE_SEVERITY, POSITIVE_DECAY, RISK_CRITICAL_MIN, RISK_HIGH_MIN,
    RISK_MEDIUM_MIN, SEVERE_MULTIPLIER, SEVERE_SEVERITY, SEVERITY_MAX, SEVERITY_MIN,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse network risk category, derived solely from weighted score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_weighted_score(score: i64) -> Self {
        if score >= RISK_CRITICAL_MIN {
            RiskTier::Critical
        } else if score >= RISK_HIGH_MIN {
            RiskTier::High
        } else if score >= RISK_MEDIUM_MIN {
            RiskTier::Medium
        } else if score > 0 {
            RiskTier::Low
        } else {
            RiskTier::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Unknown => "unknown",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unknown" => Ok(RiskTier::Unknown),
            "low" => Ok(RiskTier::Low),
            "medium" => Ok(RiskTier::Medium),
            "high" => Ok(RiskTier::High),
            "critical" => Ok(RiskTier::Critical),
            other => Err(Error::InvalidInput(format!("Unknown risk tier: {}", other))),
        }
    }
}

/// Validated event severity (1-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Severity(u8);

impl Severity {
    pub fn new(value: i64) -> Result<Self> {
        if (SEVERITY_MIN as i64..=SEVERITY_MAX as i64).contains(&value) {
            Ok(Severity(value as u8))
        } else {
            Err(Error::InvalidInput(format!(
                "Severity must be between {} and {}, got {}",
                SEVERITY_MIN, SEVERITY_MAX, value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Severity 3 and above is an incident
    pub fn is_negative(self) -> bool {
        self.0 >= NEGATIVE_SEVERITY
    }

    /// Weight added to an identity's weighted score; zero for positive events
    pub fn incident_weight(self) -> i64 {
        let sev = self.0 as i64;
        if self.0 >= SEVERE_SEVERITY {
            sev * SEVERE_MULTIPLIER
        } else if self.0 >= NEGATIVE_SEVERITY {
            sev * MODERATE_MULTIPLIER
        } else {
            0
        }
    }
}

impl TryFrom<i64> for Severity {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Severity::new(value)
    }
}

impl From<Severity> for i64 {
    fn from(sev: Severity) -> i64 {
        sev.0 as i64
    }
}

/// Canonical reputation counters of one network identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationCounters {
    pub weighted_score: i64,
    pub total_incidents: i64,
    pub total_positive_events: i64,
    pub clean_streak_months: i64,
    pub last_incident_at: Option<DateTime<Utc>>,
}

impl ReputationCounters {
    /// Apply one event observed at `at`
    pub fn apply(&mut self, severity: Severity, at: DateTime<Utc>) {
        if severity.is_negative() {
            self.weighted_score += severity.incident_weight();
            self.total_incidents += 1;
            self.last_incident_at = Some(at);
            self.clean_streak_months = 0;
        } else {
            self.weighted_score = (self.weighted_score - POSITIVE_DECAY).max(0);
            self.total_positive_events += 1;
        }
    }

    /// Replay a history; callers pass events in ascending timestamp order
    pub fn fold<I>(events: I) -> Self
    where
        I: IntoIterator<Item = (Severity, DateTime<Utc>)>,
    {
        let mut counters = Self::default();
        for (severity, at) in events {
            counters.apply(severity, at);
        }
        counters
    }

    pub fn risk_tier(&self) -> RiskTier {
        RiskTier::from_weighted_score(self.weighted_score)
    }
}
