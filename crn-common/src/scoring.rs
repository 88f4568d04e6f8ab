//! Per-business customer scoring
//!
//! A business's private view of one customer, recomputed on every read from
//! that business's own event list. Nothing here touches network identities.

use crate::reputation::Severity;
use crate::tuning::{
    LABEL_EXCELLENT_MIN, LABEL_FAIR_MIN, LABEL_GOOD_MIN, LABEL_POOR_MIN, MINOR_MULTIPLIER,
    MODERATE_MULTIPLIER, NEGATIVE_SEVERITY, RECENCY_HALF_YEAR_DAYS, RECENCY_MONTH_DAYS,
    RECENCY_QUARTER_DAYS, RECENCY_WEEK_DAYS, RECENCY_YEAR_DAYS, RISK_LEVEL_LOW_MIN,
    RISK_LEVEL_MEDIUM_MIN, SCORE_MAX, SCORE_MIN, SEVERE_MULTIPLIER, SEVERE_SEVERITY,
    TREND_DELTA, TREND_OLDER_DAYS, TREND_RECENT_DAYS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event as seen by the scoring engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEvent {
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "High Risk")]
    HighRisk,
}

impl ScoreLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreLabel::Excellent => "Excellent",
            ScoreLabel::Good => "Good",
            ScoreLabel::Fair => "Fair",
            ScoreLabel::Poor => "Poor",
            ScoreLabel::HighRisk => "High Risk",
        }
    }
}

/// Three-band view of the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    New,
    Improving,
    Stable,
    Declining,
}

/// How long ago something happened, in coarse buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyBucket {
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
    Older,
}

impl RecencyBucket {
    pub fn from_days(days: i64) -> Self {
        if days <= RECENCY_WEEK_DAYS {
            RecencyBucket::Week
        } else if days <= RECENCY_MONTH_DAYS {
            RecencyBucket::Month
        } else if days <= RECENCY_QUARTER_DAYS {
            RecencyBucket::Quarter
        } else if days <= RECENCY_HALF_YEAR_DAYS {
            RecencyBucket::HalfYear
        } else if days <= RECENCY_YEAR_DAYS {
            RecencyBucket::Year
        } else {
            RecencyBucket::Older
        }
    }

    pub fn between(then: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_days(days_between(then, now))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecencyBucket::Week => "This week",
            RecencyBucket::Month => "This month",
            RecencyBucket::Quarter => "Last 3 months",
            RecencyBucket::HalfYear => "Last 6 months",
            RecencyBucket::Year => "This year",
            RecencyBucket::Older => "Over a year ago",
        }
    }
}

/// Full derived view for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerScore {
    pub score: i64,
    pub label: ScoreLabel,
    pub risk_level: RiskLevel,
    pub trend: Trend,
    pub total_events: usize,
    pub negative_events: usize,
    /// Recency of the most recent event with severity >= 3
    pub last_negative: Option<RecencyBucket>,
    /// Recency of the customer's creation date
    pub first_seen: Option<RecencyBucket>,
}

/// Whole days from `then` to `now`; events in the future count as today
fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_days().max(0)
}

/// Score deduction for one event
pub fn penalty(severity: Severity) -> i64 {
    let sev = severity.value();
    let multiplier = if sev >= SEVERE_SEVERITY {
        SEVERE_MULTIPLIER
    } else if sev >= NEGATIVE_SEVERITY {
        MODERATE_MULTIPLIER
    } else {
        MINOR_MULTIPLIER
    };
    sev as i64 * multiplier
}

/// 100 minus all penalties, clamped to 0..=100
pub fn score<'a, I>(severities: I) -> i64
where
    I: IntoIterator<Item = &'a Severity>,
{
    let total: i64 = severities.into_iter().map(|s| penalty(*s)).sum();
    (SCORE_MAX - total).clamp(SCORE_MIN, SCORE_MAX)
}

pub fn label(score: i64) -> ScoreLabel {
    if score >= LABEL_EXCELLENT_MIN {
        ScoreLabel::Excellent
    } else if score >= LABEL_GOOD_MIN {
        ScoreLabel::Good
    } else if score >= LABEL_FAIR_MIN {
        ScoreLabel::Fair
    } else if score >= LABEL_POOR_MIN {
        ScoreLabel::Poor
    } else {
        ScoreLabel::HighRisk
    }
}

pub fn risk_level(score: i64) -> RiskLevel {
    if score >= RISK_LEVEL_LOW_MIN {
        RiskLevel::Low
    } else if score >= RISK_LEVEL_MEDIUM_MIN {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

fn mean_severity(events: &[&ScoredEvent]) -> Option<f64> {
    if events.is_empty() {
        return None;
    }
    let sum: f64 = events.iter().map(|e| e.severity.value() as f64).sum();
    Some(sum / events.len() as f64)
}

/// Compare mean severity of the last 30 days with the 30 days before that
pub fn trend(events: &[ScoredEvent], now: DateTime<Utc>) -> Trend {
    let (recent, older): (Vec<&ScoredEvent>, Vec<&ScoredEvent>) = events
        .iter()
        .filter(|e| days_between(e.occurred_at, now) <= TREND_OLDER_DAYS)
        .partition(|e| days_between(e.occurred_at, now) <= TREND_RECENT_DAYS);

    match (mean_severity(&recent), mean_severity(&older)) {
        (Some(recent), Some(older)) => {
            let diff = recent - older;
            if diff > TREND_DELTA {
                Trend::Declining
            } else if diff < -TREND_DELTA {
                Trend::Improving
            } else {
                Trend::Stable
            }
        }
        (None, Some(_)) => Trend::Improving,
        (Some(recent), None) => {
            if recent >= NEGATIVE_SEVERITY as f64 {
                Trend::Declining
            } else {
                Trend::Stable
            }
        }
        (None, None) if events.len() < 2 => Trend::New,
        (None, None) => Trend::Stable,
    }
}

/// Score one customer from its business-private events
pub fn score_customer(
    events: &[ScoredEvent],
    customer_created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CustomerScore {
    let value = score(events.iter().map(|e| &e.severity));

    let negative: Vec<&ScoredEvent> = events.iter().filter(|e| e.severity.is_negative()).collect();
    let last_negative = negative
        .iter()
        .map(|e| e.occurred_at)
        .max()
        .map(|at| RecencyBucket::between(at, now));

    CustomerScore {
        score: value,
        label: label(value),
        risk_level: risk_level(value),
        trend: trend(events, now),
        total_events: events.len(),
        negative_events: negative.len(),
        last_negative,
        first_seen: customer_created_at.map(|at| RecencyBucket::between(at, now)),
    }
}
