//! Heuristic constants for scoring, reputation and address matching
//!
//! Values are fixed for compatibility with existing stored scores and links.
//! Every consumer reads them from here so tests can pin them.

// ---- Severity classification ----

/// Lowest valid event severity
pub const SEVERITY_MIN: u8 = 1;
/// Highest valid event severity
pub const SEVERITY_MAX: u8 = 5;
/// Severity at or above which an event counts as an incident
pub const NEGATIVE_SEVERITY: u8 = 3;
/// Severity at or above which an incident counts as severe
pub const SEVERE_SEVERITY: u8 = 4;

// ---- Penalty / weight multipliers ----

/// Multiplier for severe incidents (severity 4-5)
pub const SEVERE_MULTIPLIER: i64 = 6;
/// Multiplier for moderate incidents (severity 3)
pub const MODERATE_MULTIPLIER: i64 = 4;
/// Multiplier for positive/neutral events in the per-business score
pub const MINOR_MULTIPLIER: i64 = 1;
/// Weighted score removed from a network identity by one positive event
pub const POSITIVE_DECAY: i64 = 1;

// ---- Per-business score ----

pub const SCORE_MAX: i64 = 100;
pub const SCORE_MIN: i64 = 0;

pub const LABEL_EXCELLENT_MIN: i64 = 90;
pub const LABEL_GOOD_MIN: i64 = 75;
pub const LABEL_FAIR_MIN: i64 = 60;
pub const LABEL_POOR_MIN: i64 = 40;

pub const RISK_LEVEL_LOW_MIN: i64 = 75;
pub const RISK_LEVEL_MEDIUM_MIN: i64 = 50;

// ---- Trend ----

/// Recent window covers events 0..=30 days old
pub const TREND_RECENT_DAYS: i64 = 30;
/// Older window covers events 31..=60 days old
pub const TREND_OLDER_DAYS: i64 = 60;
/// Mean severity difference beyond which the trend moves
pub const TREND_DELTA: f64 = 0.5;

// ---- Recency buckets (days) ----

pub const RECENCY_WEEK_DAYS: i64 = 7;
pub const RECENCY_MONTH_DAYS: i64 = 30;
pub const RECENCY_QUARTER_DAYS: i64 = 90;
pub const RECENCY_HALF_YEAR_DAYS: i64 = 180;
pub const RECENCY_YEAR_DAYS: i64 = 365;

// ---- Network risk tiers (weighted score cutoffs) ----

pub const RISK_CRITICAL_MIN: i64 = 50;
pub const RISK_HIGH_MIN: i64 = 30;
pub const RISK_MEDIUM_MIN: i64 = 15;

// ---- Address similarity ----

pub const SIMILARITY_EXACT_BASE: f64 = 0.8;
pub const SIMILARITY_CITY_BONUS: f64 = 0.1;
pub const SIMILARITY_ZIP_BONUS: f64 = 0.1;
pub const SIMILARITY_WORD_JACCARD_MIN: f64 = 0.5;
pub const SIMILARITY_NUMBER_MATCH_BASE: f64 = 0.5;
pub const SIMILARITY_NUMBER_MATCH_SCALE: f64 = 0.3;
pub const SIMILARITY_CHAR_FALLBACK_SCALE: f64 = 0.5;
/// Bulk linking treats two addresses as one location above this score (strict)
pub const ADDRESS_LINK_THRESHOLD: f64 = 0.3;

// ---- Identity links ----

/// Confidence of a link joining an existing identity by address
pub const LINK_CONFIDENCE_ADDRESS: f64 = 0.95;
/// Confidence of a link to an identity created from the property record itself
pub const LINK_CONFIDENCE_AUTO_GENERATED: f64 = 1.0;

// ---- Contact normalization ----

pub const PHONE_MIN_DIGITS: usize = 10;

// ---- Batch jobs ----

/// Maximum number of per-row error messages kept in a batch report
pub const MAX_REPORTED_ERRORS: usize = 10;
