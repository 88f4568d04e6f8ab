//! Batch job reports
//!
//! Counts are exact. Error messages are capped so a failing batch cannot
//! produce an unbounded response.

use crn_common::tuning::MAX_REPORTED_ERRORS;
use serde::{Deserialize, Serialize};

/// Capped list of per-row error messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLog(Vec<String>);

impl ErrorLog {
    /// Keep the message if the cap has not been reached
    pub fn push(&mut self, message: impl Into<String>) {
        if self.0.len() < MAX_REPORTED_ERRORS {
            self.0.push(message.into());
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Full resync of business customers into the network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
    pub total: usize,
    pub synced: usize,
    /// No usable phone or email
    pub skipped: usize,
    pub failed: usize,
    pub created_identities: usize,
    pub address_links: usize,
    /// The record limit stopped the run before the customer list ran out
    pub truncated: bool,
    pub errors: ErrorLog,
}

/// Identity bootstrap from the property table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub total: usize,
    /// Identity links written
    pub created: usize,
    /// Links that joined an identity already carrying the address hash
    pub joined_existing: usize,
    pub new_identities: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: ErrorLog,
}

/// Bulk customer import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Duplicates of customers already stored
    pub skipped: usize,
    pub failed: usize,
    pub errors: ErrorLog,
}
