//! Network search by free text
//!
//! The query is routed by shape: anything with '@' is an email, digits with
//! phone punctuation are a phone number, and address-like text is looked up
//! by address hash. Only the anonymized summary is returned.

use crn_common::address::{is_address_like, parse_address};
use crn_common::identity_hash::{hash_email, hash_phone};
use crn_common::tuning::PHONE_MIN_DIGITS;
use crn_common::{Error, Result};
use sqlx::SqlitePool;

use crate::db::identities::{self, IdentityKey};
use crate::models::IdentitySummary;

/// Which key a search query was routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    Phone(String),
    Email(String),
    Address(String),
}

/// Route a query to a hashed key. `None` when the query cannot be keyed.
pub fn search_key(query: &str) -> Option<SearchKey> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if query.contains('@') {
        return hash_email(query).map(SearchKey::Email);
    }

    let digits = query.chars().filter(|c| c.is_ascii_digit()).count();
    let looks_like_phone = digits >= PHONE_MIN_DIGITS
        && query
            .chars()
            .all(|c| c.is_ascii_digit() || " ()-.+".contains(c));
    if looks_like_phone {
        return hash_phone(query).map(SearchKey::Phone);
    }

    if is_address_like(query) {
        return parse_address(query).address_hash().map(SearchKey::Address);
    }

    None
}

pub async fn search(pool: &SqlitePool, query: &str) -> Result<IdentitySummary> {
    let key = search_key(query).ok_or_else(|| {
        Error::InvalidInput(
            "Query must be a phone number, an email address or a street address with city".to_string(),
        )
    })?;

    let (column, hash) = match &key {
        SearchKey::Phone(hash) => (IdentityKey::Phone, hash),
        SearchKey::Email(hash) => (IdentityKey::Email, hash),
        SearchKey::Address(hash) => (IdentityKey::Address, hash),
    };

    identities::find_by_key(pool, column, hash)
        .await?
        .map(IdentitySummary::from)
        .ok_or_else(|| Error::NotFound("No network identity matches the query".to_string()))
}
