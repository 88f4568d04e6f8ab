//! One-way contact hashing
//!
//! Phone numbers and email addresses are normalized and reduced to SHA-256
//! hex digests. The digests are join keys across businesses, so the
//! normalization and digest must never change.
//!
//! Only non-reversible metadata travels with a hash: the last four phone
//! digits and the email domain.

use crate::tuning::PHONE_MIN_DIGITS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hashed contact keys for one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedContact {
    pub phone_hash: Option<String>,
    pub phone_last_four: Option<String>,
    pub email_hash: Option<String>,
    pub email_domain: Option<String>,
}

impl HashedContact {
    /// Short prefix of the strongest key, safe for log lines
    pub fn log_key(&self) -> &str {
        let key = self
            .phone_hash
            .as_deref()
            .or(self.email_hash.as_deref())
            .unwrap_or("");
        &key[..key.len().min(12)]
    }
}

/// Strip everything but digits. Fewer than 10 digits is treated as absent.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < PHONE_MIN_DIGITS {
        None
    } else {
        Some(digits)
    }
}

/// Lowercase and trim. Anything without an '@' is treated as absent.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.contains('@') {
        Some(email)
    } else {
        None
    }
}

/// SHA-256 hex digest of an already-normalized value
pub fn digest(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn hash_phone(raw: &str) -> Option<String> {
    normalize_phone(raw).map(|p| digest(&p))
}

pub fn hash_email(raw: &str) -> Option<String> {
    normalize_email(raw).map(|e| digest(&e))
}

/// Hash a raw phone/email pair
///
/// Returns [`Error::NoIdentifiableContact`] when neither value survives
/// normalization.
pub fn hash_contact(phone: Option<&str>, email: Option<&str>) -> Result<HashedContact> {
    let phone = phone.and_then(normalize_phone);
    let email = email.and_then(normalize_email);

    if phone.is_none() && email.is_none() {
        return Err(Error::NoIdentifiableContact);
    }

    let phone_last_four = phone.as_ref().map(|p| p[p.len() - 4..].to_string());
    let email_domain = email
        .as_ref()
        .and_then(|e| e.rsplit_once('@'))
        .map(|(_, domain)| domain.to_string());

    Ok(HashedContact {
        phone_hash: phone.as_deref().map(digest),
        phone_last_four,
        email_hash: email.as_deref().map(digest),
        email_domain,
    })
}
