//! Identity resolution
//!
//! Find-or-create of network identities from hashed keys. Creation is a
//! single `INSERT … ON CONFLICT DO NOTHING`; when that insert loses to a
//! concurrent writer the winning row is re-read and used.

use chrono::{DateTime, Utc};
use crn_common::db::NetworkIdentity;
use crn_common::{hash_contact, Error, HashedContact, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::identities::{self, IdentityKeys};
use crate::utils::{retry_on_lock, MAX_LOCK_WAIT_MS};

/// Create attempts before giving up. Only reachable if a conflicting row
/// disappears between the insert and the re-read.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub identity_id: String,
    /// The identity did not exist before this call
    pub created: bool,
}

#[derive(Clone)]
pub struct IdentityResolver {
    db: SqlitePool,
}

impl IdentityResolver {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Hash raw contact values and resolve them
    pub async fn resolve_contact(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
        business_id: Option<&str>,
    ) -> Result<Resolved> {
        let contact = hash_contact(phone, email)?;
        self.resolve(&contact, business_id).await
    }

    /// Resolve hashed phone/email to an identity id
    ///
    /// Phone is looked up first, then email. Keys the identity lacks are
    /// merged in. When `business_id` is given the sighting is counted once
    /// per business.
    pub async fn resolve(&self, contact: &HashedContact, business_id: Option<&str>) -> Result<Resolved> {
        let keys = IdentityKeys::from(contact.clone());
        self.resolve_keys(&keys, business_id).await
    }

    /// Resolve an identity known only by its address hash
    pub async fn resolve_address(&self, address_hash: &str) -> Result<Resolved> {
        let keys = IdentityKeys::from_address_hash(address_hash.to_string());
        self.resolve_keys(&keys, None).await
    }

    pub async fn resolve_keys(&self, keys: &IdentityKeys, business_id: Option<&str>) -> Result<Resolved> {
        if keys.is_empty() {
            return Err(Error::NoIdentifiableContact);
        }

        retry_on_lock("identity resolve", MAX_LOCK_WAIT_MS, || {
            self.resolve_once(keys, business_id)
        })
        .await
    }

    async fn resolve_once(&self, keys: &IdentityKeys, business_id: Option<&str>) -> Result<Resolved> {
        let now = Utc::now();

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            if let Some(existing) = identities::find_by_keys(&self.db, keys).await? {
                return self.join_existing(existing, keys, business_id, now).await;
            }

            if let Some(identity_id) = identities::insert_if_absent(&self.db, keys, now).await? {
                info!(
                    identity_id = %identity_id,
                    key = keys.log_key(),
                    "Created network identity"
                );
                if let Some(business_id) = business_id {
                    identities::record_business_sighting(&self.db, &identity_id, business_id, now)
                        .await?;
                }
                return Ok(Resolved {
                    identity_id,
                    created: true,
                });
            }

            debug!(attempt, key = keys.log_key(), "Identity create lost a race, re-reading");
        }

        Err(Error::Internal(format!(
            "Identity for key {} neither created nor found after {} attempts",
            keys.log_key(),
            MAX_RESOLVE_ATTEMPTS
        )))
    }

    async fn join_existing(
        &self,
        existing: NetworkIdentity,
        keys: &IdentityKeys,
        business_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Resolved> {
        let merged = identities::merge_keys(&self.db, &existing.id, keys).await?;
        if merged > 0 {
            debug!(identity_id = %existing.id, merged, "Merged new keys into identity");
        }

        identities::touch(&self.db, &existing.id, now).await?;

        if let Some(business_id) = business_id {
            identities::record_business_sighting(&self.db, &existing.id, business_id, now).await?;
        }

        Ok(Resolved {
            identity_id: existing.id,
            created: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crn_common::identity_hash::hash_email;

    #[tokio::test]
    async fn test_resolve_twice_returns_same_identity() {
        let pool = test_pool().await;
        let resolver = IdentityResolver::new(pool.clone());

        let first = resolver
            .resolve_contact(Some("(555) 123-4567"), None, Some("biz"))
            .await
            .unwrap();
        let second = resolver
            .resolve_contact(Some("555.123.4567"), None, Some("biz"))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.identity_id, second.identity_id);

        let row = identities::find_by_id(&pool, &first.identity_id).await.unwrap().unwrap();
        assert_eq!(row.seen_by_business_count, 1);
        assert_eq!(row.phone_last_four.as_deref(), Some("4567"));
    }

    #[tokio::test]
    async fn test_merged_email_resolves_to_same_identity() {
        let pool = test_pool().await;
        let resolver = IdentityResolver::new(pool.clone());

        let by_phone = resolver
            .resolve_contact(Some("5551234567"), None, None)
            .await
            .unwrap();
        let with_email = resolver
            .resolve_contact(Some("5551234567"), Some("Pat@Example.com "), None)
            .await
            .unwrap();
        let by_email = resolver
            .resolve_contact(None, Some("pat@example.com"), None)
            .await
            .unwrap();

        assert_eq!(by_phone.identity_id, with_email.identity_id);
        assert_eq!(by_phone.identity_id, by_email.identity_id);

        let row = identities::find_by_id(&pool, &by_phone.identity_id).await.unwrap().unwrap();
        assert_eq!(row.email_hash, hash_email("pat@example.com"));
        assert_eq!(row.email_domain.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_no_contact_is_rejected_without_creating() {
        let pool = test_pool().await;
        let resolver = IdentityResolver::new(pool.clone());

        let err = resolver
            .resolve_contact(Some("555-12"), Some("not-an-email"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoIdentifiableContact));

        let err = resolver
            .resolve_keys(&IdentityKeys::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoIdentifiableContact));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM network_identities")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_resolution_without_business_does_not_count_sighting() {
        let pool = test_pool().await;
        let resolver = IdentityResolver::new(pool.clone());

        let resolved = resolver.resolve_address("addr-hash").await.unwrap();
        assert!(resolved.created);
        let again = resolver.resolve_address("addr-hash").await.unwrap();
        assert_eq!(resolved.identity_id, again.identity_id);

        let row = identities::find_by_id(&pool, &resolved.identity_id).await.unwrap().unwrap();
        assert_eq!(row.seen_by_business_count, 0);
        assert_eq!(row.address_hash.as_deref(), Some("addr-hash"));
    }
}
