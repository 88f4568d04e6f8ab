//! Full resync of business customers into the network
//!
//! Walks customers of opted-in businesses in id order, one store round-trip
//! per customer. Each customer is hashed and resolved; a usable address is
//! merged into the identity as its address hash and linked to the best
//! matching unlinked property record in the customer's municipality.
//!
//! A row failure is recorded and the walk continues. A business is marked
//! `network_synced` only when every one of its customers went through
//! without failure and the record limit did not cut the run short.

use chrono::Utc;
use crn_common::address::{parse_address, similarity_parsed, NormalizedAddress};
use crn_common::db::{Customer, MatchType, PropertyRecord};
use crn_common::tuning::{ADDRESS_LINK_THRESHOLD, LINK_CONFIDENCE_ADDRESS};
use crn_common::{hash_contact, Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::db::identities::{self, IdentityKeys};
use crate::db::{businesses, customers, links, properties};
use crate::models::ResyncReport;
use crate::services::identity_resolver::IdentityResolver;

/// Candidate property records compared per customer address
const MAX_LINK_CANDIDATES: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomerSync {
    Skipped,
    Synced { created: bool, linked: bool },
}

#[derive(Clone)]
pub struct NetworkSync {
    db: SqlitePool,
    resolver: IdentityResolver,
    page_size: usize,
}

impl NetworkSync {
    pub fn new(db: SqlitePool, page_size: usize) -> Self {
        Self {
            resolver: IdentityResolver::new(db.clone()),
            db,
            page_size: page_size.max(1),
        }
    }

    /// Resync one business, or every opted-in business when `business_id`
    /// is `None`, processing at most `limit` customers
    pub async fn run(&self, business_id: Option<&str>, limit: usize) -> Result<ResyncReport> {
        let scope = self.scope(business_id).await?;
        info!(
            business_id = business_id.unwrap_or("*"),
            businesses = scope.len(),
            limit,
            "Starting network resync"
        );

        let mut report = ResyncReport::default();
        let mut failures: HashMap<String, usize> = HashMap::new();
        let mut after_id: Option<String> = None;

        loop {
            let remaining = limit - report.total;
            if remaining == 0 {
                report.truncated = true;
                break;
            }

            let requested = self.page_size.min(remaining);
            let page = customers::fetch_opted_in_page(
                &self.db,
                business_id,
                after_id.as_deref(),
                requested as i64,
            )
            .await?;
            let exhausted = page.len() < requested;
            after_id = page.last().map(|c| c.id.clone());

            for customer in &page {
                report.total += 1;
                match self.sync_customer(customer).await {
                    Ok(CustomerSync::Skipped) => report.skipped += 1,
                    Ok(CustomerSync::Synced { created, linked }) => {
                        report.synced += 1;
                        if created {
                            report.created_identities += 1;
                        }
                        if linked {
                            report.address_links += 1;
                        }
                    }
                    Err(e) => {
                        warn!(customer_id = %customer.id, error = %e, "Customer resync failed");
                        report.failed += 1;
                        *failures.entry(customer.business_id.clone()).or_default() += 1;
                        report.errors.push(format!("customer {}: {}", customer.id, e));
                    }
                }
            }

            if exhausted {
                break;
            }
        }

        if !report.truncated {
            for business in scope.iter().filter(|b| !failures.contains_key(*b)) {
                businesses::mark_synced(&self.db, business).await?;
            }
        }

        info!(
            total = report.total,
            synced = report.synced,
            skipped = report.skipped,
            failed = report.failed,
            created_identities = report.created_identities,
            address_links = report.address_links,
            truncated = report.truncated,
            "Network resync finished"
        );
        Ok(report)
    }

    async fn scope(&self, business_id: Option<&str>) -> Result<Vec<String>> {
        let Some(business_id) = business_id else {
            return businesses::opted_in_ids(&self.db).await;
        };

        let business = businesses::find_by_id(&self.db, business_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Business {}", business_id)))?;
        if !business.network_opt_in {
            return Err(Error::InvalidInput(format!(
                "Business {} has not opted in to the network",
                business_id
            )));
        }
        Ok(vec![business.id])
    }

    async fn sync_customer(&self, customer: &Customer) -> Result<CustomerSync> {
        let contact = match hash_contact(customer.phone.as_deref(), customer.email.as_deref()) {
            Ok(contact) => contact,
            Err(Error::NoIdentifiableContact) => {
                debug!(customer_id = %customer.id, "No usable phone or email, skipping");
                return Ok(CustomerSync::Skipped);
            }
            Err(e) => return Err(e),
        };

        let resolved = self.resolver.resolve(&contact, Some(&customer.business_id)).await?;

        let Some(address) = customer.address.as_deref().filter(|a| !a.trim().is_empty()) else {
            return Ok(CustomerSync::Synced {
                created: resolved.created,
                linked: false,
            });
        };

        let parsed = parse_address(address)
            .with_city_fallback(customer.city.as_deref())
            .with_state_fallback(customer.state.as_deref());

        if let Some(address_hash) = parsed.address_hash() {
            identities::merge_keys(
                &self.db,
                &resolved.identity_id,
                &IdentityKeys::from_address_hash(address_hash),
            )
            .await?;
        }

        let municipality = customer
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or(parsed.city.as_deref());
        let linked = match municipality {
            Some(municipality) => {
                self.link_property(&resolved.identity_id, &parsed, municipality)
                    .await?
            }
            None => false,
        };

        Ok(CustomerSync::Synced {
            created: resolved.created,
            linked,
        })
    }

    /// Link the identity to the closest unlinked property record, if any is
    /// close enough
    async fn link_property(
        &self,
        identity_id: &str,
        address: &NormalizedAddress,
        municipality: &str,
    ) -> Result<bool> {
        let candidates =
            properties::unlinked_in_municipality(&self.db, municipality, MAX_LINK_CANDIDATES).await?;

        let Some((record, confidence)) = best_match(address, &candidates) else {
            return Ok(false);
        };

        let linked = links::insert_link(
            &self.db,
            &record.id,
            identity_id,
            MatchType::Address,
            confidence,
            Utc::now(),
        )
        .await?;
        if linked {
            debug!(identity_id, property_record_id = %record.id, confidence, "Linked property record");
        }
        Ok(linked)
    }
}

/// Exact canonical match first; otherwise the most similar record strictly
/// above the link threshold
fn best_match<'a>(
    address: &NormalizedAddress,
    candidates: &'a [PropertyRecord],
) -> Option<(&'a PropertyRecord, f64)> {
    let canonical = address.canonical();
    let mut best: Option<(&PropertyRecord, f64)> = None;

    for candidate in candidates {
        let other =
            parse_address(&candidate.address_full).with_city_fallback(candidate.municipality.as_deref());
        if other.canonical() == canonical {
            return Some((candidate, LINK_CONFIDENCE_ADDRESS));
        }

        let score = similarity_parsed(address, &other);
        if score > ADDRESS_LINK_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, address: &str) -> PropertyRecord {
        PropertyRecord {
            id: id.to_string(),
            owner_name: Some("DOE JANE".to_string()),
            address_full: address.to_string(),
            property_class: Some("2".to_string()),
            municipality: Some("Springfield".to_string()),
            county: Some("Union".to_string()),
        }
    }

    #[test]
    fn test_best_match_prefers_exact_canonical() {
        let address = parse_address("12 Oak Avenue, Springfield, NJ");
        let candidates = vec![
            record("near", "12 Oak Ave Apt 2, Springfield NJ"),
            record("exact", "12 OAK AVE, SPRINGFIELD, NJ"),
        ];

        let (found, confidence) = best_match(&address, &candidates).unwrap();
        assert_eq!(found.id, "exact");
        assert_eq!(confidence, LINK_CONFIDENCE_ADDRESS);
    }

    #[test]
    fn test_best_match_ignores_dissimilar_records() {
        let address = parse_address("123 Main St, Springfield");
        let candidates = vec![record("other", "456 Oak Ave")];
        assert!(best_match(&address, &candidates).is_none());
    }

    #[test]
    fn test_best_match_uses_similarity_as_confidence() {
        let address = parse_address("123 Main St, Springfield");
        let candidates = vec![record("close", "123 Main Street West")];

        let (found, confidence) = best_match(&address, &candidates).unwrap();
        assert_eq!(found.id, "close");
        assert!(confidence > ADDRESS_LINK_THRESHOLD && confidence < LINK_CONFIDENCE_ADDRESS);
    }
}
