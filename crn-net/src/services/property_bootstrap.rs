//! Identity bootstrap from the property table
//!
//! Seeds address-only network identities from residential property records
//! so that later customer resolutions can join them. Re-running over an
//! unchanged property table creates nothing new: a record that already has a
//! link, or whose address hash already belongs to a linked identity, is
//! skipped.

use chrono::Utc;
use crn_common::address::parse_address;
use crn_common::db::{MatchType, PropertyRecord};
use crn_common::tuning::{LINK_CONFIDENCE_ADDRESS, LINK_CONFIDENCE_AUTO_GENERATED};
use crn_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::{links, properties};
use crate::models::BootstrapReport;
use crate::services::identity_resolver::IdentityResolver;
use crate::services::name_utils::is_business_entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Skipped(&'static str),
    Linked { new_identity: bool },
}

#[derive(Clone)]
pub struct PropertyBootstrap {
    db: SqlitePool,
    resolver: IdentityResolver,
    page_size: usize,
    residential_classes: Vec<String>,
}

impl PropertyBootstrap {
    pub fn new(db: SqlitePool, page_size: usize, residential_classes: Vec<String>) -> Self {
        Self {
            resolver: IdentityResolver::new(db.clone()),
            db,
            page_size: page_size.max(1),
            residential_classes,
        }
    }

    /// Process at most `limit` residential records, optionally within one
    /// county
    pub async fn run(&self, limit: usize, county: Option<&str>) -> Result<BootstrapReport> {
        info!(limit, county = county.unwrap_or("*"), "Starting property bootstrap");

        let mut report = BootstrapReport::default();
        let mut after_id: Option<String> = None;

        while report.total < limit {
            let requested = self.page_size.min(limit - report.total);
            let page = properties::fetch_residential_page(
                &self.db,
                &self.residential_classes,
                county,
                after_id.as_deref(),
                requested as i64,
            )
            .await?;
            let exhausted = page.len() < requested;
            after_id = page.last().map(|p| p.id.clone());

            for record in &page {
                report.total += 1;
                match self.bootstrap_record(record).await {
                    Ok(RecordOutcome::Skipped(reason)) => {
                        debug!(property_record_id = %record.id, reason, "Skipped property record");
                        report.skipped += 1;
                    }
                    Ok(RecordOutcome::Linked { new_identity }) => {
                        report.created += 1;
                        if new_identity {
                            report.new_identities += 1;
                        } else {
                            report.joined_existing += 1;
                        }
                    }
                    Err(e) => {
                        warn!(property_record_id = %record.id, error = %e, "Property bootstrap failed");
                        report.failed += 1;
                        report.errors.push(format!("property {}: {}", record.id, e));
                    }
                }
            }

            if exhausted {
                break;
            }
        }

        info!(
            total = report.total,
            created = report.created,
            joined_existing = report.joined_existing,
            new_identities = report.new_identities,
            skipped = report.skipped,
            failed = report.failed,
            "Property bootstrap finished"
        );
        Ok(report)
    }

    async fn bootstrap_record(&self, record: &PropertyRecord) -> Result<RecordOutcome> {
        if record.owner_name.as_deref().is_some_and(is_business_entity) {
            return Ok(RecordOutcome::Skipped("business owner"));
        }

        let Some(address_hash) = parse_address(&record.address_full)
            .with_city_fallback(record.municipality.as_deref())
            .address_hash()
        else {
            return Ok(RecordOutcome::Skipped("address too incomplete to key"));
        };

        if links::find_for_property(&self.db, &record.id).await?.is_some() {
            return Ok(RecordOutcome::Skipped("already linked"));
        }
        if links::exists_for_address_hash(&self.db, &address_hash).await? {
            return Ok(RecordOutcome::Skipped("address already linked"));
        }

        let resolved = self.resolver.resolve_address(&address_hash).await?;
        let (match_type, confidence) = if resolved.created {
            (MatchType::AutoGenerated, LINK_CONFIDENCE_AUTO_GENERATED)
        } else {
            (MatchType::Address, LINK_CONFIDENCE_ADDRESS)
        };

        let linked = links::insert_link(
            &self.db,
            &record.id,
            &resolved.identity_id,
            match_type,
            confidence,
            Utc::now(),
        )
        .await?;

        if linked {
            Ok(RecordOutcome::Linked {
                new_identity: resolved.created,
            })
        } else {
            Ok(RecordOutcome::Skipped("linked concurrently"))
        }
    }
}
