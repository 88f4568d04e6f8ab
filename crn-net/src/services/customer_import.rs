//! Bulk customer import
//!
//! Rows arrive pre-parsed. De-duplication is enforced by the store at insert
//! time through the `(business_id, dedup_key)` unique index, so two imports
//! running side by side cannot both insert the same person.

use chrono::Utc;
use crn_common::address::parse_address;
use crn_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::businesses;
use crate::db::customers::{self, InsertOutcome, NewCustomer};
use crate::models::ImportReport;
use crate::utils::{retry_on_lock, MAX_LOCK_WAIT_MS};

/// Lowercased trimmed name plus the normalized address
pub fn dedup_key(row: &NewCustomer) -> String {
    let name = row.name.trim().to_lowercase();
    let address = row
        .address
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .map(|a| {
            parse_address(a)
                .with_city_fallback(row.city.as_deref())
                .with_state_fallback(row.state.as_deref())
                .canonical()
        })
        .unwrap_or_default();
    format!("{}|{}", name, address)
}

#[derive(Clone)]
pub struct CustomerImporter {
    db: SqlitePool,
}

impl CustomerImporter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn import(&self, business_id: &str, rows: &[NewCustomer]) -> Result<ImportReport> {
        let business = businesses::find_by_id(&self.db, business_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Business {}", business_id)))?;

        let mut report = ImportReport::default();

        for (index, row) in rows.iter().enumerate() {
            let line = index + 1;

            if row.name.trim().is_empty() {
                report.failed += 1;
                report.errors.push(format!("row {}: name is required", line));
                continue;
            }

            let key = dedup_key(row);
            let outcome = retry_on_lock("customer import", MAX_LOCK_WAIT_MS, || {
                customers::insert_deduplicated(
                    &self.db,
                    business_id,
                    row,
                    &key,
                    business.customer_count_limit,
                    Utc::now(),
                )
            })
            .await;

            match outcome {
                Ok(InsertOutcome::Inserted(_)) => report.imported += 1,
                Ok(InsertOutcome::Duplicate) => report.skipped += 1,
                Ok(InsertOutcome::LimitReached) => {
                    report.failed += 1;
                    report.errors.push(format!(
                        "row {}: customer limit of {} reached",
                        line,
                        business.customer_count_limit.unwrap_or_default()
                    ));
                }
                Err(e) => {
                    warn!(business_id, row = line, error = %e, "Customer import row failed");
                    report.failed += 1;
                    report.errors.push(format!("row {}: {}", line, e));
                }
            }
        }

        info!(
            business_id,
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            "Customer import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn row(name: &str, address: Option<&str>) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            address: address.map(str::to_string),
            ..NewCustomer::default()
        }
    }

    async fn seed_business(pool: &SqlitePool, limit: Option<i64>) {
        sqlx::query("INSERT INTO businesses (id, name, customer_count_limit) VALUES ('biz', 'Biz', ?)")
            .bind(limit)
            .execute(pool)
            .await
            .unwrap();
    }

    #[test]
    fn test_dedup_key_normalizes_name_and_address() {
        let a = dedup_key(&row("  Jane Doe ", Some("12 Oak Avenue, Springfield")));
        let b = dedup_key(&row("jane doe", Some("12 OAK AVE, Springfield")));
        assert_eq!(a, b);
        assert_eq!(dedup_key(&row("Jane Doe", None)), "jane doe|");
    }

    #[tokio::test]
    async fn test_import_counts_duplicates_and_errors() {
        let pool = test_pool().await;
        seed_business(&pool, None).await;
        let importer = CustomerImporter::new(pool.clone());

        let rows = vec![
            row("Jane Doe", Some("12 Oak Avenue, Springfield")),
            row("JANE DOE", Some("12 Oak Ave, Springfield")),
            row("  ", None),
            row("John Roe", None),
        ];
        let report = importer.import("biz", &rows).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.messages(), ["row 3: name is required".to_string()]);

        // Re-import against the store, not an in-memory snapshot
        let again = importer.import("biz", &rows[..1]).await.unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.skipped, 1);
    }

    #[tokio::test]
    async fn test_import_honors_customer_limit() {
        let pool = test_pool().await;
        seed_business(&pool, Some(1)).await;
        let importer = CustomerImporter::new(pool.clone());

        let report = importer
            .import("biz", &[row("A", None), row("B", None)])
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors.messages()[0].contains("limit of 1"));
    }

    #[tokio::test]
    async fn test_unknown_business_is_not_found() {
        let pool = test_pool().await;
        let importer = CustomerImporter::new(pool);
        let err = importer.import("nope", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
