//! Read access to the scraped property table

use crn_common::db::PropertyRecord;
use crn_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const PROPERTY_COLUMNS: &str =
    "p.id, p.owner_name, p.address_full, p.property_class, p.municipality, p.county";

/// One keyset page of residential property records, ordered by id
///
/// `classes` are compared case-insensitively. An empty class list matches
/// nothing.
pub async fn fetch_residential_page(
    pool: &SqlitePool,
    classes: &[String],
    county: Option<&str>,
    after_id: Option<&str>,
    limit: i64,
) -> Result<Vec<PropertyRecord>> {
    if classes.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(PROPERTY_COLUMNS);
    qb.push(" FROM property_records p WHERE UPPER(p.property_class) IN (");
    let mut separated = qb.separated(", ");
    for class in classes {
        separated.push_bind(class.to_uppercase());
    }
    separated.push_unseparated(")");

    if let Some(county) = county {
        qb.push(" AND p.county = ").push_bind(county).push(" COLLATE NOCASE");
    }
    if let Some(after_id) = after_id {
        qb.push(" AND p.id > ").push_bind(after_id);
    }
    qb.push(" ORDER BY p.id LIMIT ").push_bind(limit);

    let records = qb
        .build_query_as::<PropertyRecord>()
        .fetch_all(pool)
        .await?;

    Ok(records)
}

/// Property records in a municipality that no identity is linked to yet
pub async fn unlinked_in_municipality(
    pool: &SqlitePool,
    municipality: &str,
    limit: i64,
) -> Result<Vec<PropertyRecord>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM property_records p
        LEFT JOIN identity_links l ON l.property_record_id = p.id
        WHERE l.id IS NULL AND p.municipality = ? COLLATE NOCASE
        ORDER BY p.id
        LIMIT ?
        "#,
        PROPERTY_COLUMNS
    );
    let records = sqlx::query_as::<_, PropertyRecord>(&sql)
        .bind(municipality.trim())
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(records)
}
