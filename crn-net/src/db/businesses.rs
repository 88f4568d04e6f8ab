//! Business flags consumed as guards

use crn_common::db::Business;
use crn_common::Result;
use sqlx::SqlitePool;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Business>> {
    let business = sqlx::query_as::<_, Business>(
        "SELECT id, name, network_opt_in, network_synced, customer_count_limit FROM businesses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(business)
}

pub async fn opted_in_ids(pool: &SqlitePool) -> Result<Vec<String>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM businesses WHERE network_opt_in = 1 ORDER BY id")
            .fetch_all(pool)
            .await?;

    Ok(ids)
}

/// Set once every customer of the business has been folded into the network
pub async fn mark_synced(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE businesses SET network_synced = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
