//! Store access for crn-net
//!
//! Schema creation and migrations live in `crn_common::db`; these modules
//! hold the queries.

pub mod businesses;
pub mod customers;
pub mod events;
pub mod identities;
pub mod links;
pub mod properties;

/// Single-connection in-memory pool with the full schema
#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crn_common::db::init::create_schema(&pool).await.unwrap();
    pool
}
