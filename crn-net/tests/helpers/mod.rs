//! Shared fixtures for crn-net integration tests

#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{DateTime, Utc};
use crn_common::config::TomlConfig;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const TEST_BATCH_SECRET: &str = "test-batch-secret";

/// In-memory database with the full schema. One connection, since every
/// connection to `sqlite::memory:` is a separate database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    crn_common::db::init::create_schema(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

/// File-backed database for tests that need several connections
pub async fn file_pool() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = crn_common::db::init::init_database(&dir.path().join("crn-test.db"))
        .await
        .expect("Failed to init database");
    (pool, dir)
}

pub fn test_config(batch_secret: Option<&str>) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.batch_secret = batch_secret.map(str::to_string);
    config.batch.page_size = 2;
    config
}

pub fn test_app(pool: &SqlitePool, batch_secret: Option<&str>) -> Router {
    let state = crn_net::AppState::new(pool.clone(), test_config(batch_secret));
    crn_net::build_router(state)
}

pub async fn send(app: Router, request: Request<Body>) -> (Response, Value) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (Response::from_parts(parts, Body::empty()), json)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_batch(uri: &str, secret: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-batch-secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn insert_business(pool: &SqlitePool, id: &str, opt_in: bool, limit: Option<i64>) {
    sqlx::query(
        "INSERT INTO businesses (id, name, network_opt_in, customer_count_limit) VALUES (?, ?, ?, ?)",
    )
    .bind(id)
    .bind(format!("Business {}", id))
    .bind(opt_in)
    .bind(limit)
    .execute(pool)
    .await
    .unwrap();
}

pub struct CustomerFixture<'a> {
    pub id: &'a str,
    pub business_id: &'a str,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
}

impl<'a> CustomerFixture<'a> {
    pub fn new(id: &'a str, business_id: &'a str) -> Self {
        Self {
            id,
            business_id,
            name: "Pat Doe",
            phone: None,
            email: None,
            address: None,
            city: None,
            state: None,
        }
    }
}

pub async fn insert_customer(pool: &SqlitePool, customer: CustomerFixture<'_>) {
    sqlx::query(
        r#"
        INSERT INTO customers (id, business_id, name, phone, email, address, city, state, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer.id)
    .bind(customer.business_id)
    .bind(customer.name)
    .bind(customer.phone)
    .bind(customer.email)
    .bind(customer.address)
    .bind(customer.city)
    .bind(customer.state)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_event(
    pool: &SqlitePool,
    id: &str,
    business_id: &str,
    customer_id: &str,
    severity: i64,
    occurred_at: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO events (id, customer_id, business_id, severity, occurred_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(customer_id)
    .bind(business_id)
    .bind(severity)
    .bind(occurred_at)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_property(
    pool: &SqlitePool,
    id: &str,
    owner: &str,
    address: &str,
    class: &str,
    municipality: &str,
    county: &str,
) {
    sqlx::query(
        r#"
        INSERT INTO property_records (id, owner_name, address_full, property_class, municipality, county)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(owner)
    .bind(address)
    .bind(class)
    .bind(municipality)
    .bind(county)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
