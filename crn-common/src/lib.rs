//! # CRN Common Library
//!
//! Shared code for the customer reliability network services:
//! - Contact hashing and address normalization (pseudonymous keys)
//! - Reputation tiers and the per-business scoring engine
//! - Database schema, migrations and row models
//! - Configuration loading
//! - Heuristic constants

pub mod address;
pub mod config;
pub mod db;
pub mod error;
pub mod identity_hash;
pub mod reputation;
pub mod scoring;
pub mod tuning;

pub use error::{Error, Result};
pub use identity_hash::{hash_contact, HashedContact};
pub use reputation::RiskTier;
pub use scoring::{score_customer, CustomerScore};
