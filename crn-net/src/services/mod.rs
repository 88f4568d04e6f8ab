//! Service modules for the reliability network
//!
//! Resolution and aggregation operate on single identities; sync, bootstrap
//! and import are the batch jobs built on top of them.

pub mod customer_import;
pub mod identity_resolver;
pub mod name_utils;
pub mod network_search;
pub mod network_sync;
pub mod property_bootstrap;
pub mod reputation_aggregator;

pub use customer_import::CustomerImporter;
pub use identity_resolver::{IdentityResolver, Resolved};
pub use network_sync::NetworkSync;
pub use property_bootstrap::PropertyBootstrap;
pub use reputation_aggregator::{ContributionOutcome, ReputationAggregator};
