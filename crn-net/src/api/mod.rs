//! HTTP API handlers for crn-net

pub mod auth;
pub mod batch;
pub mod customers;
pub mod health;
pub mod network;

pub use batch::batch_routes;
pub use customers::customer_routes;
pub use health::health_routes;
pub use network::network_routes;
