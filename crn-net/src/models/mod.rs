//! Response models shared by services and API handlers

pub mod batch_report;
pub mod identity_summary;

pub use batch_report::{BootstrapReport, ErrorLog, ImportReport, ResyncReport};
pub use identity_summary::IdentitySummary;
