//! Utility modules for crn-net

pub mod db_retry;

pub use db_retry::{retry_on_lock, MAX_LOCK_WAIT_MS};
