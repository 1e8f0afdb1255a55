//! Port contracts for the task lifecycle core.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod store;

pub use store::{ProjectStore, ProjectStoreError, ProjectStoreResult};
