//! In-memory adapters for task lifecycle ports.

mod store;

pub use store::InMemoryProjectStore;
