//! Application services for the task lifecycle core.

mod client;
mod tracking;

pub use client::{Actor, ActorRole, TaskServiceError, TaskServiceResult, TaskStoreClient};
pub use tracking::TrackingSessionManager;
