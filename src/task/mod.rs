//! Task lifecycle management for Atelier.
//!
//! This module implements the task/review lifecycle core: creating and
//! updating task records inside a shared project document, enforcing
//! validated status transitions, and tracking time against tasks with
//! at most one active session per task. Writes go through per-task
//! optimistic version checks so that concurrent clients editing the
//! same project cannot silently discard each other's changes. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
