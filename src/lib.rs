//! Atelier: collaboration core for shared project workspaces.
//!
//! This crate provides the task/review lifecycle engine shared by the
//! board, calendar, and review surfaces of the Atelier collaboration
//! tool: a validated status state machine, a time-tracking session
//! manager, and an optimistic synchronisation layer over a shared
//! project document.
//!
//! # Architecture
//!
//! Atelier follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (document store, etc.)
//!
//! # Modules
//!
//! - [`task`]: Task lifecycle, status transitions, and time tracking
//! - [`bus`]: In-process typed event broadcasting between UI surfaces

pub mod bus;
pub mod task;
