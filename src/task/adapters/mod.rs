//! Adapter implementations for the task lifecycle ports.

pub mod memory;
