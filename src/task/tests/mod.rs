//! Unit tests for the task lifecycle core.

mod domain_tests;
mod status_tests;
mod support;
