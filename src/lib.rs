//! formpilot binary internals, exposed for integration tests.

pub mod cli;
pub mod config;
