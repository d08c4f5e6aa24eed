//! logpilot daemon library.
//!
//! Exposes the daemon's modules for integration testing.
//! In production, `logpilot-daemon` is used as a binary (main.rs).

pub mod bootstrap;
pub mod cli;
pub mod logging;
pub mod metrics_server;
