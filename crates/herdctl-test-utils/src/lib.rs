#![deny(unsafe_code)]

//! Shared test utilities for the herdctl workspace.
//!
//! Provides a fake model daemon, config builders, and tracing helpers so
//! that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! herdctl-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fake_daemon;
pub mod tracing_setup;
