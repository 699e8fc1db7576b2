#![deny(unsafe_code)]

//! herdctl core: status probing and lifecycle control for a local model
//! daemon.
//!
//! The pieces, leaves first:
//!
//! - [`probe`] issues one bounded health request and classifies the outcome
//!   into a [`ServerStatus`]. It never fails.
//! - [`runner`] tries an ordered list of OS commands until one succeeds.
//! - [`controller`] composes the runner into start/stop/restart with the
//!   configured delays and a single-flight guard.
//! - [`monitor`] re-probes on an interval and publishes each snapshot.
//!
//! The CLI, TUI and web front-ends are thin callers of these contracts.

use std::future::Future;
use std::pin::Pin;

/// A boxed `Send` future, for async trait methods used through `dyn Trait`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Chat prompt assembly.
pub mod chat;
/// HTTP client for the daemon's REST API.
pub mod client;
/// Lifecycle controller.
pub mod controller;
/// Control enablement derived from state.
pub mod controls;
/// Synthesized server logs and issues.
pub mod diagnostics;
/// Size and timestamp formatting.
pub mod format;
/// In-memory log collector for terminal front-ends.
pub mod logging;
/// Periodic status monitor.
pub mod monitor;
/// Status prober.
pub mod probe;
/// Command fallback runner.
pub mod runner;
/// Status snapshots and model inventory.
pub mod status;

pub use client::{ClientError, DaemonClient};
pub use controller::{LifecycleAction, LifecycleController};
pub use controls::ControlAvailability;
pub use logging::{LogCollector, LogReader};
pub use monitor::{MonitorHandle, StatusMonitor};
pub use probe::{Prober, StatusSource};
pub use runner::{CommandSpec, FallbackRunner, OperationResult, TimeoutPolicy};
pub use status::{ModelSummary, ServerState, ServerStatus};
