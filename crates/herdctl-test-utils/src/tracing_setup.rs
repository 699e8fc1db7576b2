//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that emits tracing events
//! and wants them captured by the test harness. Initialisation happens at
//! most once per process.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes to the test-harness writer and honours
/// `RUST_LOG`, defaulting to `herdctl` crates at debug.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     herdctl_test_utils::tracing_setup::init_test_tracing();
///     tracing::info!("visible with --nocapture");
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,herdctl_core=debug,herdctl_web=debug")),
        )
        .with_test_writer()
        .try_init();
}
