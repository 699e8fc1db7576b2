//! Build-time metadata embedded by the build script.

use chrono::{DateTime, Utc};

/// Short git commit hash, or `"unknown"` outside a checkout.
pub const GIT_HASH: &str = env!("HERDCTL_GIT_HASH");

/// Build time as Unix epoch seconds.
pub const BUILD_TIMESTAMP: &str = env!("HERDCTL_BUILD_TIMESTAMP");

/// Cargo profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("HERDCTL_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version with git hash and profile, e.g. `"0.1.0 (abc1234, debug)"`.
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

/// `User-Agent` sent with every daemon request.
pub fn user_agent() -> String {
    format!("herdctl/{VERSION}")
}

/// When this binary was built, if the embedded timestamp is usable.
pub fn built_at() -> Option<DateTime<Utc>> {
    let secs = BUILD_TIMESTAMP.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}
