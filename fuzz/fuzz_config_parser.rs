//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary UTF-8 through `AppConfig::parse()`, covering TOML
//! decoding and validation of lifecycle command lists.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = herdctl_config::AppConfig::parse(s) {
            // A config that validates must yield runnable candidate lists.
            let start = herdctl_core::runner::commands_from_config(&config.lifecycle.start_commands);
            assert_eq!(start.len(), config.lifecycle.start_commands.len());
            assert!(config.lifecycle.timeout_policy.parse::<herdctl_core::TimeoutPolicy>().is_ok());
        }
    }
});
