//! Fuzz target for model metadata rendering.
//!
//! Run with: cargo +nightly fuzz run fuzz_model_timestamps
//!
//! `modified_at` comes straight from the daemon, so timestamp parsing and
//! size formatting must never panic on arbitrary input.

#![no_main]

use herdctl_core::ModelSummary;
use herdctl_core::format::{format_datetime, format_size};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let size = data
        .get(..8)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map_or(0, u64::from_le_bytes);
    let raw = String::from_utf8_lossy(data);

    let _ = format_datetime(&raw);
    assert!(!format_size(size).is_empty());

    let model = ModelSummary::new(raw.as_ref(), size, &raw);
    let _ = model.modified_at.display();
    let _ = model.display_size();
});
