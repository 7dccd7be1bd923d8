//! slicetriage-core
//!
//! Core library for post-processing the output of a binary-level memory-safety analyzer.
//!
//! Two independent pipelines live here:
//! - `slice`: parses one target-address section of a register def/use slice report into
//!   queryable lookup tables.
//! - `warnings` + `services`: classifies warning-stream lines, resolves both embedded
//!   addresses to source locations through an external symbolizer, and correlates them
//!   into normalized report records.
//!
//! All substantive logic is kept here so it is testable and reusable from any frontend.

pub mod config;
pub mod registers;
pub mod services;
pub mod slice;
pub mod warnings;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Parse a hexadecimal address, tolerating surrounding whitespace and an optional `0x` prefix.
pub fn parse_hex_address(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
