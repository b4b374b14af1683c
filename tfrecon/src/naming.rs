//! Unique resource names
//!
//! Generated names are `<prefix><timestamp><counter>`: an 18 digit UTC
//! timestamp with sub-second precision followed by an 8 digit hex counter,
//! so names generated in the same process never collide and sort by
//! creation time.

use chrono::Utc;
use regex::Regex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

pub const UNIQUE_ID_PREFIX: &str = "terraform-";

/// Length of the generated part appended to a prefix
pub const UNIQUE_ID_SUFFIX_LENGTH: usize = 26;

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9]{18}[0-9a-f]{8}$").unwrap_or_else(|e| panic!("invalid suffix pattern: {}", e))
    })
}

pub fn unique_id() -> String {
    prefixed_unique_id(UNIQUE_ID_PREFIX)
}

pub fn prefixed_unique_id(prefix: &str) -> String {
    let now = Utc::now();
    let timestamp = format!(
        "{}{:04}",
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_micros() / 100
    );
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
    format!("{}{}{:08x}", prefix, timestamp, counter)
}

/// Explicit name wins, then a generated name with the given prefix, then a
/// fully generated name
pub fn resolve_name(name: Option<&str>, name_prefix: Option<&str>) -> String {
    match (name, name_prefix) {
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some(prefix)) if !prefix.is_empty() => prefixed_unique_id(prefix),
        _ => unique_id(),
    }
}

pub fn has_generated_suffix(name: &str) -> bool {
    suffix_pattern().is_match(name)
}

/// Recovers the prefix of a generated name, used when importing.
/// Returns None for names that were not generated.
pub fn name_prefix_from_name(name: &str) -> Option<String> {
    if !has_generated_suffix(name) {
        return None;
    }
    let prefix = &name[..name.len() - UNIQUE_ID_SUFFIX_LENGTH];
    Some(prefix.to_string())
}
