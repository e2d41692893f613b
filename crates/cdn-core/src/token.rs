//! Caller references for edge invalidations

use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a caller reference that is unique within this process.
///
/// The edge drops an invalidation whose reference matches an earlier one, so
/// a clock reading alone is not enough: two calls can land on the same
/// nanosecond. A process-wide sequence number breaks ties.
pub fn next_invalidation_token() -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        seq
    )
}
