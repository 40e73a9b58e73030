//! Wall-clock helpers.
//!
//! Timestamps on the wire are Unix milliseconds, matching what browser
//! clients get from `Date.now()`.

use chrono::{DateTime, Utc};

/// Current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
