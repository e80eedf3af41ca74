//! Timeline entry accessors.
//!
//! Timeline entries arrive from external message buses. They carry the
//! timeline they belong to and an optional timestamp used for recency
//! comparison against the channel checkpoint:
//!
//! ```json
//! {
//!   "type": "Timeline Entry",
//!   "timeline": { "timelineId": "tl-1" },
//!   "timestamp": 1723000000000,
//!   "message": { ... }
//! }
//! ```

use chrono::DateTime;
use serde_json::Value;

/// Type name of external timeline entries.
pub const TYPE_TIMELINE_ENTRY: &str = "Timeline Entry";

/// Returns the timeline id of an entry, if it is a timeline entry at all.
#[must_use]
pub fn timeline_id_of(event: &Value) -> Option<&str> {
    if pact_node::type_name_of(event)? != TYPE_TIMELINE_ENTRY {
        return None;
    }
    event.get("timeline")?.get("timelineId")?.as_str()
}

/// Extracts an entry's timestamp in epoch milliseconds.
///
/// Accepts an integer (milliseconds) or an RFC 3339 string. Entries
/// without a parseable timestamp return `None` and are treated as newer
/// by recency checks.
#[must_use]
pub fn timeline_entry_timestamp(event: &Value) -> Option<i64> {
    match event.get("timestamp")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}
