//! Timestamp helpers.
//!
//! The storage core models `created_at`/`updated_at`/`closed_at`/etc. as
//! epoch-second instants. On disk they round-trip through `chrono`'s RFC3339
//! `Serialize`/`Deserialize` impl for `DateTime<Utc>` (matching the rest of
//! this codebase's JSON shapes); the conversions below are how callers that
//! think in epoch seconds (per the spec's data model) cross that boundary.

use chrono::{DateTime, TimeZone, Utc};

/// The current instant, truncated to whole seconds (matches the precision
/// the on-disk format and the dirty-set clock both use).
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap()
}

/// Convert a `DateTime<Utc>` to an epoch-second integer.
#[must_use]
pub fn to_epoch_secs(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Convert an epoch-second integer to a `DateTime<Utc>`.
///
/// Returns `None` if `secs` is out of chrono's representable range.
#[must_use]
pub fn from_epoch_secs(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
