//! Wall-clock helpers used for `lastSyncTime` and `updated_at` stamps.

use chrono::{DateTime, Utc};

/// Timestamp type carried by sync status and remote rows.
pub type Timestamp = DateTime<Utc>;

/// Current wall-clock time in UTC.
pub fn now() -> Timestamp {
    Utc::now()
}

