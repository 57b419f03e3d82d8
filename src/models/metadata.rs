//! Lifecycle record kept for every live object.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One record per object identifier, stored in the metadata namespace and
/// mirrored in the process cache.
///
/// Timestamps are persisted as epoch milliseconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Name the identifier was derived from, `None` for random objects.
    pub name: Option<String>,

    /// Terminal marker set immediately before the record is destroyed.
    pub purged: bool,

    /// Last durable heartbeat.
    #[serde(rename = "time", with = "chrono::serde::ts_milliseconds")]
    pub last_touch: DateTime<Utc>,

    /// When the record was (last) written by `create`.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
}

impl ObjectMetadata {
    pub fn new(name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            name,
            purged: false,
            last_touch: now,
            created: now,
        }
    }

    /// Whether the heartbeat must be written back before serving a request.
    pub fn needs_touch(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        !self.purged && now - self.last_touch >= interval
    }
}
