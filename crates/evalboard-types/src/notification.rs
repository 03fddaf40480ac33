use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

pub type NotificationId = u64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    /// Auto-removal delay in milliseconds. `Some(0)` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub persistent: bool,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Whether the store should schedule automatic removal.
    pub fn expires(&self) -> bool {
        !self.persistent && self.duration_ms != Some(0)
    }
}
