use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use evalboard_types::{Notification, NotificationId, NotificationKind};
use parking_lot::Mutex;
use tracing::warn;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotifyOptions {
    pub title: Option<String>,
    /// `None` means the default duration; zero never expires.
    pub duration: Option<Duration>,
    pub persistent: bool,
}

impl NotifyOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct Inner {
    notifications: Mutex<Vec<Notification>>,
    next_id: AtomicU64,
}

/// Ordered queue of user-facing messages. Cheap to clone; clones share the queue.
#[derive(Clone, Default)]
pub struct NotificationStore {
    inner: Arc<Inner>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a notification and, unless it is persistent or has a zero
    /// duration, schedules its removal on the current tokio runtime.
    pub fn add(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        options: NotifyOptions,
    ) -> NotificationId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = Notification {
            id,
            kind,
            title: options.title,
            message: message.into(),
            duration_ms: options
                .duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            persistent: options.persistent,
            timestamp: Utc::now(),
        };
        let expires = notification.expires();
        self.inner.notifications.lock().push(notification);

        if expires {
            let delay = options.duration.unwrap_or(DEFAULT_DURATION);
            self.schedule_removal(id, delay);
        }
        id
    }

    fn schedule_removal(&self, id: NotificationId, delay: Duration) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!("no runtime for notification {id}, it stays until removed");
                return;
            }
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                NotificationStore { inner }.remove(id);
            }
        });
    }

    /// Deletes by id. Returns whether anything was removed.
    pub fn remove(&self, id: NotificationId) -> bool {
        let mut notifications = self.inner.notifications.lock();
        match notifications.iter().position(|n| n.id == id) {
            Some(index) => {
                notifications.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.inner.notifications.lock().clear();
    }

    pub fn list(&self) -> Vec<Notification> {
        self.inner.notifications.lock().clone()
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.inner
            .notifications
            .lock()
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.notifications.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn success(&self, message: impl Into<String>, options: NotifyOptions) -> NotificationId {
        self.add(NotificationKind::Success, message, options)
    }

    /// Errors stay until dismissed unless a duration is given.
    pub fn error(&self, message: impl Into<String>, options: NotifyOptions) -> NotificationId {
        let options = NotifyOptions {
            duration: Some(options.duration.unwrap_or(Duration::ZERO)),
            ..options
        };
        self.add(NotificationKind::Error, message, options)
    }

    pub fn warning(&self, message: impl Into<String>, options: NotifyOptions) -> NotificationId {
        self.add(NotificationKind::Warning, message, options)
    }

    pub fn info(&self, message: impl Into<String>, options: NotifyOptions) -> NotificationId {
        self.add(NotificationKind::Info, message, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn default_duration_expires_after_five_seconds() {
        let store = NotificationStore::new();
        let id = store.info("Saved", NotifyOptions::default());
        assert!(store.get(id).is_some());

        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert!(store.get(id).is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(store.get(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_and_zero_duration_stay() {
        let store = NotificationStore::new();
        let pinned = store.warning(
            "Read only",
            NotifyOptions {
                persistent: true,
                ..Default::default()
            },
        );
        let failed = store.error("Upload failed", NotifyOptions::default());
        assert_eq!(store.get(failed).unwrap().duration_ms, Some(0));

        tokio::time::sleep(Duration::from_secs(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.len(), 2);

        assert!(store.remove(pinned));
        assert!(!store.remove(pinned));
        assert_eq!(store.list().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_with_explicit_duration_expires() {
        let store = NotificationStore::new();
        let id = store.error(
            "Retrying",
            NotifyOptions {
                duration: Some(Duration::from_millis(1000)),
                ..Default::default()
            },
        );
        tokio::time::sleep(Duration::from_millis(1001)).await;
        tokio::task::yield_now().await;
        assert!(store.get(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn early_removal_makes_timer_a_no_op() {
        let store = NotificationStore::new();
        let first = store.success("one", NotifyOptions::titled("Done"));
        let second = store.success("two", NotifyOptions::default());
        assert!(store.remove(first));

        tokio::time::sleep(Duration::from_millis(5001)).await;
        tokio::task::yield_now().await;
        assert!(store.get(second).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn oversized_duration_saturates() {
        let store = NotificationStore::new();
        let id = store.info(
            "Indexing",
            NotifyOptions {
                duration: Some(Duration::MAX),
                ..Default::default()
            },
        );
        assert_eq!(store.get(id).unwrap().duration_ms, Some(u64::MAX));
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let store = NotificationStore::new();
        let a = store.error("a", NotifyOptions::default());
        let b = store.error("b", NotifyOptions::default());
        assert!(b > a);
        let kinds: Vec<NotificationKind> = store.list().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Error, NotificationKind::Error]);
        store.clear();
        assert!(store.is_empty());
    }
}
