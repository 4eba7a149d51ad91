//! User-visible notifications ("toasts").
//!
//! A bounded in-memory log. Every entry is also emitted through `tracing` so
//! operators see the same messages in logs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Number of notifications kept before the oldest is dropped.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: Option<String>,
    pub at: DateTime<Utc>,
}

/// Shared notification log.
#[derive(Debug, Clone)]
pub struct Notifications {
    inner: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifications {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn success(&self, title: impl Into<String>, description: Option<String>) {
        let title = title.into();
        info!(title = %title, description = description.as_deref().unwrap_or(""), "Notification");
        self.push(NotificationKind::Success, title, description);
    }

    pub fn error(&self, title: impl Into<String>, description: impl Into<String>) {
        let title = title.into();
        let description = description.into();
        warn!(title = %title, description = %description, "Error notification");
        self.push(NotificationKind::Error, title, Some(description));
    }

    /// All notifications, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn latest(&self) -> Option<Notification> {
        self.lock().back().cloned()
    }

    /// Remove and return everything logged so far.
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().drain(..).collect()
    }

    fn push(&self, kind: NotificationKind, title: String, description: Option<String>) {
        let mut log = self.lock();
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(Notification {
            kind,
            title,
            description,
            at: Utc::now(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let log = Notifications::new(2);
        log.success("one", None);
        log.success("two", None);
        log.error("three", "boom");

        let all = log.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "two");
        assert_eq!(log.latest().unwrap().kind, NotificationKind::Error);
        assert_eq!(log.latest().unwrap().description.as_deref(), Some("boom"));
    }

    #[test]
    fn test_drain() {
        let log = Notifications::default();
        log.success("Shipment cancelled", Some("Shipment 000007".to_string()));
        assert_eq!(log.drain().len(), 1);
        assert!(log.all().is_empty());
    }
}
