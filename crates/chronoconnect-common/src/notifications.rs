//! Short user-facing notifications ("toasts").
//!
//! Every failure the session core surfaces to the user is wrapped in a
//! [`Notification`] whose title names the error kind and whose body carries
//! the underlying reason, if one is known.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Severity level for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A transient notification for the presentation surface.
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notification {
    /// Creates an info notification with a 5-second TTL.
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_level(NotificationLevel::Info, title, body, Duration::from_secs(5))
    }

    /// Creates a warning notification with an 8-second TTL.
    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_level(NotificationLevel::Warning, title, body, Duration::from_secs(8))
    }

    /// Creates an error notification with a 10-second TTL.
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_level(NotificationLevel::Error, title, body, Duration::from_secs(10))
    }

    fn with_level(
        level: NotificationLevel,
        title: impl Into<String>,
        body: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }

    /// Returns `true` if this notification has exceeded its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}: {}", self.title, self.body)
        }
    }
}

/// A bounded queue of notifications that auto-evicts expired entries.
#[derive(Debug)]
pub struct NotificationQueue {
    items: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a notification, evicting expired entries first.
    /// If still at capacity after eviction, the oldest entry is removed.
    pub fn push(&mut self, notification: Notification) {
        self.evict_expired();
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(notification);
    }

    /// Returns all currently visible (non-expired) notifications, oldest first.
    pub fn visible(&mut self) -> Vec<&Notification> {
        self.evict_expired();
        self.items.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_expired(&mut self) {
        self.items.retain(|n| !n.is_expired());
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(16)
    }
}
