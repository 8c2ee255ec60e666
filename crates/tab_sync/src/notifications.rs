//! Failure notification sinks.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub caption: String,
    pub detail: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn failure(caption: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self {
            caption: caption.into(),
            detail: error.to_string(),
            raised_at: Utc::now(),
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Reports notifications through the log only.
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notification: Notification) {
        error!(
            caption = %notification.caption,
            detail = %notification.detail,
            "notification raised"
        );
    }
}

/// Bounded queue of toasts waiting to be shown; the oldest is evicted when
/// full.
pub struct ToastQueue {
    capacity: usize,
    pending: Mutex<VecDeque<Notification>>,
}

impl ToastQueue {
    pub const DEFAULT_CAPACITY: usize = 32;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every pending toast, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl NotificationSink for ToastQueue {
    fn notify(&self, notification: Notification) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.len() == self.capacity {
            pending.pop_front();
        }
        pending.push_back(notification);
    }
}
