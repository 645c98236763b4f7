//! Notification - ユーザー向け通知フィード

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::NotificationId;

pub const DEFAULT_FEED_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,

    /// What the notification points at (e.g. an item id the UI can open).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub timestamp: DateTime<Utc>,
    pub payload: NotificationPayload,
    #[serde(default)]
    pub read: bool,
}

/// Bounded, newest-first notification list.
///
/// Inserting beyond capacity evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFeed {
    entries: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        self.entries.push_front(notification);
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }

    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.entries.iter_mut().find(|n| &n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.entries {
            n.read = true;
        }
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
