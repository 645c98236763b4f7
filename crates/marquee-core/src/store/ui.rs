//! UiStore - モーダル・サイドバー・トースト・通知フィード
//!
//! 純粋にローカルな状態。リモート呼び出しはしない。

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::domain::{
    Notification, NotificationFeed, NotificationId, NotificationKind, NotificationPayload,
};
use crate::ports::id_generator::generate;
use crate::ports::{Clock, IdGenerator};

/// Transient message shown on top of the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub open_modals: BTreeSet<String>,
    pub sidebar_collapsed: bool,
    pub toasts: VecDeque<Toast>,
    pub toast_capacity: usize,
    pub notifications: NotificationFeed,
}

impl UiState {
    pub fn new(toast_capacity: usize, notification_capacity: usize) -> Self {
        Self {
            open_modals: BTreeSet::new(),
            sidebar_collapsed: false,
            toasts: VecDeque::new(),
            toast_capacity: toast_capacity.max(1),
            notifications: NotificationFeed::new(notification_capacity),
        }
    }
}

pub struct UiStore {
    state: Mutex<UiState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl UiStore {
    pub fn new(
        toast_capacity: usize,
        notification_capacity: usize,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            state: Mutex::new(UiState::new(toast_capacity, notification_capacity)),
            clock,
            ids,
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut UiState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    pub fn snapshot(&self) -> UiState {
        self.with(|s| s.clone())
    }

    // --- modals ---

    pub fn open_modal(&self, name: impl Into<String>) {
        let name = name.into();
        self.with(|s| s.open_modals.insert(name));
    }

    pub fn close_modal(&self, name: &str) {
        self.with(|s| s.open_modals.remove(name));
    }

    /// Returns whether the modal is open afterwards.
    pub fn toggle_modal(&self, name: &str) -> bool {
        self.with(|s| {
            if s.open_modals.remove(name) {
                false
            } else {
                s.open_modals.insert(name.to_string());
                true
            }
        })
    }

    pub fn close_all_modals(&self) {
        self.with(|s| s.open_modals.clear());
    }

    pub fn is_modal_open(&self, name: &str) -> bool {
        self.with(|s| s.open_modals.contains(name))
    }

    // --- sidebar ---

    pub fn toggle_sidebar(&self) -> bool {
        self.with(|s| {
            s.sidebar_collapsed = !s.sidebar_collapsed;
            s.sidebar_collapsed
        })
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) {
        self.with(|s| s.sidebar_collapsed = collapsed);
    }

    // --- toasts ---

    /// Oldest toast is dropped once the toast capacity is exceeded.
    pub fn push_toast(&self, kind: NotificationKind, message: impl Into<String>) -> NotificationId {
        let id: NotificationId = generate(self.ids.as_ref());
        let toast = Toast {
            id: id.clone(),
            kind,
            message: message.into(),
        };
        self.with(|s| {
            s.toasts.push_back(toast);
            while s.toasts.len() > s.toast_capacity {
                s.toasts.pop_front();
            }
        });
        id
    }

    pub fn dismiss_toast(&self, id: &NotificationId) -> bool {
        self.with(|s| {
            let before = s.toasts.len();
            s.toasts.retain(|t| &t.id != id);
            s.toasts.len() != before
        })
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.with(|s| s.toasts.iter().cloned().collect())
    }

    // --- notifications ---

    pub fn notify(&self, payload: NotificationPayload) -> NotificationId {
        let id: NotificationId = generate(self.ids.as_ref());
        let notification = Notification {
            id: id.clone(),
            timestamp: self.clock.now(),
            payload,
            read: false,
        };
        tracing::debug!(notification = %id, title = %notification.payload.title, "notify");
        self.with(|s| s.notifications.push(notification));
        id
    }

    /// Newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.with(|s| s.notifications.to_vec())
    }

    pub fn mark_read(&self, id: &NotificationId) -> bool {
        self.with(|s| s.notifications.mark_read(id))
    }

    pub fn mark_all_read(&self) {
        self.with(|s| s.notifications.mark_all_read());
    }

    pub fn unread_count(&self) -> usize {
        self.with(|s| s.notifications.unread_count())
    }

    pub fn clear_notifications(&self) {
        self.with(|s| s.notifications.clear());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};

    fn store() -> UiStore {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        UiStore::new(5, 50, clock, ids)
    }

    fn payload(title: &str) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::Success,
            title: title.to_string(),
            message: String::new(),
            action_ref: None,
        }
    }

    #[test]
    fn modals_open_and_close_independently() {
        let ui = store();
        ui.open_modal("upload");
        ui.open_modal("confirm-delete");
        ui.close_modal("upload");
        assert!(ui.toggle_modal("share"));
        assert!(!ui.toggle_modal("share"));

        assert!(!ui.is_modal_open("upload"));
        assert!(ui.is_modal_open("confirm-delete"));
    }

    #[test]
    fn sidebar_toggles() {
        let ui = store();
        assert!(ui.toggle_sidebar());
        assert!(!ui.toggle_sidebar());
    }

    #[test]
    fn toasts_are_bounded_oldest_dropped() {
        let ui = store();
        for n in 0..7 {
            ui.push_toast(NotificationKind::Info, format!("t{n}"));
        }
        let messages: Vec<String> = ui.toasts().into_iter().map(|t| t.message).collect();
        assert_eq!(messages, vec!["t2", "t3", "t4", "t5", "t6"]);
    }

    #[test]
    fn dismissing_a_toast() {
        let ui = store();
        let id = ui.push_toast(NotificationKind::Error, "boom");
        assert!(ui.dismiss_toast(&id));
        assert!(!ui.dismiss_toast(&id));
        assert!(ui.toasts().is_empty());
    }

    #[test]
    fn notifications_are_bounded_and_newest_first() {
        let ui = store();
        for n in 0..60 {
            ui.notify(payload(&format!("n{n}")));
        }
        let feed = ui.notifications();
        assert_eq!(feed.len(), 50);
        assert_eq!(feed[0].payload.title, "n59");
        assert_eq!(feed[49].payload.title, "n10");
        assert_eq!(ui.unread_count(), 50);

        ui.mark_all_read();
        assert_eq!(ui.unread_count(), 0);
    }
}
