//! Notification area backing store

use logdeck_session::{CapabilityRegistry, Notification, NotificationLevel};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::Result;

#[derive(Default)]
struct History {
    entries: VecDeque<Notification>,
    unread: usize,
}

/// Bounded history of notifications, newest last
#[derive(Clone)]
pub struct NotificationCenter {
    history: Arc<RwLock<History>>,
    limit: usize,
}

impl NotificationCenter {
    pub fn new(limit: usize) -> Self {
        Self {
            history: Arc::new(RwLock::new(History::default())),
            limit: limit.max(1),
        }
    }

    /// Create a center and bind it as the notification opener
    pub fn attach(capabilities: &CapabilityRegistry, limit: usize) -> Result<Self> {
        let center = Self::new(limit);
        let sink = center.clone();
        capabilities.bind_notification_opener(move |notification| sink.push(notification))?;
        Ok(center)
    }

    pub fn push(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::warn!(
                source = ?notification.source,
                caption = %notification.caption,
                "{}",
                notification.message
            ),
            NotificationLevel::Warning | NotificationLevel::Info => tracing::info!(
                source = ?notification.source,
                caption = %notification.caption,
                "{}",
                notification.message
            ),
        }

        let mut history = self.history.write();
        history.entries.push_back(notification);
        history.unread += 1;
        if history.entries.len() > self.limit {
            let overflow = history.entries.len() - self.limit;
            history.entries.drain(0..overflow);
            history.unread = history.unread.min(history.entries.len());
        }
    }

    pub fn list(&self) -> Vec<Notification> {
        self.history.read().entries.iter().cloned().collect()
    }

    pub fn for_session(&self, session_id: &str) -> Vec<Notification> {
        self.history
            .read()
            .entries
            .iter()
            .filter(|n| n.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect()
    }

    pub fn unread(&self) -> usize {
        self.history.read().unread
    }

    pub fn mark_all_read(&self) {
        self.history.write().unread = 0;
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut history = self.history.write();
        let before = history.entries.len();
        history.entries.retain(|n| n.id != id);
        let removed = before != history.entries.len();
        history.unread = history.unread.min(history.entries.len());
        removed
    }

    pub fn clear(&self) {
        let mut history = self.history.write();
        history.entries.clear();
        history.unread = 0;
    }

    pub fn len(&self) -> usize {
        self.history.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().entries.is_empty()
    }
}
