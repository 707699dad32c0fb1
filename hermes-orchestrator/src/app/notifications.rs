//! Notification system for user-visible feedback
//!
//! Toasts for workflow outcomes and non-blocking errors. Blocking errors use
//! the modal in [`super::App`] instead.

use std::time::{Duration, Instant};

use super::commands::NotificationLevel;

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: usize,
    pub timestamp: Instant,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub auto_dismiss_after: Option<Duration>,
}

pub struct NotificationManager {
    notifications: Vec<Notification>,
    next_id: usize,
    max_notifications: usize,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
            next_id: 0,
            max_notifications: 20,
        }
    }

    /// Add an error notification. Errors stay until dismissed.
    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(NotificationLevel::Error, title.into(), message.into(), None)
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(
            NotificationLevel::Success,
            title.into(),
            message.into(),
            Some(Duration::from_secs(5)),
        )
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(
            NotificationLevel::Warning,
            title.into(),
            message.into(),
            Some(Duration::from_secs(8)),
        )
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(
            NotificationLevel::Info,
            title.into(),
            message.into(),
            Some(Duration::from_secs(5)),
        )
    }

    fn push(
        &mut self,
        level: NotificationLevel,
        title: String,
        message: String,
        auto_dismiss_after: Option<Duration>,
    ) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        self.notifications.push(Notification {
            id,
            timestamp: Instant::now(),
            level,
            title,
            message,
            auto_dismiss_after,
        });

        // Keep only recent notifications
        if self.notifications.len() > self.max_notifications {
            self.notifications.remove(0);
        }

        id
    }

    pub fn dismiss(&mut self, id: usize) {
        self.notifications.retain(|n| n.id != id);
    }

    /// Dismiss the newest notification, if any
    pub fn dismiss_latest(&mut self) {
        self.notifications.pop();
    }

    /// Active (non-expired) notifications, newest last
    pub fn get_active(&self) -> Vec<&Notification> {
        let now = Instant::now();
        self.notifications
            .iter()
            .filter(|n| match n.auto_dismiss_after {
                Some(duration) => now.duration_since(n.timestamp) < duration,
                None => true,
            })
            .collect()
    }

    pub fn cleanup_expired(&mut self) {
        let now = Instant::now();
        self.notifications.retain(|n| match n.auto_dismiss_after {
            Some(duration) => now.duration_since(n.timestamp) < duration,
            None => true,
        });
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
