//! Transient notification overlay: queued messages drawn atop the cell
//! buffer, one at a time.
//!
//! No teacher counterpart — `alacritty` has no such concept — built from
//! the spec's notification-overlay component directly.

use serde::{Deserialize, Serialize};

/// Where a notification is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyPosition {
    /// Top of the screen, spanning the width.
    Top,
    /// Scoped to a single pane's region.
    Pane,
}

/// Visual emphasis for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyStyle {
    /// Plain informational message.
    Info,
    /// Warning emphasis.
    Warning,
    /// Error emphasis.
    Error,
}

/// One queued transient message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// The message text.
    pub text: String,
    /// Absolute time (ms) at which this notification should stop drawing.
    pub expires_at_ms: u64,
    /// Where to draw it.
    pub position: NotifyPosition,
    /// Visual style.
    pub style: NotifyStyle,
}

/// Default duration a notification stays visible.
pub const DEFAULT_DURATION_MS: u64 = 3_000;

/// A FIFO queue of notifications with at most one active at a time.
#[derive(Debug, Default)]
pub struct NotifyQueue {
    pending: std::collections::VecDeque<Notification>,
    active: Option<Notification>,
}

impl NotifyQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message, promoting it to active immediately if nothing else
    /// is showing.
    pub fn push(&mut self, notification: Notification) {
        if self.active.is_none() {
            self.active = Some(notification);
        } else {
            self.pending.push_back(notification);
        }
    }

    /// Advance the queue against the current time. Returns `true` if the
    /// active notification changed (expired, or a new one was promoted) and
    /// the display needs to be refreshed.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let expired = matches!(&self.active, Some(n) if now_ms >= n.expires_at_ms);
        if expired {
            self.active = self.pending.pop_front();
            true
        } else {
            false
        }
    }

    /// The currently displayed notification, if any.
    pub fn active(&self) -> Option<&Notification> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(text: &str, expires_at_ms: u64) -> Notification {
        Notification { text: text.into(), expires_at_ms, position: NotifyPosition::Top, style: NotifyStyle::Info }
    }

    #[test]
    fn first_push_becomes_active_immediately() {
        let mut q = NotifyQueue::new();
        q.push(note("hello", 1000));
        assert_eq!(q.active().unwrap().text, "hello");
    }

    #[test]
    fn second_push_queues_behind_active() {
        let mut q = NotifyQueue::new();
        q.push(note("first", 1000));
        q.push(note("second", 2000));
        assert_eq!(q.active().unwrap().text, "first");
    }

    #[test]
    fn update_promotes_next_on_expiry() {
        let mut q = NotifyQueue::new();
        q.push(note("first", 1000));
        q.push(note("second", 2000));

        assert!(!q.update(500));
        assert!(q.update(1500));
        assert_eq!(q.active().unwrap().text, "second");
    }

    #[test]
    fn update_clears_when_queue_drains() {
        let mut q = NotifyQueue::new();
        q.push(note("only", 1000));
        assert!(q.update(1500));
        assert!(q.active().is_none());
    }
}
