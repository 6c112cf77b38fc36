//! Transient notification channel.
//!
//! All user-visible failures and confirmations go through here; the view
//! layer renders them as auto-dismissing toasts. Nothing here is fatal.

use std::time::Duration;

use tokio::sync::broadcast;

/// How long the view layer should keep a notice on screen.
pub const NOTICE_TTL: Duration = Duration::from_millis(2500);

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// One transient notice.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    /// Display lifetime before auto-dismissal.
    pub ttl: Duration,
}

/// Fan-out handle for notices.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Subscribe to the notice stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Emit a notice. Having no subscribers is fine.
    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.tx.send(Notice {
            message: message.into(),
            level,
            ttl: NOTICE_TTL,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.error("something broke");
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "something broke");
        assert_eq!(notice.ttl, NOTICE_TTL);
    }

    #[test]
    fn test_notify_without_subscribers_is_a_noop() {
        let notifier = Notifier::new();
        notifier.info("nobody listening");
    }
}
