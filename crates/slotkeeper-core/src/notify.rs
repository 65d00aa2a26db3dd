//! User-visible notifications
//!
//! The core never prints; it hands notices to a [`Notifier`] supplied by the
//! host (a toast layer, the CLI console, or nothing at all).

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Receiver of user-facing notices
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Drops every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _level: NoticeLevel, _message: &str) {}
}

/// Forwards notices to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(notice = %message),
            NoticeLevel::Warning => tracing::warn!(notice = %message),
            NoticeLevel::Error => tracing::error!(notice = %message),
        }
    }
}

/// Applies the `show_notifications` setting in front of a notifier.
///
/// When disabled, info and success notices are dropped; warnings and errors
/// always get through.
#[derive(Clone)]
pub struct Notices {
    inner: Arc<dyn Notifier>,
    show_info: bool,
}

impl Notices {
    pub fn new(inner: Arc<dyn Notifier>, show_notifications: bool) -> Self {
        Self {
            inner,
            show_info: show_notifications,
        }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NoopNotifier), false)
    }

    pub fn info(&self, message: &str) {
        if self.show_info {
            self.inner.notify(NoticeLevel::Info, message);
        }
    }

    pub fn success(&self, message: &str) {
        if self.show_info {
            self.inner.notify(NoticeLevel::Success, message);
        }
    }

    pub fn warn(&self, message: &str) {
        self.inner.notify(NoticeLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.inner.notify(NoticeLevel::Error, message);
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingNotifier;
    use super::*;

    #[test]
    fn test_disabled_notifications_keep_errors() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notices = Notices::new(recorder.clone(), false);

        notices.info("info");
        notices.success("saved");
        notices.warn("careful");
        notices.error("failed");

        let levels: Vec<_> = recorder.notices.lock().iter().map(|(l, _)| *l).collect();
        assert_eq!(levels, vec![NoticeLevel::Warning, NoticeLevel::Error]);
    }

    #[test]
    fn test_enabled_notifications_pass_everything() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notices = Notices::new(recorder.clone(), true);
        notices.success("saved");
        assert_eq!(recorder.messages(NoticeLevel::Success), vec!["saved"]);
    }
}
