//! Transient operator notifications.
//!
//! The browser original pops auto-dismissing toasts; on a terminal a notice is
//! just a colored line. Tests install an mpsc sink instead.

use colored::*;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One transient operator-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Emits notices to the terminal, or into a channel when one is installed.
#[derive(Clone, Default)]
pub struct Notifier {
    sink: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn new() -> Self {
        Notifier { sink: None }
    }

    /// Route notices into `tx` instead of the terminal.
    pub fn with_sink(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Notifier { sink: Some(tx) }
    }

    pub fn success(&self, text: impl Into<String>) {
        self.emit(Notice {
            level: NoticeLevel::Success,
            text: text.into(),
        });
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        });
    }

    fn emit(&self, notice: Notice) {
        if let Some(tx) = &self.sink {
            let _ = tx.send(notice);
            return;
        }
        match notice.level {
            NoticeLevel::Success => println!("{} {}", "[ok]".bright_green().bold(), notice.text),
            NoticeLevel::Error => eprintln!("{} {}", "[error]".bright_red().bold(), notice.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_notice_reaches_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::with_sink(tx);
        notifier.success("saved");
        let notice = rx.try_recv().expect("notice");
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.text, "saved");
    }

    #[test]
    fn error_notice_reaches_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::with_sink(tx);
        notifier.error("boom");
        let notice = rx.try_recv().expect("notice");
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[test]
    fn notices_preserve_emission_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::with_sink(tx);
        notifier.success("first");
        notifier.error("second");
        assert_eq!(rx.try_recv().unwrap().text, "first");
        assert_eq!(rx.try_recv().unwrap().text, "second");
    }

    #[test]
    fn terminal_notifier_does_not_panic() {
        let notifier = Notifier::new();
        notifier.success("printed");
        notifier.error("printed");
    }

    #[test]
    fn notifier_clones_share_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::with_sink(tx);
        let cloned = notifier.clone();
        cloned.success("from clone");
        assert_eq!(rx.try_recv().unwrap().text, "from clone");
    }
}
