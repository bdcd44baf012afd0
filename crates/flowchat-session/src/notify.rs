//! Notifier implementations.

use flowchat_core::{Alert, Notifier};
use tokio::sync::mpsc;

/// Forwards alerts into a queue for the UI loop to drain.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its queue.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, alert: Alert) {
        if self.tx.send(alert).is_err() {
            tracing::debug!("alert receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_are_queued_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Alert::notice("one"));
        notifier.notify(Alert::notice("two"));

        assert_eq!(rx.try_recv().unwrap(), Alert::notice("one"));
        assert_eq!(rx.try_recv().unwrap(), Alert::notice("two"));
    }
}
