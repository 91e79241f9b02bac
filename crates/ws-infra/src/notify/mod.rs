//! Notification adapters.

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use ws_core::ports::NotifierPort;
use ws_core::NotificationKind;

/// Writes notifications to the log. Default for headless hosts.
pub struct TracingNotifier;

impl NotifierPort for TracingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Success => info!(target: "wellsync::notify", "{}", message),
            NotificationKind::Warning => warn!(target: "wellsync::notify", "{}", message),
            NotificationKind::Error => error!(target: "wellsync::notify", "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Forwards notifications to a UI task over an unbounded channel.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotifierPort for ChannelNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        let notification = Notification {
            kind,
            message: message.to_string(),
        };
        if self.tx.send(notification).is_err() {
            warn!(?kind, text = message, "notification receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_notifier_forwards_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(NotificationKind::Warning, "saved, will sync later");
        notifier.notify(NotificationKind::Error, "saved only on this device");

        assert_eq!(
            rx.recv().await,
            Some(Notification {
                kind: NotificationKind::Warning,
                message: "saved, will sync later".into()
            })
        );
        assert_eq!(rx.recv().await.map(|n| n.kind), Some(NotificationKind::Error));
    }
}
