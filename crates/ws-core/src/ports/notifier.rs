use crate::notification::NotificationKind;

/// UI notification channel (toasts). Must not block.
pub trait NotifierPort: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
}
