use anyhow::Result;

use crate::domain::notification::{
    NotificationHandle, NotificationSpec, OpenNotification, RemoteAction, TransferId,
    TransferOutcome,
};

/// Presentation layer for notifications.
///
/// Callbacks from the presentation side (closed, action invoked) are not
/// delivered through this trait: they come back later as events, so none
/// of these calls can re-enter the engine.
pub trait NotificationSink {
    fn publish(&mut self, spec: &NotificationSpec) -> Result<NotificationHandle>;
    fn replace(&mut self, handle: NotificationHandle, spec: &NotificationSpec) -> Result<()>;
    fn close(&mut self, handle: NotificationHandle) -> Result<()>;

    /// Notifications still open from an earlier run, used on reload.
    fn open_notifications(&self) -> Vec<OpenNotification>;
}

/// Progress reporting for long-running sync work.
pub trait TransferProgressSink {
    /// `None` when the transfer UI could not create the event.
    fn create_event(&mut self, title: &str, icon: &str) -> Option<TransferId>;
    fn update_progress(&mut self, id: TransferId, fraction: f64);
    fn finish(&mut self, id: TransferId, outcome: TransferOutcome, error: Option<&str>);
}

/// Whoever opens messages, inboxes and reply windows for notification
/// buttons the engine does not handle itself.
pub trait RemoteActionTarget {
    fn invoke(&mut self, action: &RemoteAction) -> Result<()>;
}
