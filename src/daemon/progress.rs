use log::warn;
use notify_rust::{Hint, Notification, NotificationHandle as DesktopHandle, Timeout};
use std::collections::HashMap;

use crate::domain::notification::{TransferId, TransferOutcome};
use crate::sync::sink::TransferProgressSink;

/// Sync progress as a desktop notification with a progress bar hint.
#[derive(Default)]
pub struct DesktopProgress {
    transfers: HashMap<u32, Transfer>,
}

struct Transfer {
    title: String,
    icon: String,
    handle: DesktopHandle,
}

impl DesktopProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

fn progress_notification(title: &str, icon: &str, percent: i32) -> Notification {
    let mut n = Notification::new();
    n.summary(title)
        .body("Syncing email")
        .icon(icon)
        .hint(Hint::Transient(true))
        .hint(Hint::CustomInt("value".to_string(), percent))
        .timeout(Timeout::Never);
    n
}

impl TransferProgressSink for DesktopProgress {
    fn create_event(&mut self, title: &str, icon: &str) -> Option<TransferId> {
        match progress_notification(title, icon, 0).show() {
            Ok(handle) if handle.id() != 0 => {
                let id = handle.id();
                self.transfers.insert(
                    id,
                    Transfer {
                        title: title.to_string(),
                        icon: icon.to_string(),
                        handle,
                    },
                );
                Some(TransferId(id))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Could not show sync progress: {e}");
                None
            }
        }
    }

    fn update_progress(&mut self, id: TransferId, fraction: f64) {
        let Some(t) = self.transfers.get_mut(&id.0) else {
            return;
        };
        let percent = (fraction * 100.0).round() as i32;
        // keeps the id, so update() redraws in place
        *t.handle = progress_notification(&t.title, &t.icon, percent);
        t.handle.update();
    }

    fn finish(&mut self, id: TransferId, outcome: TransferOutcome, error: Option<&str>) {
        let Some(t) = self.transfers.remove(&id.0) else {
            return;
        };
        match outcome {
            TransferOutcome::Finished => t.handle.close(),
            TransferOutcome::Interrupted => {
                let mut n = Notification::new();
                n.id(id.0)
                    .summary(&t.title)
                    .body(error.unwrap_or("Interrupted"))
                    .icon(&t.icon)
                    .hint(Hint::Transient(true));
                if let Err(e) = n.show() {
                    warn!("Could not report interrupted sync: {e}");
                }
            }
        }
    }
}
