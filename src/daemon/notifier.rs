use anyhow::Result;
use log::warn;
use notify_rust::{Hint, Notification, Timeout};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::daemon::notifications_file::{load_open, save_open};
use crate::domain::event::Event;
use crate::domain::notification::{
    CloseReason, NotificationHandle, NotificationSpec, OpenNotification,
};
use crate::sync::sink::NotificationSink;

/// Server-side action name reported when a notification goes away.
const CLOSED_ACTION: &str = "__closed";

/// Desktop notifications over the freedesktop notification service.
pub struct DesktopSink {
    state_path: PathBuf,
    open: BTreeMap<NotificationHandle, BTreeMap<String, String>>,
    /// Ids with a thread waiting for their action; shared with those threads.
    watched: Arc<Mutex<HashSet<u32>>>,
    events: Sender<Event>,
    /// Whether buttons with a method have somewhere to go.
    forwarding: bool,
}

impl DesktopSink {
    pub fn open(state_path: PathBuf, events: Sender<Event>, forwarding: bool) -> Self {
        let open = match load_open(&state_path) {
            Ok(list) => list.into_iter().map(|o| (o.handle, o.hints)).collect(),
            Err(e) => {
                warn!("Ignoring unreadable {}: {e}", state_path.display());
                BTreeMap::new()
            }
        };
        Self {
            state_path,
            open,
            watched: Arc::new(Mutex::new(HashSet::new())),
            events,
            forwarding,
        }
    }

    fn show(&mut self, spec: &NotificationSpec, replaces: Option<NotificationHandle>) -> Result<NotificationHandle> {
        let mut n = build(spec, self.forwarding);
        let has_buttons = !n.actions.is_empty();
        if let Some(h) = replaces {
            n.id(h.0);
        }
        let shown = n.show()?;
        let handle = NotificationHandle(shown.id());

        if spec.transient {
            self.open.remove(&handle);
        } else {
            self.open.insert(handle, spec.hints.clone());
        }
        self.persist();

        if has_buttons {
            self.watch(shown);
        }
        Ok(handle)
    }

    /// Forward the action (or the close) of one notification as an event.
    fn watch(&self, shown: notify_rust::NotificationHandle) {
        let id = shown.id();
        {
            let Ok(mut watched) = self.watched.lock() else {
                return;
            };
            // a replaced notification keeps its id and its waiter
            if !watched.insert(id) {
                return;
            }
        }

        let watched = Arc::clone(&self.watched);
        let events = self.events.clone();
        std::thread::spawn(move || {
            shown.wait_for_action(|action| {
                let handle = NotificationHandle(id);
                let event = if action == CLOSED_ACTION {
                    Event::NotificationClosed {
                        handle,
                        reason: CloseReason::Closed,
                    }
                } else {
                    Event::ActionInvoked {
                        handle,
                        action: action.to_string(),
                    }
                };
                let _ = events.send(event);
            });
            if let Ok(mut w) = watched.lock() {
                w.remove(&id);
            }
        });
    }

    fn persist(&self) {
        let list: Vec<OpenNotification> = self
            .open
            .iter()
            .map(|(handle, hints)| OpenNotification {
                handle: *handle,
                hints: hints.clone(),
            })
            .collect();
        if let Err(e) = save_open(&self.state_path, &list) {
            warn!("Could not save open notifications: {e}");
        }
    }
}

impl NotificationSink for DesktopSink {
    fn publish(&mut self, spec: &NotificationSpec) -> Result<NotificationHandle> {
        self.show(spec, spec.replaces)
    }

    fn replace(&mut self, handle: NotificationHandle, spec: &NotificationSpec) -> Result<()> {
        self.show(spec, Some(handle))?;
        Ok(())
    }

    fn close(&mut self, handle: NotificationHandle) -> Result<()> {
        self.open.remove(&handle);
        self.persist();

        // Handles from an earlier run are gone; taking the id over with a
        // blank notification and closing that works for both cases.
        let mut n = Notification::new();
        n.id(handle.0).summary("").hint(Hint::Transient(true));
        n.show()?.close();
        Ok(())
    }

    fn open_notifications(&self) -> Vec<OpenNotification> {
        self.open
            .iter()
            .map(|(handle, hints)| OpenNotification {
                handle: *handle,
                hints: hints.clone(),
            })
            .collect()
    }
}

/// Map a spec onto a desktop notification. Desktop servers have no
/// preview banner, so previews stand in for an empty summary/body.
/// Buttons that need an outside program are left off unless `forwarding`.
fn build(spec: &NotificationSpec, forwarding: bool) -> Notification {
    let summary = if spec.summary.is_empty() {
        &spec.preview_summary
    } else {
        &spec.summary
    };
    let body = if spec.body.is_empty() {
        &spec.preview_body
    } else {
        &spec.body
    };

    let mut n = Notification::new();
    n.appname(&spec.app_name)
        .icon(&spec.app_icon)
        .summary(summary)
        .body(body)
        .hint(Hint::Category("email".to_string()));

    if spec.transient {
        n.hint(Hint::Transient(true));
    } else {
        n.timeout(Timeout::Never);
    }
    for (key, value) in &spec.hints {
        n.hint(Hint::Custom(key.clone(), value.clone()));
    }
    if let Some(ts) = spec.timestamp {
        n.hint(Hint::Custom("x-mail.timestamp".to_string(), ts.to_rfc3339()));
    }
    for action in spec
        .actions
        .iter()
        .filter(|a| forwarding || a.method.is_empty())
    {
        let label = if action.label.is_empty() { "Open" } else { &action.label };
        n.action(&action.name, label);
    }
    n
}
