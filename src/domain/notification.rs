use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque id returned by the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(pub u32);

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub const HINT_MESSAGE_ID: &str = "x-mail.published-message-id";
pub const HINT_SEND_FAILED_ACCOUNT: &str = "x-mail.send-failed-account-id";
pub const HINT_FEEDBACK: &str = "x-mail.feedback";

/// Action a notification offers; invoking it calls `method` on the mail UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAction {
    pub name: String,
    pub label: String,
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<u64>,
}

impl RemoteAction {
    pub fn new(name: &str, label: &str, method: &str, arguments: Vec<u64>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            method: method.to_string(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub app_name: String,
    pub app_icon: String,
    pub summary: String,
    pub body: String,
    pub preview_summary: String,
    pub preview_body: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub hints: BTreeMap<String, String>,
    pub actions: Vec<RemoteAction>,
    pub transient: bool,
    pub replaces: Option<NotificationHandle>,
}

impl NotificationSpec {
    pub fn hint(&self, key: &str) -> Option<&str> {
        self.hints.get(key).map(String::as_str)
    }

    pub fn set_hint(&mut self, key: &str, value: impl Into<String>) {
        self.hints.insert(key.to_string(), value.into());
    }

    pub fn action(&self, name: &str) -> Option<&RemoteAction> {
        self.actions.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Expired,
    Dismissed,
    Closed,
    Undefined,
}

/// A notification the sink still has on screen, with the hints it was
/// published with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenNotification {
    pub handle: NotificationHandle,
    pub hints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Finished,
    Interrupted,
}

/// Non-zero id of a transfer-progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub u32);
