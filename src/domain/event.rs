use serde::{Deserialize, Serialize};

use crate::domain::account::AccountId;
use crate::domain::action::ActionSnapshot;
use crate::domain::message::MessageId;
use crate::domain::notification::{CloseReason, NotificationHandle};

/// Everything the engine reacts to, delivered one at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    MessagesAdded { ids: Vec<MessageId> },
    MessagesUpdated { ids: Vec<MessageId> },
    MessagesRemoved { ids: Vec<MessageId> },
    /// Full current set of background actions.
    ActionsChanged { actions: Vec<ActionSnapshot> },
    AccountEnabled { account: AccountId },
    AccountRemoved { account: AccountId },
    ForegroundEntered,
    ForegroundExited,
    CombinedInboxDisplayed,
    AccountInboxDisplayed { account: AccountId },
    NotificationClosed {
        handle: NotificationHandle,
        reason: CloseReason,
    },
    ActionInvoked {
        handle: NotificationHandle,
        action: String,
    },
}
