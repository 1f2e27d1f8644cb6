use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::account::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of request a background action is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Transmit,
    RetrieveFolderList,
    RetrieveMessageList,
    RetrieveMessages,
    RetrieveMessageRange,
    RetrieveAll,
    Synchronize,
    RetrieveNewMessages,
    ExportUpdates,
    FlagMessages,
    RetrieveMessagePart,
    Search,
    Other,
}

impl RequestKind {
    /// Long-running sync work worth reporting. Small bookkeeping actions and
    /// the ones that only run while the client UI is open are ignored.
    pub fn is_notification_relevant(self) -> bool {
        matches!(
            self,
            RequestKind::Transmit
                | RequestKind::RetrieveFolderList
                | RequestKind::RetrieveMessageList
                | RequestKind::RetrieveMessages
                | RequestKind::RetrieveMessageRange
                | RequestKind::RetrieveAll
                | RequestKind::Synchronize
                | RequestKind::RetrieveNewMessages
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Pending,
    InProgress,
    Successful,
    Failed,
}

/// One entry of a full action-set snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub id: ActionId,
    pub kind: RequestKind,
    pub activity: Activity,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// `(value, total)` as last reported by the action.
    #[serde(default)]
    pub progress: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Successful,
    Failed,
}

/// Raised once per action when it reaches a terminal activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    pub id: ActionId,
    pub kind: RequestKind,
    pub account_id: Option<AccountId>,
    pub result: ActionResult,
}

impl ActionOutcome {
    /// Account a transmit outcome belongs to, if this is one that can be acted on.
    pub fn transmit_account(&self) -> Option<AccountId> {
        if self.kind != RequestKind::Transmit {
            return None;
        }
        self.account_id.filter(|a| a.is_valid())
    }
}
