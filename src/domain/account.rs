use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Mail account identifier. Zero is never handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub icon: String,
    pub enabled: bool,
    /// Number of enabled mail-capable services on this account.
    pub mail_services: u32,
    pub folders_to_sync: HashSet<FolderId>,
}

impl Account {
    /// Only enabled accounts with exactly one enabled mail service notify.
    pub fn is_notifiable(&self) -> bool {
        self.enabled && self.mail_services == 1
    }
}
