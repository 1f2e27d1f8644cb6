use anyhow::Result;
use std::collections::HashSet;

use crate::domain::account::{Account, AccountId, FolderId};
use crate::domain::message::{MessageId, MessageSnapshot};

/// Read side of the mailbox storage the notifier observes.
pub trait MailStore {
    /// Accounts that are enabled and carry email.
    fn enabled_accounts(&self) -> Result<HashSet<AccountId>>;
    fn account(&self, id: AccountId) -> Result<Option<Account>>;
    fn folders_to_sync(&self, id: AccountId) -> Result<HashSet<FolderId>>;
    fn snapshot(&self, id: MessageId) -> Result<Option<MessageSnapshot>>;

    /// Messages still queued in the account's outbox, trash excluded.
    fn count_queued_outbox(&self, id: AccountId) -> Result<usize>;

    fn mark_as_read(&self, id: MessageId) -> Result<()>;
}
