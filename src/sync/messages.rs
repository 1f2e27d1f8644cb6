use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::domain::account::{AccountId, FolderId};
use crate::domain::message::{MessageId, MessageRecord, MessageSnapshot, MessageType, StatusFlags};
use crate::store::repo::MailStore;
use crate::sync::accounts::AccountDirectory;

const SUPPRESSING: StatusFlags = StatusFlags(
    StatusFlags::READ.0
        | StatusFlags::TEMPORARY.0
        | StatusFlags::NO_NOTIFICATION.0
        | StatusFlags::JUNK.0
        | StatusFlags::TRASH.0,
);

/// Authoritative set of messages that currently deserve a notification.
#[derive(Debug, Default)]
pub struct MessageStateTracker {
    published: HashMap<MessageId, Rc<MessageRecord>>,
    new_since_settle: HashSet<MessageId>,
    /// Folder lists per account, valid for one add/update batch.
    folders: HashMap<AccountId, HashSet<FolderId>>,
    changed: bool,
}

impl MessageStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_published(&self) -> &HashMap<MessageId, Rc<MessageRecord>> {
        &self.published
    }

    pub fn new_since_settle(&self) -> &HashSet<MessageId> {
        &self.new_since_settle
    }

    pub fn clear_new_since_settle(&mut self) {
        self.new_since_settle.clear();
    }

    pub fn record(&self, id: MessageId) -> Option<&Rc<MessageRecord>> {
        self.published.get(&id)
    }

    /// Whether anything was published or unpublished since the flag was last taken.
    pub fn take_changes(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn clear_folder_cache(&mut self) {
        self.folders.clear();
    }

    pub fn on_added(&mut self, ids: &[MessageId], store: &dyn MailStore, accounts: &AccountDirectory) {
        // a new batch may have moved messages between folders
        self.clear_folder_cache();

        for &id in ids {
            // some sources add the same message twice
            if self.published.contains_key(&id) {
                continue;
            }
            let Some(snapshot) = fetch(store, id) else {
                continue;
            };
            if self.is_notifiable(&snapshot, store, accounts) {
                debug!("Message {id} is notifiable");
                self.published
                    .insert(id, Rc::new(MessageRecord::from_snapshot(&snapshot)));
                self.new_since_settle.insert(id);
                self.changed = true;
            }
        }
    }

    /// Returns the ids that stopped qualifying.
    pub fn on_updated(
        &mut self,
        ids: &[MessageId],
        store: &dyn MailStore,
        accounts: &AccountDirectory,
    ) -> Vec<MessageId> {
        self.clear_folder_cache();

        let mut dropped = Vec::new();
        for &id in ids {
            if !self.published.contains_key(&id) {
                continue;
            }
            let still = match fetch(store, id) {
                Some(snapshot) => self.is_notifiable(&snapshot, store, accounts),
                None => false,
            };
            if !still {
                debug!("Message {id} no longer notifiable");
                self.unpublish(id);
                dropped.push(id);
            }
        }
        dropped
    }

    /// Returns the ids that were published.
    pub fn on_removed(&mut self, ids: &[MessageId]) -> Vec<MessageId> {
        let mut dropped = Vec::new();
        for &id in ids {
            if self.unpublish(id) {
                dropped.push(id);
            }
            self.new_since_settle.remove(&id);
        }
        dropped
    }

    pub fn is_notifiable(
        &mut self,
        message: &MessageSnapshot,
        store: &dyn MailStore,
        accounts: &AccountDirectory,
    ) -> bool {
        message.message_type == MessageType::Email
            && !message.status.intersects(SUPPRESSING)
            && self.in_folder_to_sync(message, store, accounts)
    }

    fn in_folder_to_sync(
        &mut self,
        message: &MessageSnapshot,
        store: &dyn MailStore,
        accounts: &AccountDirectory,
    ) -> bool {
        self.folders
            .entry(message.account_id)
            .or_insert_with(|| accounts.folders_to_sync(store, message.account_id))
            .contains(&message.folder_id)
    }

    /// Bring back a message that was already notified in an earlier run.
    pub fn restore(&mut self, record: MessageRecord) -> Rc<MessageRecord> {
        let record = Rc::new(record);
        self.published.insert(record.id, Rc::clone(&record));
        record
    }

    fn unpublish(&mut self, id: MessageId) -> bool {
        self.new_since_settle.remove(&id);
        if self.published.remove(&id).is_some() {
            self.changed = true;
            true
        } else {
            false
        }
    }

    /// Trim every account down to `cap` messages, oldest first.
    pub fn evict_over_cap(&mut self, cap: usize) -> Vec<MessageId> {
        let mut by_account: HashMap<AccountId, Vec<&MessageRecord>> = HashMap::new();
        for record in self.published.values() {
            by_account.entry(record.account_id).or_default().push(record);
        }

        let mut evicted = Vec::new();
        for (account, mut records) in by_account {
            if records.len() <= cap {
                continue;
            }
            records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
            let excess = records.len() - cap;
            debug!("Account {account} over the limit, evicting {excess} oldest");
            evicted.extend(records[..excess].iter().map(|r| r.id));
        }

        for id in &evicted {
            self.unpublish(*id);
        }
        evicted
    }

    pub fn purge_account(&mut self, account: AccountId) -> Vec<MessageId> {
        let ids: Vec<MessageId> = self
            .published
            .values()
            .filter(|r| r.account_id == account)
            .map(|r| r.id)
            .collect();
        for id in &ids {
            self.unpublish(*id);
        }
        self.folders.remove(&account);
        ids
    }

    /// Forget everything; the user has seen it all.
    pub fn clear_published(&mut self) {
        if !self.published.is_empty() {
            self.changed = true;
        }
        self.published.clear();
        self.new_since_settle.clear();
    }
}

fn fetch(store: &dyn MailStore, id: MessageId) -> Option<MessageSnapshot> {
    match store.snapshot(id) {
        Ok(Some(s)) => Some(s),
        Ok(None) => {
            warn!("Message {id} not found in store, skipping");
            None
        }
        Err(e) => {
            warn!("Could not read message {id}: {e}");
            None
        }
    }
}
