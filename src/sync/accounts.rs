use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::domain::account::{Account, AccountId, FolderId};
use crate::store::repo::MailStore;

/// Cache of the accounts that may raise notifications, kept current by
/// enable/remove events.
#[derive(Debug, Default)]
pub struct AccountDirectory {
    accounts: HashMap<AccountId, Account>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the cache from every enabled account the store knows.
    pub fn load(&mut self, store: &dyn MailStore) {
        self.accounts.clear();
        let ids = match store.enabled_accounts() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list enabled accounts: {e}");
                return;
            }
        };
        for id in ids {
            self.on_account_enabled(store, id);
        }
    }

    /// Enabling and re-checking are the same thing: the account is cached
    /// if it qualifies and dropped otherwise.
    pub fn on_account_enabled(&mut self, store: &dyn MailStore, id: AccountId) {
        match store.account(id) {
            Ok(Some(account)) if account.is_notifiable() => {
                debug!("Caching account {id} ({})", account.name);
                self.accounts.insert(id, account);
            }
            Ok(_) => self.on_account_removed(id),
            Err(e) => {
                warn!("Could not fetch account {id}: {e}");
                self.on_account_removed(id);
            }
        }
    }

    pub fn on_account_removed(&mut self, id: AccountId) {
        if self.accounts.remove(&id).is_some() {
            debug!("Dropped account {id} from cache");
        }
    }

    pub fn is_notifiable_account(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    /// `(name, icon)` for display. Unknown accounts are looked up once
    /// without caching; failures yield empty strings.
    pub fn metadata(&self, store: &dyn MailStore, id: AccountId) -> (String, String) {
        if let Some(a) = self.accounts.get(&id) {
            return (a.name.clone(), a.icon.clone());
        }
        match store.account(id) {
            Ok(Some(a)) => (a.name, a.icon),
            Ok(None) => {
                warn!("Metadata requested for unknown account {id}");
                (String::new(), String::new())
            }
            Err(e) => {
                warn!("Could not fetch metadata for account {id}: {e}");
                (String::new(), String::new())
            }
        }
    }

    /// Folders the account syncs, read fresh from the store. Empty for
    /// accounts that may not notify.
    pub fn folders_to_sync(&self, store: &dyn MailStore, id: AccountId) -> HashSet<FolderId> {
        if !self.is_notifiable_account(id) {
            debug!("Account {id} is not a notifiable mail account");
            return HashSet::new();
        }
        match store.folders_to_sync(id) {
            Ok(folders) => folders,
            Err(e) => {
                warn!("Could not read folders to sync for account {id}: {e}");
                HashSet::new()
            }
        }
    }
}
