use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::domain::account::AccountId;
use crate::domain::message::{MessageId, MessageRecord};
use crate::domain::notification::{
    CloseReason, HINT_FEEDBACK, HINT_MESSAGE_ID, HINT_SEND_FAILED_ACCOUNT, NotificationHandle,
    NotificationSpec, RemoteAction,
};
use crate::store::repo::MailStore;
use crate::sync::accounts::AccountDirectory;
use crate::sync::messages::MessageStateTracker;
use crate::sync::sink::{NotificationSink, RemoteActionTarget};

/// Handled here rather than by the mail UI.
pub const MARK_AS_READ_ACTION: &str = "markAsRead";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Most message notifications open at once for one account.
    pub max_per_account: usize,
    pub app_name: String,
    pub app_icon: String,
}

#[derive(Debug, Clone)]
struct PublishedEntry {
    handle: NotificationHandle,
    record: Rc<MessageRecord>,
}

/// Decides what is published, replaced and closed.
///
/// Every method finishes its own bookkeeping before the sink call that
/// follows it, so a `closed` event for a handle we just closed finds
/// nothing left to do.
#[derive(Debug)]
pub struct NotificationCoordinator {
    settings: CoordinatorSettings,
    entries: HashMap<MessageId, PublishedEntry>,
    outbox_failures: HashMap<AccountId, NotificationHandle>,
    /// Transient single-message alerts, for their mark-as-read action.
    alerts: HashMap<NotificationHandle, MessageId>,
    /// Buttons of every open notification that has any.
    buttons: HashMap<NotificationHandle, Vec<RemoteAction>>,
    app_on_screen: bool,
}

impl NotificationCoordinator {
    pub fn new(settings: CoordinatorSettings) -> Self {
        Self {
            settings,
            entries: HashMap::new(),
            outbox_failures: HashMap::new(),
            alerts: HashMap::new(),
            buttons: HashMap::new(),
            app_on_screen: false,
        }
    }

    pub fn handle_for(&self, id: MessageId) -> Option<NotificationHandle> {
        self.entries.get(&id).map(|e| e.handle)
    }

    pub fn open_message_count(&self) -> usize {
        self.entries.len()
    }

    pub fn outbox_failure(&self, account: AccountId) -> Option<NotificationHandle> {
        self.outbox_failures.get(&account).copied()
    }

    pub fn app_on_screen(&self) -> bool {
        self.app_on_screen
    }

    /// Reconcile after a batch of background actions settled.
    pub fn on_settle(
        &mut self,
        messages: &mut MessageStateTracker,
        accounts: &AccountDirectory,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        if !messages.take_changes() {
            return;
        }

        let evicted = messages.evict_over_cap(self.settings.max_per_account);
        if !evicted.is_empty() {
            info!("Evicted {} notifications over the per-account limit", evicted.len());
        }

        self.close_stale(messages, sink);

        let mut fresh: Vec<Rc<MessageRecord>> = messages
            .new_since_settle()
            .iter()
            .filter_map(|id| messages.record(*id).cloned())
            .collect();
        fresh.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        for record in &fresh {
            self.publish_message(record, accounts, store, sink);
        }

        if !fresh.is_empty() {
            if self.app_on_screen {
                self.feedback_only(sink);
            } else if let [record] = fresh.as_slice() {
                self.single_alert(record, accounts, store, sink);
            } else {
                self.summary(&fresh, accounts, store, sink);
            }
        }

        messages.clear_new_since_settle();
    }

    /// Close notifications of messages that just left the published set.
    pub fn on_messages_dropped(&mut self, ids: &[MessageId], sink: &mut dyn NotificationSink) {
        for id in ids {
            if let Some(entry) = self.entries.remove(id) {
                self.close(sink, entry.handle);
            }
        }
    }

    fn close_stale(&mut self, messages: &MessageStateTracker, sink: &mut dyn NotificationSink) {
        let published = messages.current_published();
        let stale: Vec<MessageId> = self
            .entries
            .keys()
            .filter(|id| !published.contains_key(id))
            .copied()
            .collect();
        self.on_messages_dropped(&stale, sink);
    }

    fn publish_message(
        &mut self,
        record: &Rc<MessageRecord>,
        accounts: &AccountDirectory,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        let mut spec = self.message_spec(record, accounts, store);

        if let Some(entry) = self.entries.get_mut(&record.id) {
            let handle = entry.handle;
            entry.record = Rc::clone(record);
            spec.replaces = Some(handle);
            if let Err(e) = self.replace(sink, handle, &spec) {
                warn!("Could not replace notification {handle} for message {}: {e}", record.id);
            }
            return;
        }

        match self.publish(sink, &spec) {
            Ok(handle) => {
                debug!("Published message {} as {handle}", record.id);
                self.entries.insert(
                    record.id,
                    PublishedEntry {
                        handle,
                        record: Rc::clone(record),
                    },
                );
            }
            Err(e) => warn!("Could not publish notification for message {}: {e}", record.id),
        }
    }

    fn base_spec(&self) -> NotificationSpec {
        NotificationSpec {
            app_name: self.settings.app_name.clone(),
            app_icon: self.settings.app_icon.clone(),
            ..Default::default()
        }
    }

    fn message_spec(
        &self,
        record: &MessageRecord,
        accounts: &AccountDirectory,
        store: &dyn MailStore,
    ) -> NotificationSpec {
        let mut spec = self.base_spec();

        // grouped by the account they arrived on
        let (name, icon) = accounts.metadata(store, record.account_id);
        if !name.is_empty() {
            spec.app_name = name;
        }
        if !icon.is_empty() {
            spec.app_icon = icon;
        }

        spec.set_hint(HINT_FEEDBACK, "email_exists");
        spec.set_hint(HINT_MESSAGE_ID, record.id.0.to_string());
        spec.summary = record.display_sender().to_string();
        spec.body = record.subject.clone();
        spec.timestamp = Some(record.timestamp);
        spec.actions = message_actions(record);
        spec
    }

    /// App is on screen: beep only.
    fn feedback_only(&mut self, sink: &mut dyn NotificationSink) {
        let mut spec = self.base_spec();
        spec.transient = true;
        spec.set_hint(HINT_FEEDBACK, "email");
        if let Err(e) = self.publish(sink, &spec) {
            warn!("Could not publish feedback notification: {e}");
        }
    }

    fn single_alert(
        &mut self,
        record: &MessageRecord,
        accounts: &AccountDirectory,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        let mut spec = self.message_spec(record, accounts, store);
        spec.transient = true;
        spec.set_hint(HINT_FEEDBACK, "email");
        spec.hints.remove(HINT_MESSAGE_ID);
        spec.preview_summary = spec.summary.clone();
        spec.preview_body = spec.body.clone();

        match self.publish(sink, &spec) {
            Ok(handle) => {
                self.alerts.insert(handle, record.id);
            }
            Err(e) => warn!("Could not publish alert for message {}: {e}", record.id),
        }
    }

    fn summary(
        &mut self,
        fresh: &[Rc<MessageRecord>],
        accounts: &AccountDirectory,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        let mut spec = self.base_spec();
        spec.transient = true;
        spec.set_hint(HINT_FEEDBACK, "email");
        spec.preview_summary = format!("You have {} new emails", fresh.len());

        let first = fresh[0].account_id;
        if fresh.iter().all(|r| r.account_id == first) {
            spec.actions = vec![RemoteAction::new("default", "", "openInbox", vec![first.0])];
            let (_, icon) = accounts.metadata(store, first);
            if !icon.is_empty() {
                spec.app_icon = icon;
            }
        } else {
            spec.actions = vec![RemoteAction::new("default", "", "openCombinedInbox", vec![])];
        }

        if let Err(e) = self.publish(sink, &spec) {
            warn!("Could not publish summary notification: {e}");
        }
    }

    pub fn transmit_completed(&mut self, account: AccountId, sink: &mut dyn NotificationSink) {
        if let Some(handle) = self.outbox_failures.remove(&account) {
            debug!("Sending recovered for account {account}, closing failure notice");
            self.close(sink, handle);
        }
    }

    pub fn transmit_failed(
        &mut self,
        account: AccountId,
        accounts: &AccountDirectory,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        // Failures also come from account tests and other store users;
        // only report when something is actually waiting to be sent.
        match store.count_queued_outbox(account) {
            Ok(0) => {
                debug!("Transmit failed for account {account} with an empty outbox, ignoring");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Could not count outbox of account {account}: {e}");
                return;
            }
        }

        let (name, _) = accounts.metadata(store, account);
        let mut spec = self.base_spec();
        spec.set_hint(HINT_SEND_FAILED_ACCOUNT, account.0.to_string());
        spec.summary = "Email sending failed".to_string();
        spec.body = format!("Account {name}");
        spec.actions = vec![RemoteAction::new("default", "", "openOutbox", vec![account.0])];

        if let Some(&handle) = self.outbox_failures.get(&account) {
            spec.replaces = Some(handle);
            if let Err(e) = self.replace(sink, handle, &spec) {
                warn!("Could not replace send failure notice for account {account}: {e}");
            }
            return;
        }

        match self.publish(sink, &spec) {
            Ok(handle) => {
                self.outbox_failures.insert(account, handle);
            }
            Err(e) => warn!("Could not publish send failure notice for account {account}: {e}"),
        }
    }

    pub fn foreground_entered(&mut self) {
        self.app_on_screen = true;
    }

    pub fn foreground_exited(&mut self) {
        self.app_on_screen = false;
    }

    pub fn combined_inbox_displayed(
        &mut self,
        messages: &mut MessageStateTracker,
        sink: &mut dyn NotificationSink,
    ) {
        let handles: Vec<NotificationHandle> = self.entries.drain().map(|(_, e)| e.handle).collect();
        messages.clear_published();
        for handle in handles {
            self.close(sink, handle);
        }
    }

    /// Close that account's message notifications. The messages stay
    /// published, just no longer shown.
    pub fn account_inbox_displayed(&mut self, account: AccountId, sink: &mut dyn NotificationSink) {
        let ids: Vec<MessageId> = self
            .entries
            .values()
            .filter(|e| e.record.account_id == account)
            .map(|e| e.record.id)
            .collect();
        self.on_messages_dropped(&ids, sink);
    }

    pub fn on_closed(&mut self, handle: NotificationHandle, reason: CloseReason) {
        debug!("Notification {handle} closed ({reason:?})");
        self.entries.retain(|_, e| e.handle != handle);
        self.outbox_failures.retain(|_, h| *h != handle);
        self.alerts.remove(&handle);
        self.buttons.remove(&handle);
    }

    /// A notification button was pressed. Mark-as-read is done here; every
    /// other button goes to `target` with its method and arguments.
    pub fn on_action_invoked(
        &mut self,
        handle: NotificationHandle,
        action: &str,
        messages: &mut MessageStateTracker,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
        target: &mut dyn RemoteActionTarget,
    ) {
        if action == MARK_AS_READ_ACTION {
            self.mark_as_read(handle, messages, store, sink);
            return;
        }

        let button = self
            .buttons
            .get(&handle)
            .and_then(|buttons| buttons.iter().find(|b| b.name == action))
            .cloned();
        match button {
            Some(button) if !button.method.is_empty() => {
                debug!("Forwarding {} {:?} from {handle}", button.method, button.arguments);
                if let Err(e) = target.invoke(&button) {
                    warn!("Could not run {} for notification {handle}: {e}", button.method);
                }
            }
            Some(_) => debug!("Action {action:?} on {handle} has nothing to run"),
            None => warn!("Unknown action {action:?} on notification {handle}"),
        }
    }

    fn mark_as_read(
        &mut self,
        handle: NotificationHandle,
        messages: &mut MessageStateTracker,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        let target = self.alerts.get(&handle).copied().or_else(|| {
            self.entries
                .values()
                .find(|e| e.handle == handle)
                .map(|e| e.record.id)
        });
        let Some(id) = target else {
            warn!("Mark as read on unknown notification {handle}");
            return;
        };
        if let Err(e) = store.mark_as_read(id) {
            warn!("Could not mark message {id} as read: {e}");
            return;
        }

        if self.alerts.remove(&handle).is_some() {
            self.close(sink, handle);
        }
        // read mail leaves the published set
        let dropped = messages.on_removed(&[id]);
        self.on_messages_dropped(&dropped, sink);
    }

    /// Account went away: close everything it had open.
    pub fn purge_account(&mut self, account: AccountId, dropped: &[MessageId], sink: &mut dyn NotificationSink) {
        self.on_messages_dropped(dropped, sink);
        self.account_inbox_displayed(account, sink);
        self.transmit_completed(account, sink);
    }

    fn publish(
        &mut self,
        sink: &mut dyn NotificationSink,
        spec: &NotificationSpec,
    ) -> anyhow::Result<NotificationHandle> {
        let handle = sink.publish(spec)?;
        self.remember_buttons(handle, spec);
        Ok(handle)
    }

    fn replace(
        &mut self,
        sink: &mut dyn NotificationSink,
        handle: NotificationHandle,
        spec: &NotificationSpec,
    ) -> anyhow::Result<()> {
        sink.replace(handle, spec)?;
        self.remember_buttons(handle, spec);
        Ok(())
    }

    fn remember_buttons(&mut self, handle: NotificationHandle, spec: &NotificationSpec) {
        if spec.actions.is_empty() {
            self.buttons.remove(&handle);
        } else {
            self.buttons.insert(handle, spec.actions.clone());
        }
    }

    fn close(&mut self, sink: &mut dyn NotificationSink, handle: NotificationHandle) {
        self.buttons.remove(&handle);
        if let Err(e) = sink.close(handle) {
            warn!("Could not close notification {handle}: {e}");
        }
    }

    /// Rebuild from what the sink still shows, closing anything that no
    /// longer belongs to a notifiable message of an enabled account.
    pub fn reload(
        &mut self,
        messages: &mut MessageStateTracker,
        accounts: &AccountDirectory,
        store: &dyn MailStore,
        sink: &mut dyn NotificationSink,
    ) {
        self.entries.clear();
        self.outbox_failures.clear();
        self.alerts.clear();
        self.buttons.clear();
        messages.clear_folder_cache();

        // accounts can be removed while we are not running
        let enabled = match store.enabled_accounts() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list enabled accounts: {e}");
                HashSet::new()
            }
        };

        for open in sink.open_notifications() {
            let message_id = open
                .hints
                .get(HINT_MESSAGE_ID)
                .and_then(|v| v.parse::<u64>().ok())
                .map(MessageId)
                .filter(|id| id.is_valid() && !self.entries.contains_key(id));

            let restored = message_id.and_then(|id| {
                let snapshot = store.snapshot(id).ok().flatten()?;
                if !enabled.contains(&snapshot.account_id)
                    || !messages.is_notifiable(&snapshot, store, accounts)
                {
                    return None;
                }
                Some(messages.restore(MessageRecord::from_snapshot(&snapshot)))
            });

            match restored {
                Some(record) => {
                    self.buttons.insert(open.handle, message_actions(&record));
                    self.entries.insert(
                        record.id,
                        PublishedEntry {
                            handle: open.handle,
                            record,
                        },
                    );
                }
                None => self.close(sink, open.handle),
            }
        }
        info!("Reloaded {} message notifications", self.entries.len());
    }
}

fn message_actions(record: &MessageRecord) -> Vec<RemoteAction> {
    let arg = vec![record.id.0];
    let reply = if record.has_multiple_recipients {
        RemoteAction::new("replyAll", "Reply all", "replyAllToMessage", arg.clone())
    } else {
        RemoteAction::new("reply", "Reply", "replyToMessage", arg.clone())
    };
    vec![
        RemoteAction::new("default", "", "openMessage", arg.clone()),
        reply,
        RemoteAction::new(MARK_AS_READ_ACTION, "Mark as read", "", arg),
    ]
}
