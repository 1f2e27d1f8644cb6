//! In-memory collaborators shared by the unit tests.

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::account::{Account, AccountId, FolderId};
use crate::domain::message::{MessageId, MessageSnapshot, MessageType, StatusFlags};
use crate::domain::notification::{
    NotificationHandle, NotificationSpec, OpenNotification, RemoteAction, TransferId,
    TransferOutcome,
};
use crate::store::repo::MailStore;
use crate::sync::sink::{NotificationSink, RemoteActionTarget, TransferProgressSink};

pub const INBOX: u64 = 1;

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

#[derive(Default)]
pub struct FakeStore {
    pub accounts: HashMap<AccountId, Account>,
    pub messages: HashMap<MessageId, MessageSnapshot>,
    pub outbox: HashMap<AccountId, usize>,
    pub marked_read: RefCell<Vec<MessageId>>,
    pub folder_queries: RefCell<usize>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, id: u64, name: &str, folders: &[u64]) {
        self.accounts.insert(
            AccountId(id),
            Account {
                id: AccountId(id),
                name: name.to_string(),
                icon: format!("icon-{id}"),
                enabled: true,
                mail_services: 1,
                folders_to_sync: folders.iter().map(|f| FolderId(*f)).collect(),
            },
        );
    }

    /// Unread mail in the inbox, `minute` minutes after a fixed base time.
    pub fn add_message(&mut self, id: u64, account: u64, minute: i64) -> MessageId {
        self.messages.insert(
            MessageId(id),
            MessageSnapshot {
                id: MessageId(id),
                message_type: MessageType::Email,
                status: StatusFlags::default(),
                folder_id: FolderId(INBOX),
                account_id: AccountId(account),
                from: format!("Sender {id} <Sender{id}@Example.org>"),
                subject: format!("Subject {id}"),
                date: at_minute(minute),
                recipient_count: 1,
            },
        );
        MessageId(id)
    }

    pub fn message_mut(&mut self, id: u64) -> &mut MessageSnapshot {
        self.messages.get_mut(&MessageId(id)).unwrap()
    }
}

impl MailStore for FakeStore {
    fn enabled_accounts(&self) -> Result<HashSet<AccountId>> {
        Ok(self
            .accounts
            .values()
            .filter(|a| a.enabled)
            .map(|a| a.id)
            .collect())
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.get(&id).cloned())
    }

    fn folders_to_sync(&self, id: AccountId) -> Result<HashSet<FolderId>> {
        *self.folder_queries.borrow_mut() += 1;
        self.accounts
            .get(&id)
            .map(|a| a.folders_to_sync.clone())
            .ok_or_else(|| anyhow!("no account {id}"))
    }

    fn snapshot(&self, id: MessageId) -> Result<Option<MessageSnapshot>> {
        Ok(self.messages.get(&id).cloned())
    }

    fn count_queued_outbox(&self, id: AccountId) -> Result<usize> {
        Ok(self.outbox.get(&id).copied().unwrap_or(0))
    }

    fn mark_as_read(&self, id: MessageId) -> Result<()> {
        self.marked_read.borrow_mut().push(id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Publish(NotificationHandle, NotificationSpec),
    Replace(NotificationHandle, NotificationSpec),
    Close(NotificationHandle),
}

#[derive(Default)]
pub struct RecordingSink {
    next: u32,
    pub open: BTreeMap<NotificationHandle, NotificationSpec>,
    pub ops: Vec<SinkOp>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a notification survived from an earlier run.
    pub fn preload(&mut self, spec: NotificationSpec) -> NotificationHandle {
        self.next += 1;
        let handle = NotificationHandle(self.next);
        self.open.insert(handle, spec);
        handle
    }

    pub fn published(&self) -> Vec<&NotificationSpec> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::Publish(_, spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn persistent_open(&self) -> Vec<&NotificationSpec> {
        self.open.values().filter(|s| !s.transient).collect()
    }

    pub fn closed(&self) -> Vec<NotificationHandle> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::Close(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&mut self, spec: &NotificationSpec) -> Result<NotificationHandle> {
        self.next += 1;
        let handle = NotificationHandle(self.next);
        self.open.insert(handle, spec.clone());
        self.ops.push(SinkOp::Publish(handle, spec.clone()));
        Ok(handle)
    }

    fn replace(&mut self, handle: NotificationHandle, spec: &NotificationSpec) -> Result<()> {
        self.open.insert(handle, spec.clone());
        self.ops.push(SinkOp::Replace(handle, spec.clone()));
        Ok(())
    }

    fn close(&mut self, handle: NotificationHandle) -> Result<()> {
        self.open.remove(&handle);
        self.ops.push(SinkOp::Close(handle));
        Ok(())
    }

    fn open_notifications(&self) -> Vec<OpenNotification> {
        self.open
            .iter()
            .map(|(handle, spec)| OpenNotification {
                handle: *handle,
                hints: spec.hints.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressOp {
    Create(TransferId, String),
    Update(TransferId, f64),
    Finish(TransferId, TransferOutcome, Option<String>),
}

#[derive(Default)]
pub struct RecordingProgress {
    next: u32,
    pub refuse: bool,
    pub ops: Vec<ProgressOp>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<f64> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                ProgressOp::Update(_, f) => Some(*f),
                _ => None,
            })
            .collect()
    }
}

impl TransferProgressSink for RecordingProgress {
    fn create_event(&mut self, title: &str, _icon: &str) -> Option<TransferId> {
        if self.refuse {
            return None;
        }
        self.next += 1;
        let id = TransferId(self.next);
        self.ops.push(ProgressOp::Create(id, title.to_string()));
        Some(id)
    }

    fn update_progress(&mut self, id: TransferId, fraction: f64) {
        self.ops.push(ProgressOp::Update(id, fraction));
    }

    fn finish(&mut self, id: TransferId, outcome: TransferOutcome, error: Option<&str>) {
        self.ops
            .push(ProgressOp::Finish(id, outcome, error.map(str::to_string)));
    }
}

/// Remembers the `(method, arguments)` of every forwarded button.
#[derive(Default)]
pub struct RecordingTarget {
    pub invoked: Vec<(String, Vec<u64>)>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteActionTarget for RecordingTarget {
    fn invoke(&mut self, action: &RemoteAction) -> Result<()> {
        self.invoked
            .push((action.method.clone(), action.arguments.clone()));
        Ok(())
    }
}
