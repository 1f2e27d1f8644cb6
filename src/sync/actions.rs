use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::domain::account::AccountId;
use crate::domain::action::{
    ActionId, ActionOutcome, ActionResult, ActionSnapshot, Activity, RequestKind,
};
use crate::domain::notification::{TransferId, TransferOutcome};
use crate::store::repo::MailStore;
use crate::sync::accounts::AccountDirectory;
use crate::sync::sink::TransferProgressSink;

pub const SYNC_FAILED_TEXT: &str = "Email sync failed";

#[derive(Debug)]
struct RunningAction {
    kind: RequestKind,
    activity: Activity,
    account_id: Option<AccountId>,
    /// Last fraction forwarded (or that would have been).
    progress: f64,
    transfer: Option<TransferId>,
    transfer_requested: bool,
}

impl RunningAction {
    fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            activity: Activity::Pending,
            account_id: None,
            progress: 0.0,
            transfer: None,
            transfer_requested: false,
        }
    }

    fn account_changed(
        &mut self,
        id: ActionId,
        account_id: Option<AccountId>,
        store: &dyn MailStore,
        accounts: &AccountDirectory,
        sink: &mut dyn TransferProgressSink,
    ) {
        self.account_id = account_id;
        match account_id.filter(|a| a.is_valid()) {
            None => debug!(
                "Action {id} lost its account (removed or disabled while in progress), nothing to report"
            ),
            Some(account) if !self.transfer_requested => {
                self.transfer_requested = true;
                let (name, icon) = accounts.metadata(store, account);
                self.transfer = sink.create_event(&name, &icon);
                if self.transfer.is_none() {
                    warn!("Failed to create sync event for action {id}, progress will not be shown");
                }
            }
            Some(_) => debug!("Action {id} already has a transfer event"),
        }
    }

    fn progress_changed(&mut self, value: u32, total: u32, step: f64, sink: &mut dyn TransferProgressSink) {
        if total == 0 {
            return;
        }
        let fraction = (value as f64 / total as f64).clamp(0.0, 1.0);
        let complete = fraction >= 1.0 && self.progress < 1.0;
        if fraction > self.progress + step || complete {
            self.progress = fraction;
            if let Some(t) = self.transfer {
                sink.update_progress(t, fraction);
            }
        }
    }

    fn finish_transfer(&mut self, outcome: TransferOutcome, sink: &mut dyn TransferProgressSink) {
        if let Some(t) = self.transfer.take() {
            let error = match outcome {
                TransferOutcome::Interrupted => Some(SYNC_FAILED_TEXT),
                TransferOutcome::Finished => None,
            };
            sink.finish(t, outcome, error);
        }
    }
}

/// Follows the background actions of the mail store through full
/// snapshots and tells when a batch of them has settled.
#[derive(Debug)]
pub struct ActionTracker {
    quiet_window: Duration,
    progress_step: f64,
    running: HashMap<ActionId, RunningAction>,
    /// Already reported; cleared on settle.
    completed: HashSet<ActionId>,
    settle_deadline: Option<Instant>,
}

impl ActionTracker {
    pub fn new(quiet_window: Duration, progress_step: f64) -> Self {
        Self {
            quiet_window,
            progress_step,
            running: HashMap::new(),
            completed: HashSet::new(),
            settle_deadline: None,
        }
    }

    pub fn has_running_action(&self) -> bool {
        !self.running.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.settle_deadline
    }

    /// Diff a full snapshot against what is tracked. Returns one outcome per
    /// action that reached a terminal activity in this snapshot.
    pub fn on_snapshot(
        &mut self,
        actions: &[ActionSnapshot],
        now: Instant,
        store: &dyn MailStore,
        accounts: &AccountDirectory,
        sink: &mut dyn TransferProgressSink,
    ) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::new();
        let mut seen = HashSet::new();
        let mut new_action = false;

        for snap in actions {
            // fast actions are ignored, stale completed ones too
            if !snap.kind.is_notification_relevant() || self.completed.contains(&snap.id) {
                continue;
            }
            seen.insert(snap.id);

            let action = self.running.entry(snap.id).or_insert_with(|| {
                debug!("Tracking action {} ({:?})", snap.id, snap.kind);
                new_action = true;
                RunningAction::new(snap.kind)
            });

            if snap.account_id != action.account_id {
                action.account_changed(snap.id, snap.account_id, store, accounts, sink);
            }
            if let Some((value, total)) = snap.progress {
                action.progress_changed(value, total, self.progress_step, sink);
            }
            if snap.activity == action.activity {
                continue;
            }
            action.activity = snap.activity;

            let result = match snap.activity {
                Activity::Successful => ActionResult::Successful,
                Activity::Failed => ActionResult::Failed,
                Activity::Pending | Activity::InProgress => continue,
            };
            action.finish_transfer(
                match result {
                    ActionResult::Successful => TransferOutcome::Finished,
                    ActionResult::Failed => TransferOutcome::Interrupted,
                },
                sink,
            );

            let outcome = ActionOutcome {
                id: snap.id,
                kind: action.kind,
                account_id: action.account_id,
                result,
            };
            self.running.remove(&snap.id);
            self.completed.insert(snap.id);

            if outcome.kind == RequestKind::Transmit && outcome.transmit_account().is_none() {
                warn!(
                    "Transmit action {} ended {:?} without a valid account, outcome dropped",
                    outcome.id, outcome.result
                );
                continue;
            }
            outcomes.push(outcome);
        }

        // Whatever is gone from a full snapshot is no longer running.
        let vanished: Vec<ActionId> = self
            .running
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();
        for id in vanished {
            if let Some(mut action) = self.running.remove(&id) {
                debug!("Action {id} disappeared without reporting an outcome");
                action.finish_transfer(TransferOutcome::Interrupted, sink);
            }
        }

        if new_action {
            self.settle_deadline = None;
        }
        // Armed whenever nothing is left running, also when the snapshot
        // only listed already completed actions.
        if self.running.is_empty() {
            // Multi-account syncs start the next wave only after the
            // previous one is done, so wait before calling it settled.
            self.settle_deadline = Some(now + self.quiet_window);
        }

        outcomes
    }

    /// Arm the quiet window for store changes made while nothing runs.
    pub fn request_settle(&mut self, now: Instant) {
        if self.running.is_empty() {
            self.settle_deadline = Some(now + self.quiet_window);
        }
    }

    /// True once when the quiet window elapsed with nothing running.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.settle_deadline {
            Some(deadline) if now >= deadline => {
                self.settle_deadline = None;
                if self.running.is_empty() {
                    self.completed.clear();
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    /// Drop everything tracked for an account that went away.
    pub fn purge_account(&mut self, account: AccountId, now: Instant, sink: &mut dyn TransferProgressSink) {
        let ids: Vec<ActionId> = self
            .running
            .iter()
            .filter(|(_, a)| a.account_id == Some(account))
            .map(|(id, _)| *id)
            .collect();
        if ids.is_empty() {
            return;
        }
        for id in ids {
            if let Some(mut action) = self.running.remove(&id) {
                action.finish_transfer(TransferOutcome::Interrupted, sink);
            }
        }
        debug!("Purged running actions of account {account}");
        if self.running.is_empty() {
            self.settle_deadline = Some(now + self.quiet_window);
        }
    }
}
