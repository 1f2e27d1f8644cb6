use log::{debug, info};
use std::time::Instant;

use crate::config::Settings;
use crate::domain::account::AccountId;
use crate::domain::action::{ActionOutcome, ActionResult};
use crate::domain::event::Event;
use crate::store::repo::MailStore;
use crate::sync::accounts::AccountDirectory;
use crate::sync::actions::ActionTracker;
use crate::sync::coordinator::{CoordinatorSettings, NotificationCoordinator};
use crate::sync::messages::MessageStateTracker;
use crate::sync::sink::{NotificationSink, RemoteActionTarget, TransferProgressSink};

/// Wires the four components to their collaborators and feeds them events
/// one at a time.
pub struct Engine<S, N, P, T> {
    store: S,
    sink: N,
    progress: P,
    target: T,
    accounts: AccountDirectory,
    actions: ActionTracker,
    messages: MessageStateTracker,
    coordinator: NotificationCoordinator,
}

impl<S, N, P, T> Engine<S, N, P, T>
where
    S: MailStore,
    N: NotificationSink,
    P: TransferProgressSink,
    T: RemoteActionTarget,
{
    pub fn new(store: S, sink: N, progress: P, target: T, settings: &Settings) -> Self {
        Self {
            store,
            sink,
            progress,
            target,
            accounts: AccountDirectory::new(),
            actions: ActionTracker::new(settings.quiet_window, settings.progress_step),
            messages: MessageStateTracker::new(),
            coordinator: NotificationCoordinator::new(CoordinatorSettings {
                max_per_account: settings.max_per_account,
                app_name: settings.app_name.clone(),
                app_icon: settings.app_icon.clone(),
            }),
        }
    }

    /// Full rescan on startup.
    pub fn reload(&mut self) {
        self.accounts.load(&self.store);
        self.coordinator
            .reload(&mut self.messages, &self.accounts, &self.store, &mut self.sink);
    }

    pub fn dispatch(&mut self, event: Event, now: Instant) {
        debug!("Dispatching {event:?}");
        match event {
            Event::MessagesAdded { ids } => {
                self.messages.on_added(&ids, &self.store, &self.accounts);
                // local changes with no sync running still need a settle
                self.actions.request_settle(now);
            }
            Event::MessagesUpdated { ids } => {
                let dropped = self.messages.on_updated(&ids, &self.store, &self.accounts);
                self.coordinator.on_messages_dropped(&dropped, &mut self.sink);
            }
            Event::MessagesRemoved { ids } => {
                let dropped = self.messages.on_removed(&ids);
                self.coordinator.on_messages_dropped(&dropped, &mut self.sink);
            }
            Event::ActionsChanged { actions } => {
                let outcomes = self.actions.on_snapshot(
                    &actions,
                    now,
                    &self.store,
                    &self.accounts,
                    &mut self.progress,
                );
                for outcome in outcomes {
                    self.on_outcome(outcome);
                }
            }
            Event::AccountEnabled { account } => {
                self.accounts.on_account_enabled(&self.store, account);
                if !self.accounts.is_notifiable_account(account) {
                    self.purge_account(account, now);
                }
            }
            Event::AccountRemoved { account } => {
                self.accounts.on_account_removed(account);
                self.purge_account(account, now);
            }
            Event::ForegroundEntered => self.coordinator.foreground_entered(),
            Event::ForegroundExited => self.coordinator.foreground_exited(),
            Event::CombinedInboxDisplayed => self
                .coordinator
                .combined_inbox_displayed(&mut self.messages, &mut self.sink),
            Event::AccountInboxDisplayed { account } => {
                if account.is_valid() {
                    self.coordinator
                        .account_inbox_displayed(account, &mut self.sink);
                }
            }
            Event::NotificationClosed { handle, reason } => {
                self.coordinator.on_closed(handle, reason)
            }
            Event::ActionInvoked { handle, action } => self.coordinator.on_action_invoked(
                handle,
                &action,
                &mut self.messages,
                &self.store,
                &mut self.sink,
                &mut self.target,
            ),
        }
    }

    fn on_outcome(&mut self, outcome: ActionOutcome) {
        let Some(account) = outcome.transmit_account() else {
            return;
        };
        match outcome.result {
            ActionResult::Successful => self.coordinator.transmit_completed(account, &mut self.sink),
            ActionResult::Failed => self.coordinator.transmit_failed(
                account,
                &self.accounts,
                &self.store,
                &mut self.sink,
            ),
        }
    }

    fn purge_account(&mut self, account: AccountId, now: Instant) {
        info!("Account {account} gone, dropping its state");
        self.actions.purge_account(account, now, &mut self.progress);
        let dropped = self.messages.purge_account(account);
        self.coordinator
            .purge_account(account, &dropped, &mut self.sink);
    }

    /// Fire the quiet-window timer if due. Returns true when a batch settled.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.actions.poll(now) {
            return false;
        }
        debug!("Action batch settled");
        self.coordinator.on_settle(
            &mut self.messages,
            &self.accounts,
            &self.store,
            &mut self.sink,
        );
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.actions.next_deadline()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut N {
        &mut self.sink
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn messages(&self) -> &MessageStateTracker {
        &self.messages
    }

    pub fn coordinator(&self) -> &NotificationCoordinator {
        &self.coordinator
    }

    pub fn actions(&self) -> &ActionTracker {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::{ActionId, ActionSnapshot, Activity, RequestKind};
    use crate::domain::message::{MessageId, StatusFlags};
    use crate::domain::notification::{
        CloseReason, HINT_MESSAGE_ID, HINT_SEND_FAILED_ACCOUNT, NotificationSpec,
    };
    use crate::sync::coordinator::MARK_AS_READ_ACTION;
    use crate::sync::testing::{
        FakeStore, RecordingProgress, RecordingSink, RecordingTarget, SinkOp,
    };
    use std::time::Duration;

    struct Harness {
        engine: Engine<FakeStore, RecordingSink, RecordingProgress, RecordingTarget>,
        start: Instant,
        clock: u64,
    }

    impl Harness {
        fn new(store: FakeStore) -> Self {
            Self::with_sink(store, RecordingSink::new())
        }

        fn with_sink(store: FakeStore, sink: RecordingSink) -> Self {
            let mut engine = Engine::new(
                store,
                sink,
                RecordingProgress::new(),
                RecordingTarget::new(),
                &Settings::default(),
            );
            engine.reload();
            Self {
                engine,
                start: Instant::now(),
                clock: 0,
            }
        }

        fn send(&mut self, event: Event) {
            self.clock += 10;
            let now = self.start + Duration::from_millis(self.clock);
            self.engine.dispatch(event, now);
        }

        fn actions(&mut self, actions: Vec<ActionSnapshot>) {
            self.send(Event::ActionsChanged { actions });
        }

        fn add(&mut self, ids: &[MessageId]) {
            self.send(Event::MessagesAdded { ids: ids.to_vec() });
        }

        /// Run a sync wave around whatever `f` does and let it settle.
        fn sync_batch(&mut self, f: impl FnOnce(&mut Self)) -> bool {
            self.actions(vec![sync(100 + self.clock, Activity::InProgress)]);
            f(self);
            self.actions(vec![]);
            self.wait(1000)
        }

        fn wait(&mut self, ms: u64) -> bool {
            self.clock += ms;
            let now = self.start + Duration::from_millis(self.clock);
            self.engine.tick(now)
        }

        fn sink(&self) -> &RecordingSink {
            self.engine.sink()
        }

        fn transient(&self) -> Vec<&NotificationSpec> {
            self.sink()
                .published()
                .into_iter()
                .filter(|s| s.transient)
                .collect()
        }
    }

    fn sync(id: u64, activity: Activity) -> ActionSnapshot {
        ActionSnapshot {
            id: ActionId(id),
            kind: RequestKind::Synchronize,
            activity,
            account_id: Some(AccountId(1)),
            progress: None,
        }
    }

    fn transmit(id: u64, activity: Activity, account: u64) -> ActionSnapshot {
        ActionSnapshot {
            id: ActionId(id),
            kind: RequestKind::Transmit,
            activity,
            account_id: Some(AccountId(account)),
            progress: None,
        }
    }

    fn two_accounts() -> FakeStore {
        let mut store = FakeStore::new();
        store.add_account(1, "Work", &[1]);
        store.add_account(2, "Home", &[1]);
        store
    }

    fn message_hint(spec: &NotificationSpec) -> Option<&str> {
        spec.hint(HINT_MESSAGE_ID)
    }

    #[test]
    fn cap_keeps_newest_twenty_and_summarises_account() {
        let mut store = two_accounts();
        let ids: Vec<MessageId> = (1..=25).map(|i| store.add_message(i, 1, i as i64)).collect();
        let mut h = Harness::new(store);

        assert!(h.sync_batch(|h| h.add(&ids)));

        let published = h.engine.messages().current_published();
        assert_eq!(published.len(), 20);
        for old in 1..=5 {
            assert!(!published.contains_key(&MessageId(old)));
        }
        assert_eq!(h.sink().persistent_open().len(), 20);
        assert_eq!(h.engine.coordinator().open_message_count(), 20);

        let transient = h.transient();
        assert_eq!(transient.len(), 1);
        assert_eq!(transient[0].preview_summary, "You have 20 new emails");
        let default = transient[0].action("default").unwrap();
        assert_eq!(default.method, "openInbox");
        assert_eq!(default.arguments, vec![1]);
        assert_eq!(transient[0].app_icon, "icon-1");
        assert!(h.engine.messages().new_since_settle().is_empty());
    }

    #[test]
    fn cap_holds_across_batches() {
        let mut store = two_accounts();
        let first: Vec<MessageId> = (1..=15).map(|i| store.add_message(i, 1, i as i64)).collect();
        let second: Vec<MessageId> = (16..=30).map(|i| store.add_message(i, 1, i as i64)).collect();
        let mut h = Harness::new(store);

        h.sync_batch(|h| h.add(&first));
        h.sync_batch(|h| h.add(&second));

        assert_eq!(h.sink().persistent_open().len(), 20);
        // the ten oldest from the first batch were closed, not just hidden
        assert_eq!(h.sink().closed().len(), 10);
        let open_ids: Vec<String> = h
            .sink()
            .persistent_open()
            .iter()
            .filter_map(|s| message_hint(s).map(str::to_string))
            .collect();
        assert!(!open_ids.contains(&"10".to_string()));
        assert!(open_ids.contains(&"11".to_string()));
    }

    #[test]
    fn same_message_never_gets_two_handles() {
        let mut store = two_accounts();
        let id = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);

        h.sync_batch(|h| {
            h.add(&[id]);
            h.send(Event::MessagesUpdated { ids: vec![id] });
            h.add(&[id]);
        });
        h.sync_batch(|h| h.add(&[id]));

        let with_hint = h
            .sink()
            .published()
            .into_iter()
            .filter(|s| message_hint(s) == Some("1"))
            .count();
        assert_eq!(with_hint, 1);
        assert_eq!(h.sink().persistent_open().len(), 1);
    }

    #[test]
    fn removed_before_settle_is_never_published() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 1, 1);
        let mut h = Harness::new(store);

        h.sync_batch(|h| {
            h.add(&[a, b]);
            h.send(Event::MessagesRemoved { ids: vec![a] });
        });

        assert!(h.sink().published().iter().all(|s| message_hint(s) != Some("1")));
        // the single remaining message gets an individual alert
        let transient = h.transient();
        assert_eq!(transient.len(), 1);
        assert_eq!(transient[0].preview_body, "Subject 2");
    }

    #[test]
    fn removal_closes_immediately() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a]));
        let handle = h.engine.coordinator().handle_for(a).unwrap();

        h.send(Event::MessagesRemoved { ids: vec![a] });
        assert_eq!(h.sink().closed(), vec![handle]);
        assert_eq!(h.engine.coordinator().handle_for(a), None);
    }

    #[test]
    fn marked_read_elsewhere_closes_notification() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a]));

        h.engine.store_mut().message_mut(1).status = StatusFlags::READ;
        h.send(Event::MessagesUpdated { ids: vec![a] });

        assert!(h.sink().persistent_open().is_empty());
        assert!(h.engine.messages().current_published().is_empty());
    }

    #[test]
    fn only_one_settle_per_wave() {
        let mut h = Harness::new(two_accounts());
        h.actions(vec![sync(1, Activity::InProgress), sync(2, Activity::InProgress)]);
        h.actions(vec![sync(2, Activity::InProgress)]);
        h.actions(vec![]);
        h.actions(vec![]);

        // measured from the last empty snapshot at t=40ms
        assert!(!h.wait(990));
        assert!(h.wait(10));
        assert!(!h.wait(2000));
    }

    #[test]
    fn multi_recipient_message_offers_reply_all() {
        let mut store = two_accounts();
        let id = store.add_message(1, 1, 0);
        store.message_mut(1).recipient_count = 2;
        let mut h = Harness::new(store);

        h.sync_batch(|h| h.add(&[id]));

        let open = h.sink().persistent_open();
        assert_eq!(open.len(), 1);
        assert!(open[0].action("replyAll").is_some());
        assert!(open[0].action("reply").is_none());
        assert_eq!(open[0].summary, "Sender 1");
        assert_eq!(open[0].body, "Subject 1");
        assert_eq!(open[0].app_name, "Work");

        let alert = &h.transient()[0];
        assert!(alert.action("replyAll").is_some());
        assert_eq!(alert.app_icon, "icon-1");
        assert_eq!(alert.preview_summary, "Sender 1");
    }

    #[test]
    fn single_recipient_message_offers_reply() {
        let mut store = two_accounts();
        let id = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[id]));

        let open = h.sink().persistent_open();
        assert_eq!(open[0].action("reply").unwrap().method, "replyToMessage");
        assert_eq!(open[0].action("default").unwrap().method, "openMessage");
        assert!(open[0].action(MARK_AS_READ_ACTION).is_some());
    }

    #[test]
    fn new_mail_across_accounts_opens_combined_inbox() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 2, 1);
        let mut h = Harness::new(store);

        h.sync_batch(|h| h.add(&[a, b]));

        let transient = h.transient();
        assert_eq!(transient.len(), 1);
        assert_eq!(transient[0].action("default").unwrap().method, "openCombinedInbox");
    }

    #[test]
    fn on_screen_only_beeps() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 1, 1);
        let mut h = Harness::new(store);
        h.send(Event::ForegroundEntered);

        h.sync_batch(|h| h.add(&[a, b]));

        let transient = h.transient();
        assert_eq!(transient.len(), 1);
        assert!(transient[0].actions.is_empty());
        assert!(transient[0].preview_summary.is_empty());
        assert_eq!(transient[0].hint(crate::domain::notification::HINT_FEEDBACK), Some("email"));

        h.send(Event::ForegroundExited);
        assert!(!h.engine.coordinator().app_on_screen());
    }

    #[test]
    fn settle_without_changes_publishes_nothing() {
        let mut h = Harness::new(two_accounts());
        assert!(h.sync_batch(|_| {}));
        assert!(h.sink().ops.is_empty());
    }

    #[test]
    fn local_add_settles_without_actions() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);

        h.add(&[a]);
        assert!(h.wait(1000));
        assert_eq!(h.sink().persistent_open().len(), 1);
    }

    #[test]
    fn repeated_send_failure_replaces_one_notice() {
        let mut store = two_accounts();
        store.outbox.insert(AccountId(1), 2);
        let mut h = Harness::new(store);

        h.actions(vec![transmit(1, Activity::Failed, 1)]);
        h.actions(vec![transmit(2, Activity::Failed, 1)]);

        let handle = h.engine.coordinator().outbox_failure(AccountId(1)).unwrap();
        assert_eq!(h.sink().open.len(), 1);
        assert!(matches!(h.sink().ops[1], SinkOp::Replace(hd, _) if hd == handle));
        let notice = &h.sink().open[&handle];
        assert_eq!(notice.summary, "Email sending failed");
        assert_eq!(notice.body, "Account Work");
        assert_eq!(notice.hint(HINT_SEND_FAILED_ACCOUNT), Some("1"));
        assert_eq!(notice.action("default").unwrap().method, "openOutbox");

        h.actions(vec![transmit(3, Activity::Successful, 1)]);
        assert!(h.sink().open.is_empty());
        assert_eq!(h.engine.coordinator().outbox_failure(AccountId(1)), None);

        // nothing left to close
        h.actions(vec![transmit(4, Activity::Successful, 1)]);
        assert_eq!(h.sink().closed().len(), 1);
    }

    #[test]
    fn send_failure_with_empty_outbox_is_ignored() {
        let mut h = Harness::new(two_accounts());
        h.actions(vec![transmit(1, Activity::InProgress, 2)]);
        h.actions(vec![transmit(1, Activity::Failed, 2)]);
        assert!(h.sink().ops.is_empty());
    }

    #[test]
    fn account_inbox_closes_only_that_account() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 2, 1);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a, b]));

        h.send(Event::AccountInboxDisplayed {
            account: AccountId(1),
        });

        assert_eq!(h.engine.coordinator().handle_for(a), None);
        assert!(h.engine.coordinator().handle_for(b).is_some());
        // still notifiable, just not shown
        assert!(h.engine.messages().record(a).is_some());
        assert_eq!(h.sink().persistent_open().len(), 1);
    }

    #[test]
    fn combined_inbox_closes_everything() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 2, 1);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a, b]));

        h.send(Event::CombinedInboxDisplayed);
        assert!(h.sink().persistent_open().is_empty());
        assert_eq!(h.engine.coordinator().open_message_count(), 0);
    }

    #[test]
    fn user_dismissal_is_not_republished() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 1, 1);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a]));
        let handle = h.engine.coordinator().handle_for(a).unwrap();

        h.send(Event::NotificationClosed {
            handle,
            reason: CloseReason::Dismissed,
        });
        h.engine.sink_mut().open.remove(&handle);
        h.engine.sink_mut().clear_ops();

        h.sync_batch(|h| h.add(&[b]));
        assert!(h.sink().published().iter().all(|s| message_hint(s) != Some("1")));
        assert!(h.engine.messages().record(a).is_some());
    }

    #[test]
    fn mark_as_read_closes_and_forgets_message() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 1, 1);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a, b]));
        let handle = h.engine.coordinator().handle_for(a).unwrap();

        h.send(Event::ActionInvoked {
            handle,
            action: MARK_AS_READ_ACTION.to_string(),
        });

        assert_eq!(*h.engine.store().marked_read.borrow(), vec![a]);
        assert!(h.engine.messages().record(a).is_none());
        assert_eq!(h.engine.coordinator().handle_for(a), None);
        assert_eq!(h.sink().closed(), vec![handle]);
        assert!(h.engine.coordinator().handle_for(b).is_some());
        assert!(h.engine.target().invoked.is_empty());
    }

    #[test]
    fn mark_as_read_from_alert_closes_both() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a]));
        let persistent = h.engine.coordinator().handle_for(a).unwrap();
        let alert = *h.sink().open.keys().find(|k| **k != persistent).unwrap();

        h.send(Event::ActionInvoked {
            handle: alert,
            action: MARK_AS_READ_ACTION.to_string(),
        });

        assert_eq!(*h.engine.store().marked_read.borrow(), vec![a]);
        assert!(h.sink().open.is_empty());
        assert!(h.engine.messages().current_published().is_empty());
    }

    #[test]
    fn buttons_reach_the_target_with_arguments() {
        let mut store = two_accounts();
        store.outbox.insert(AccountId(2), 1);
        let a = store.add_message(7, 1, 0);
        let b = store.add_message(8, 1, 1);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a, b]));
        h.actions(vec![transmit(50, Activity::Failed, 2)]);

        let message = h.engine.coordinator().handle_for(a).unwrap();
        let failure = h.engine.coordinator().outbox_failure(AccountId(2)).unwrap();
        let summary = h
            .sink()
            .ops
            .iter()
            .find_map(|op| match op {
                SinkOp::Publish(handle, spec) if spec.preview_summary.starts_with("You have") => {
                    Some(*handle)
                }
                _ => None,
            })
            .unwrap();

        for (handle, action) in [
            (message, "default"),
            (message, "reply"),
            (summary, "default"),
            (failure, "default"),
            (message, "noSuchButton"),
        ] {
            h.send(Event::ActionInvoked {
                handle,
                action: action.to_string(),
            });
        }

        assert_eq!(
            h.engine.target().invoked,
            vec![
                ("openMessage".to_string(), vec![7]),
                ("replyToMessage".to_string(), vec![7]),
                ("openInbox".to_string(), vec![1]),
                ("openOutbox".to_string(), vec![2]),
            ]
        );
        assert!(h.engine.store().marked_read.borrow().is_empty());
    }

    #[test]
    fn closed_notification_buttons_do_nothing() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a]));
        let handle = h.engine.coordinator().handle_for(a).unwrap();

        h.send(Event::MessagesRemoved { ids: vec![a] });
        h.send(Event::ActionInvoked {
            handle,
            action: "default".to_string(),
        });
        assert!(h.engine.target().invoked.is_empty());
    }

    #[test]
    fn disabled_account_mail_is_not_published() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 2, 1);
        let mut h = Harness::new(store);

        h.engine
            .store_mut()
            .accounts
            .get_mut(&AccountId(1))
            .unwrap()
            .enabled = false;
        h.send(Event::AccountEnabled {
            account: AccountId(1),
        });
        h.sync_batch(|h| h.add(&[a, b]));

        assert!(h.engine.messages().record(a).is_none());
        assert!(h.engine.messages().record(b).is_some());
        assert_eq!(h.sink().persistent_open().len(), 1);
    }

    #[test]
    fn multi_service_account_mail_is_not_published() {
        let mut store = two_accounts();
        store.accounts.get_mut(&AccountId(2)).unwrap().mail_services = 2;
        let b = store.add_message(2, 2, 1);
        let mut h = Harness::new(store);

        h.sync_batch(|h| h.add(&[b]));
        assert!(h.engine.messages().current_published().is_empty());
        assert!(h.sink().published().is_empty());
    }

    #[test]
    fn removing_account_mid_batch_purges_everything() {
        let mut store = two_accounts();
        store.outbox.insert(AccountId(1), 1);
        let a = store.add_message(1, 1, 0);
        let b = store.add_message(2, 2, 1);
        let c = store.add_message(3, 1, 2);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a, b]));
        h.actions(vec![transmit(50, Activity::Failed, 1)]);

        h.actions(vec![sync(60, Activity::InProgress)]);
        h.add(&[c]);
        h.send(Event::AccountRemoved {
            account: AccountId(1),
        });

        assert!(!h.engine.actions().has_running_action());
        assert!(h.engine.messages().record(a).is_none());
        assert!(h.engine.messages().record(c).is_none());
        assert_eq!(h.engine.coordinator().handle_for(a), None);
        assert_eq!(h.engine.coordinator().outbox_failure(AccountId(1)), None);
        assert_eq!(h.sink().persistent_open().len(), 1);

        h.sink_clear_and_settle();
        assert!(h.sink().ops.is_empty());
    }

    impl Harness {
        fn sink_clear_and_settle(&mut self) {
            self.engine.sink_mut().clear_ops();
            self.wait(1000);
        }
    }

    #[test]
    fn disabling_account_purges_like_removal() {
        let mut store = two_accounts();
        let a = store.add_message(1, 1, 0);
        let mut h = Harness::new(store);
        h.sync_batch(|h| h.add(&[a]));

        h.engine
            .store_mut()
            .accounts
            .get_mut(&AccountId(1))
            .unwrap()
            .enabled = false;
        h.send(Event::AccountEnabled {
            account: AccountId(1),
        });
        assert!(h.sink().persistent_open().is_empty());
    }

    #[test]
    fn reload_keeps_only_valid_notifications() {
        let mut store = two_accounts();
        store.add_message(1, 1, 0);
        store.add_message(2, 1, 1);
        store.message_mut(2).status = StatusFlags::READ;
        store.add_message(3, 2, 2);
        store.accounts.get_mut(&AccountId(2)).unwrap().enabled = false;

        let mut sink = RecordingSink::new();
        let mut preload = |id: &str| {
            let mut spec = NotificationSpec::default();
            spec.set_hint(HINT_MESSAGE_ID, id);
            sink.preload(spec)
        };
        let keep = preload("1");
        let duplicate = preload("1");
        let read = preload("2");
        let disabled = preload("3");
        let missing = preload("99");
        let garbage = preload("abc");
        let summary = sink.preload(NotificationSpec::default());

        let mut h = Harness::with_sink(store, sink);

        assert_eq!(h.engine.coordinator().handle_for(MessageId(1)), Some(keep));
        assert!(h.engine.messages().record(MessageId(1)).is_some());
        assert!(h.engine.messages().new_since_settle().is_empty());
        let mut closed = h.sink().closed();
        closed.sort();
        assert_eq!(closed, vec![duplicate, read, disabled, missing, garbage, summary]);

        // restored entries behave like any other
        h.send(Event::MessagesRemoved {
            ids: vec![MessageId(1)],
        });
        assert!(h.sink().open.is_empty());
    }
}
