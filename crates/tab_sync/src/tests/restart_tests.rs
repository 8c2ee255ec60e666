use super::*;
use crate::{
    notifications::ToastQueue,
    push_channel::EventHub,
    status_events::StatusEventSubscriber,
    status_store::StatusStore,
};
use serde_json::json;
use shared::{domain::TabDescriptor, protocol::TAB_STATUS_EVENT};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use tokio::sync::oneshot;

/// Restart command whose result is released by the test.
struct GatedCommand {
    store: Arc<StatusStore>,
    calls: AtomicUsize,
    observed: Mutex<Vec<Option<TabStatus>>>,
    entered: Mutex<Option<oneshot::Sender<()>>>,
    release: tokio::sync::Mutex<Option<oneshot::Receiver<Result<(), RestartError>>>>,
}

impl GatedCommand {
    fn new(
        store: Arc<StatusStore>,
    ) -> (
        Arc<Self>,
        oneshot::Receiver<()>,
        oneshot::Sender<Result<(), RestartError>>,
    ) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let command = Arc::new(Self {
            store,
            calls: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
            entered: Mutex::new(Some(entered_tx)),
            release: tokio::sync::Mutex::new(Some(release_rx)),
        });
        (command, entered_rx, release_tx)
    }
}

#[async_trait]
impl RestartCommand for GatedCommand {
    async fn restart(&self, index: TabIndex) -> Result<(), RestartError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.observed
            .lock()
            .expect("observed")
            .push(self.store.status(index));
        if let Some(entered) = self.entered.lock().expect("entered").take() {
            let _ = entered.send(());
        }
        let release = self.release.lock().await.take();
        match release {
            Some(release) => release.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}

/// Restart command that settles immediately with a fixed result.
struct ImmediateCommand {
    result: Result<(), RestartError>,
    calls: AtomicUsize,
}

impl ImmediateCommand {
    fn new(result: Result<(), RestartError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RestartCommand for ImmediateCommand {
    async fn restart(&self, _index: TabIndex) -> Result<(), RestartError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn seeded_store(count: usize) -> Arc<StatusStore> {
    let tabs: Vec<TabDescriptor> = (0..count)
        .map(|position| TabDescriptor {
            index: TabIndex(position),
            label: format!("service-{position}"),
            icon_url: String::new(),
            iframe_url: format!("http://service-{position}.internal"),
            is_restartable: true,
            accent_color: None,
        })
        .collect();
    let store = Arc::new(StatusStore::new());
    store.seed(&tabs);
    store
}

fn host_error(index: usize) -> RestartError {
    RestartError::Rejected {
        index: TabIndex(index),
        message: "container exited with code 137".to_string(),
    }
}

#[tokio::test]
async fn marks_restarting_before_remote_call_and_leaves_settling_to_push_events() {
    let store = seeded_store(2);
    let hub = EventHub::new();
    let push_store = Arc::clone(&store);
    let _subscription = StatusEventSubscriber::new(hub.clone()).subscribe(move |index, status| {
        push_store.set_status(index, status, StatusSource::PushEvent);
    });
    let (command, entered, release) = GatedCommand::new(Arc::clone(&store));
    let toasts = Arc::new(ToastQueue::default());
    let orchestrator = Arc::new(RestartOrchestrator::new(
        store.clone(),
        command.clone(),
        toasts.clone(),
    ));

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.restart(TabIndex(1)).await })
    };
    entered.await.expect("command entered");

    assert_eq!(store.status(TabIndex(1)), Some(TabStatus::Restarting));
    assert_eq!(
        *command.observed.lock().expect("observed"),
        vec![Some(TabStatus::Restarting)]
    );

    release.send(Ok(())).expect("release");
    assert_eq!(task.await.expect("join"), RestartOutcome::Issued);
    assert_eq!(store.status(TabIndex(1)), Some(TabStatus::Restarting));
    assert_eq!(store.status(TabIndex(0)), Some(TabStatus::Running));

    hub.deliver(TAB_STATUS_EVENT, &json!({ "tab_index": 1, "state": "running", "message": null }));
    assert_eq!(store.status(TabIndex(1)), Some(TabStatus::Running));
    assert!(toasts.is_empty());
}

#[tokio::test]
async fn failed_restart_rolls_back_and_notifies_once() {
    let store = seeded_store(3);
    let command = ImmediateCommand::new(Err(host_error(2)));
    let toasts = Arc::new(ToastQueue::default());
    let orchestrator = RestartOrchestrator::new(store.clone(), command.clone(), toasts.clone());
    let mut changes = store.subscribe_changes();

    let outcome = orchestrator.restart(TabIndex(2)).await;

    assert_eq!(
        outcome,
        RestartOutcome::RolledBack {
            restored: TabStatus::Running
        }
    );
    assert_eq!(store.status(TabIndex(2)), Some(TabStatus::Running));
    assert_eq!(changes.recv().await.expect("change").current, TabStatus::Restarting);
    assert_eq!(changes.recv().await.expect("change").current, TabStatus::Running);

    let notifications = toasts.drain();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].caption, RESTART_FAILED_CAPTION);
    assert!(notifications[0].detail.contains("container exited with code 137"));
}

#[tokio::test]
async fn rollback_restores_the_captured_previous_status() {
    let store = seeded_store(1);
    store.set_status(TabIndex(0), TabStatus::Error, StatusSource::PushEvent);
    let orchestrator = RestartOrchestrator::new(
        store.clone(),
        ImmediateCommand::new(Err(host_error(0))),
        Arc::new(ToastQueue::default()),
    );

    let outcome = orchestrator.restart(TabIndex(0)).await;

    assert_eq!(
        outcome,
        RestartOutcome::RolledBack {
            restored: TabStatus::Error
        }
    );
    assert_eq!(store.status(TabIndex(0)), Some(TabStatus::Error));
}

#[tokio::test]
async fn unknown_tab_issues_no_command() {
    let store = seeded_store(1);
    let command = ImmediateCommand::new(Ok(()));
    let toasts = Arc::new(ToastQueue::default());
    let orchestrator = RestartOrchestrator::new(store.clone(), command.clone(), toasts.clone());

    assert_eq!(
        orchestrator.restart(TabIndex(5)).await,
        RestartOutcome::UnknownTab
    );
    assert_eq!(command.calls.load(Ordering::SeqCst), 0);
    assert!(toasts.is_empty());
    assert_eq!(store.len(), 1);
}

async fn race_push_event_against_failed_restart(
    policy: RollbackPolicy,
) -> (RestartOutcome, Arc<StatusStore>, Arc<ToastQueue>) {
    let store = seeded_store(1);
    let (command, entered, release) = GatedCommand::new(Arc::clone(&store));
    let toasts = Arc::new(ToastQueue::default());
    let orchestrator = Arc::new(
        RestartOrchestrator::new(store.clone(), command, toasts.clone())
            .with_rollback_policy(policy),
    );

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.restart(TabIndex(0)).await })
    };
    entered.await.expect("command entered");
    store.set_status(TabIndex(0), TabStatus::Error, StatusSource::PushEvent);
    release.send(Err(host_error(0))).expect("release");

    let outcome = task.await.expect("join");
    (outcome, store, toasts)
}

#[tokio::test]
async fn unconditional_rollback_overwrites_push_event_that_landed_in_flight() {
    let (outcome, store, toasts) =
        race_push_event_against_failed_restart(RollbackPolicy::Unconditional).await;

    assert_eq!(
        outcome,
        RestartOutcome::RolledBack {
            restored: TabStatus::Running
        }
    );
    assert_eq!(store.status(TabIndex(0)), Some(TabStatus::Running));
    assert_eq!(toasts.len(), 1);
}

#[tokio::test]
async fn guarded_rollback_keeps_push_event_that_landed_in_flight() {
    let (outcome, store, toasts) =
        race_push_event_against_failed_restart(RollbackPolicy::OnlyIfRestarting).await;

    assert_eq!(
        outcome,
        RestartOutcome::RollbackSkipped {
            current: TabStatus::Error
        }
    );
    assert_eq!(store.status(TabIndex(0)), Some(TabStatus::Error));
    assert_eq!(toasts.len(), 1);
}

#[tokio::test]
async fn concurrent_restarts_keep_their_own_previous_status() {
    let store = seeded_store(2);
    store.set_status(TabIndex(1), TabStatus::Error, StatusSource::PushEvent);
    let orchestrator = RestartOrchestrator::new(
        store.clone(),
        ImmediateCommand::new(Err(host_error(0))),
        Arc::new(ToastQueue::default()),
    );

    let (first, second) = tokio::join!(
        orchestrator.restart(TabIndex(0)),
        orchestrator.restart(TabIndex(1))
    );

    assert_eq!(
        first,
        RestartOutcome::RolledBack {
            restored: TabStatus::Running
        }
    );
    assert_eq!(
        second,
        RestartOutcome::RolledBack {
            restored: TabStatus::Error
        }
    );
    assert_eq!(store.status(TabIndex(0)), Some(TabStatus::Running));
    assert_eq!(store.status(TabIndex(1)), Some(TabStatus::Error));
}
