#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use ws_app::{
    DualWriteSynchronizer, FlowDeps, FlowServices, FlowSettings, LocalPersistence,
    SessionRecoveryResolver,
};
use ws_core::draft::{AcceptAll, RequiredFields};
use ws_core::ports::{ClockPort, CompletionPort, LocalStorePort, NotifierPort};
use ws_core::{Draft, FlowSchema, NotificationKind, OwnerId, StepDefinition};
use ws_infra::{ChannelNotifier, InMemoryLocalStore, InMemoryRemoteGateway, Notification};

pub const OWNER: &str = "user-1";

pub struct TestClock(AtomicI64);

impl ClockPort for TestClock {
    fn now_ms(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingCompletion {
    pub calls: AtomicUsize,
    pub last: Mutex<Option<Draft>>,
}

#[async_trait]
impl CompletionPort for RecordingCompletion {
    async fn on_complete(&self, draft: &Draft) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(draft.clone());
        Ok(())
    }
}

/// Three steps; the middle one is required and validated.
pub fn onboarding_schema() -> Arc<FlowSchema> {
    Arc::new(
        FlowSchema::new(
            "onboarding",
            "3",
            vec![
                StepDefinition::required("profile", RequiredFields::new(["name"])),
                StepDefinition::required("goals", RequiredFields::new(["goal", "activity"])),
                StepDefinition::optional("preferences", AcceptAll),
            ],
        )
        .unwrap()
        .with_legacy_keys(["old_flow_v1", "onboarding_backup:{owner}"]),
    )
}

/// Logs go to the test writer; set `RUST_LOG` to see them.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestEnv {
    pub schema: Arc<FlowSchema>,
    pub store: Arc<InMemoryLocalStore>,
    pub gateway: Arc<InMemoryRemoteGateway>,
    pub completion: Arc<RecordingCompletion>,
    pub notifications: UnboundedReceiver<Notification>,
    pub deps: FlowDeps,
    pub persistence: Arc<LocalPersistence>,
    pub settings: FlowSettings,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_store(InMemoryLocalStore::new())
    }

    pub fn with_store(store: InMemoryLocalStore) -> Self {
        init_test_tracing();
        let store = Arc::new(store);
        let gateway = Arc::new(InMemoryRemoteGateway::new());
        let (notifier, notifications) = ChannelNotifier::new();
        let notifier: Arc<dyn NotifierPort> = Arc::new(notifier);
        let deps = FlowDeps {
            store: store.clone(),
            gateway: gateway.clone(),
            notifier: notifier.clone(),
            clock: Arc::new(TestClock(AtomicI64::new(1_700_000_000_000))),
        };
        let persistence = Arc::new(LocalPersistence::new(store.clone(), notifier));
        Self {
            schema: onboarding_schema(),
            store,
            gateway,
            completion: Arc::new(RecordingCompletion::default()),
            notifications,
            deps,
            persistence,
            settings: FlowSettings {
                remote_timeout: Duration::from_secs(10),
                autosave_debounce: Duration::from_millis(800),
            },
        }
    }

    pub fn owner(&self) -> OwnerId {
        OwnerId::from(OWNER)
    }

    pub fn synchronizer(&self) -> DualWriteSynchronizer {
        DualWriteSynchronizer::new(
            self.schema.flow().clone(),
            self.owner(),
            &self.deps,
            self.persistence.clone(),
            self.settings.remote_timeout,
        )
    }

    pub fn services(&self) -> FlowServices {
        FlowServices {
            deps: self.deps.clone(),
            persistence: self.persistence.clone(),
            synchronizer: self.synchronizer(),
            completion: self.completion.clone(),
            settings: self.settings,
        }
    }

    pub fn resolver(&self) -> SessionRecoveryResolver {
        SessionRecoveryResolver::new(
            self.schema.clone(),
            &self.deps,
            self.persistence.clone(),
            self.settings.remote_timeout,
        )
    }

    pub fn stored(&self, key: &str) -> Option<Value> {
        self.store.read(key).unwrap().into_option()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            seen.push(notification);
        }
        seen
    }

    pub fn count_kind(notifications: &[Notification], kind: NotificationKind) -> usize {
        notifications.iter().filter(|n| n.kind == kind).count()
    }
}
