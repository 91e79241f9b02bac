//! Dependency wiring
//!
//! Builds the per-owner object graph for one flow: file-backed local store,
//! system clock, degrade-aware persistence, synchronizer, resolver. The host
//! supplies the remote gateway, the notifier and the completion callback.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, info_span, Instrument};
use ws_app::{
    DraftController, DualWriteSynchronizer, FlowDeps, FlowServices, FlowSettings,
    LocalPersistence, SessionRecoveryResolver,
};
use ws_core::ports::{CompletionPort, LocalStorePort, NotifierPort, RemoteGatewayPort};
use ws_core::{EntityType, FlowSchema, OwnerId, RecoveryOutcome, SyncConfig};
use ws_infra::local_store::DEFAULT_STORE_DIR;
use ws_infra::{FileLocalStore, SystemClock};

const APP_DIR_NAME: &str = "wellsync";

/// Host-provided adapters.
#[derive(Clone)]
pub struct FlowPorts {
    pub gateway: Arc<dyn RemoteGatewayPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub completion: Arc<dyn CompletionPort>,
}

/// What a mounted flow should show.
pub enum FlowStart {
    InProgress(DraftController),
    Completed,
}

/// One flow for one owner, ready to be started.
pub struct FlowRuntime {
    schema: Arc<FlowSchema>,
    owner: OwnerId,
    services: FlowServices,
    resolver: SessionRecoveryResolver,
}

impl FlowRuntime {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn schema(&self) -> &Arc<FlowSchema> {
        &self.schema
    }

    /// Record synchronizer shared with the draft autosave.
    pub fn synchronizer(&self) -> &DualWriteSynchronizer {
        &self.services.synchronizer
    }

    pub fn resolver(&self) -> &SessionRecoveryResolver {
        &self.resolver
    }

    /// Resolve where the flow stands and build its controller.
    pub async fn start(&self) -> (FlowStart, RecoveryOutcome) {
        let span = info_span!(
            "bootstrap.flow_runtime.start",
            flow = %self.schema.flow(),
            owner = %self.owner
        );
        async {
            let loaded = self.services.synchronizer.load(&EntityType::draft());
            let outcome = self.resolver.resolve(&self.owner).await;
            info!(loaded, source = ?outcome.source, "flow started");

            let start = match DraftController::from_recovery(
                self.schema.clone(),
                self.owner.clone(),
                outcome.decision.clone(),
                self.services.clone(),
            ) {
                Some(controller) => FlowStart::InProgress(controller),
                None => FlowStart::Completed,
            };
            (start, outcome)
        }
        .instrument(span)
        .await
    }
}

/// Build a runtime backed by the file store under `config.data_dir`, or the
/// platform data directory when that is empty.
pub fn build_flow_runtime(
    config: &SyncConfig,
    schema: FlowSchema,
    owner: OwnerId,
    ports: FlowPorts,
) -> anyhow::Result<FlowRuntime> {
    let data_dir = resolve_data_dir(config)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;
    let store = FileLocalStore::new(data_dir.join(DEFAULT_STORE_DIR), config.max_bytes);
    info!(root = %store.root().display(), "using file-backed local store");

    Ok(build_flow_runtime_with_store(
        config,
        schema,
        owner,
        Arc::new(store),
        ports,
    ))
}

pub fn build_flow_runtime_with_store(
    config: &SyncConfig,
    schema: FlowSchema,
    owner: OwnerId,
    store: Arc<dyn LocalStorePort>,
    ports: FlowPorts,
) -> FlowRuntime {
    let flow_config = config.flow(schema.flow().as_str());
    let schema = if flow_config.legacy_keys.is_empty() {
        schema
    } else {
        schema.with_legacy_keys(flow_config.legacy_keys)
    };
    let schema = Arc::new(schema);
    let settings = FlowSettings::from(config);

    let deps = FlowDeps {
        store: store.clone(),
        gateway: ports.gateway,
        notifier: ports.notifier.clone(),
        clock: Arc::new(SystemClock),
    };
    let persistence = Arc::new(LocalPersistence::new(store, ports.notifier));
    let synchronizer = DualWriteSynchronizer::new(
        schema.flow().clone(),
        owner.clone(),
        &deps,
        persistence.clone(),
        settings.remote_timeout,
    );
    let resolver = SessionRecoveryResolver::new(
        schema.clone(),
        &deps,
        persistence.clone(),
        settings.remote_timeout,
    );

    FlowRuntime {
        schema,
        owner,
        services: FlowServices {
            deps,
            persistence,
            synchronizer,
            completion: ports.completion,
            settings,
        },
        resolver,
    }
}

fn resolve_data_dir(config: &SyncConfig) -> anyhow::Result<PathBuf> {
    if !config.data_dir.as_os_str().is_empty() {
        return Ok(config.data_dir.clone());
    }
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .context("No platform data directory; set [storage] data_dir")
}
