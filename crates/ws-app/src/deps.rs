//! Dependency bundles injected into the use cases.

use std::sync::Arc;
use std::time::Duration;

use ws_core::config::SyncConfig;
use ws_core::ports::{ClockPort, CompletionPort, LocalStorePort, NotifierPort, RemoteGatewayPort};

use crate::usecases::{DualWriteSynchronizer, LocalPersistence};

/// Ports shared by every use case of one flow.
#[derive(Clone)]
pub struct FlowDeps {
    pub store: Arc<dyn LocalStorePort>,
    pub gateway: Arc<dyn RemoteGatewayPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub clock: Arc<dyn ClockPort>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    pub remote_timeout: Duration,
    pub autosave_debounce: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for FlowSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            remote_timeout: config.remote_timeout,
            autosave_debounce: config.autosave_debounce,
        }
    }
}

/// Everything a [`crate::DraftController`] needs besides its schema and draft.
///
/// One bundle per owner: the synchronizer inside is owner-scoped.
#[derive(Clone)]
pub struct FlowServices {
    pub deps: FlowDeps,
    pub persistence: Arc<LocalPersistence>,
    pub synchronizer: DualWriteSynchronizer,
    pub completion: Arc<dyn CompletionPort>,
    pub settings: FlowSettings,
}
