// Shared state handed to every HTTP handler

use crate::config::Config;
use crate::config_vars::{ConfigReconciler, Redactor, SideEffectQueue};
use crate::gateway::{
    ConfigStateProvider, HttpPlatformGateway, InMemoryPlatform, PlatformGateway,
    PlatformInventory, RedeployTrigger,
};
use crate::setup::{SetupService, WorkflowDeps};
use crate::state::persistence::SqliteStore;
use crate::state::store::AppCatalog;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Services wired together for the HTTP layer
#[derive(Clone)]
pub struct AppState {
    /// Space and app registry
    pub catalog: Arc<dyn AppCatalog>,
    /// App setup workflow
    pub setups: SetupService,
    /// Config var engine
    pub config_vars: Arc<ConfigReconciler>,
}

impl AppState {
    /// Wire the services against a store and the configured platform
    ///
    /// Without `PLATFORM_API_URL` the in-memory platform stands in for the
    /// stack and region APIs. Also returns the side-effect worker handle.
    pub fn build(
        config: &Config,
        store: Arc<SqliteStore>,
    ) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let (gateway, state, inventory, redeployer): (
            Arc<dyn PlatformGateway>,
            Arc<dyn ConfigStateProvider>,
            Arc<dyn PlatformInventory>,
            Arc<dyn RedeployTrigger>,
        ) = if config.platform.api_url.is_some() {
            let http = Arc::new(HttpPlatformGateway::new(&config.platform, store.clone())?);
            (http.clone(), http.clone(), http.clone(), http)
        } else {
            tracing::warn!("PLATFORM_API_URL is not set, using the in-memory platform");
            let memory = Arc::new(InMemoryPlatform::new());
            (memory.clone(), memory.clone(), memory.clone(), memory)
        };

        Ok(Self::with_platform(
            config, store, gateway, state, inventory, redeployer,
        ))
    }

    /// Wire the services against explicit platform collaborators
    pub fn with_platform(
        config: &Config,
        store: Arc<SqliteStore>,
        gateway: Arc<dyn PlatformGateway>,
        state: Arc<dyn ConfigStateProvider>,
        inventory: Arc<dyn PlatformInventory>,
        redeployer: Arc<dyn RedeployTrigger>,
    ) -> (Self, JoinHandle<()>) {
        let (effects, worker) = SideEffectQueue::spawn(store.clone(), redeployer);
        let config_vars = Arc::new(ConfigReconciler::new(
            gateway.clone(),
            state,
            effects,
            Redactor::new(&config.policy.envs_blacklist),
        ));
        let setups = SetupService::new(
            store.clone(),
            store.clone(),
            WorkflowDeps {
                gateway,
                reconciler: config_vars.clone(),
                inventory,
            },
            config.policy.clone(),
        )
        .with_public_url(config.server.public_url.clone());

        (
            Self {
                catalog: store,
                setups,
                config_vars,
            },
            worker,
        )
    }
}
