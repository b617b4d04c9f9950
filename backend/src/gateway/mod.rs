//! Platform collaborators
//!
//! The setup workflow and the config engine only talk to the platform through
//! the traits in this module. `HttpPlatformGateway` speaks to the real stack and
//! region APIs; `InMemoryPlatform` backs local development and tests.

pub mod cache;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use cache::{RouteCache, SpaceRoutes};
pub use error::GatewayError;
pub use http::HttpPlatformGateway;
pub use memory::InMemoryPlatform;
pub use types::{
    AddonSpec, AttachmentSpec, BuildRecord, BuildSpec, FormationSpec, LogDrainRecord,
    LogDrainSpec, PipelineCouplingSpec,
};

use crate::config_vars::{ConfigMap, ConfigMutation};
use crate::error::AppError;
use crate::state::AppTarget;
use async_trait::async_trait;
use serde_json::Value;

/// Mutating platform calls issued by setup tasks and config reconciliation
#[async_trait]
pub trait PlatformGateway: Send + Sync {
    /// Create a process type with its quantity and size
    async fn create_formation(
        &self,
        app: &AppTarget,
        formation: &FormationSpec,
    ) -> Result<Value, GatewayError>;

    /// Provision a service instance for the app
    async fn create_addon(&self, app: &AppTarget, addon: &AddonSpec)
        -> Result<Value, GatewayError>;

    /// Bind an existing addon to the app
    async fn create_attachment(
        &self,
        app: &AppTarget,
        attachment: &AttachmentSpec,
    ) -> Result<Value, GatewayError>;

    /// Start a build from a source blob
    async fn create_build(&self, app: &AppTarget, build: &BuildSpec)
        -> Result<Value, GatewayError>;

    /// Forward the app's logs to a drain
    async fn create_log_drain(
        &self,
        app: &AppTarget,
        drain: &LogDrainSpec,
    ) -> Result<Value, GatewayError>;

    /// Couple the app to a pipeline stage
    async fn create_pipeline_coupling(
        &self,
        app: &AppTarget,
        coupling: &PipelineCouplingSpec,
    ) -> Result<Value, GatewayError>;

    /// Create, update or delete a single user config var
    async fn apply_config_var(
        &self,
        app: &AppTarget,
        key: &str,
        mutation: &ConfigMutation,
    ) -> Result<(), GatewayError>;
}

/// Read access to an app's config var state
#[async_trait]
pub trait ConfigStateProvider: Send + Sync {
    /// Vars set by the user
    async fn current_user_state(&self, app: &AppTarget) -> Result<ConfigMap, GatewayError>;

    /// Vars injected by attached services; read-only for users
    async fn service_owned_state(&self, app: &AppTarget) -> Result<ConfigMap, GatewayError>;
}

/// Destination for app events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Record or forward one event about `app`
    async fn notify(&self, app: &AppTarget, event_type: &str, payload: Value)
        -> Result<(), AppError>;
}

/// Schedules an app redeploy
#[async_trait]
pub trait RedeployTrigger: Send + Sync {
    /// Ask the platform to restart the app with its current config
    async fn schedule_redeploy(&self, app: &AppTarget, reason: &str) -> Result<(), GatewayError>;
}

/// Read access to what has been provisioned for an app
///
/// Lists are empty when the platform has nothing for the app.
#[async_trait]
pub trait PlatformInventory: Send + Sync {
    /// Process types and their scale
    async fn list_formations(&self, app: &AppTarget) -> Result<Vec<FormationSpec>, GatewayError>;

    /// Service instances owned by the app
    async fn list_addons(&self, app: &AppTarget) -> Result<Vec<AddonSpec>, GatewayError>;

    /// Addons bound to the app
    async fn list_attachments(&self, app: &AppTarget)
        -> Result<Vec<AttachmentSpec>, GatewayError>;

    /// Most recently created build, if any
    async fn latest_build(&self, app: &AppTarget) -> Result<Option<BuildRecord>, GatewayError>;

    /// Log drains attached to the app
    async fn list_log_drains(&self, app: &AppTarget)
        -> Result<Vec<LogDrainRecord>, GatewayError>;

    /// Pipeline stages the app is coupled to
    async fn list_pipeline_couplings(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<PipelineCouplingSpec>, GatewayError>;
}
