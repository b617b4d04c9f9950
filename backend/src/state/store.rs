// Persistence seams used by the services
//
// `SqliteStore` implements all of them; tests may substitute their own.

use crate::error::AppError;
use crate::executor::RunStatus;
use crate::state::models::{AppTarget, SetupRecord, SpaceRecord};
use async_trait::async_trait;
use uuid::Uuid;

/// Stack and region names serving a space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRouteNames {
    /// Stack name
    pub stack: String,
    /// Region name
    pub region: String,
}

/// Setup run bookkeeping
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Create a pending run for a freshly registered app
    async fn create_setup(&self, app: &AppTarget) -> Result<SetupRecord, AppError>;

    /// Record progress; never moves the stored fraction backwards
    async fn persist_progress(&self, setup_id: Uuid, fraction: f64) -> Result<(), AppError>;

    /// Record the terminal status and the failure summary (empty on success)
    async fn persist_terminal(
        &self,
        setup_id: Uuid,
        status: RunStatus,
        failure_message: &str,
    ) -> Result<(), AppError>;

    /// Load a run, `None` if unknown
    async fn get_setup(&self, setup_id: Uuid) -> Result<Option<SetupRecord>, AppError>;
}

/// Registry of spaces and apps
#[async_trait]
pub trait AppCatalog: Send + Sync {
    /// Create or replace a space
    async fn register_space(&self, space: &SpaceRecord) -> Result<(), AppError>;

    /// Register a new app
    ///
    /// Fails with `NotFound` for an unknown space and `Conflict` when the
    /// name is taken in that space.
    async fn register_app(&self, org: &str, space: &str, name: &str)
        -> Result<AppTarget, AppError>;

    /// Look up an app by id or by `<name>-<space>`
    async fn find_app(&self, key: &str) -> Result<AppTarget, AppError>;
}

/// Resolves which stack and region serve a space
#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    /// Stack and region names for `space`, `None` if the space is unknown
    async fn space_route(&self, space: &str) -> Result<Option<SpaceRouteNames>, AppError>;
}
