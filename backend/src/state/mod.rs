// State management module
// Domain records, persistence seams, the SQLite store and handler state

/// Handler state wiring
pub mod app_state;
/// Domain records
pub mod models;
/// SQLite store
pub mod persistence;
/// Persistence traits
pub mod store;

pub use app_state::AppState;
pub use models::{
    AppRef, AppTarget, SetupBuild, SetupRecord, SetupStatus, SpaceRecord, COMPLIANCE_TAG,
};
pub use persistence::{AppEvent, SqliteStore};
pub use store::{AppCatalog, SpaceDirectory, SpaceRouteNames, WorkflowStore};
