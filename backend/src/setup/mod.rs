//! App setup workflow
//!
//! A setup request provisions a new app in one go: config vars, formations,
//! addons, attachments, the first build, log drains and pipeline couplings.
//! An existing app can be read back as a blueprint of such a request.

pub mod definition;
pub mod request;
pub mod service;
pub mod workflow;

pub use definition::{describe_app, AppDefinition};
pub use request::{SetupPlan, SetupRequest};
pub use service::SetupService;
pub use workflow::{build_tasks, failure_summary, WorkflowDeps};
