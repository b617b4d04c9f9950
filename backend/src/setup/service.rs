//! App setup submission and status

use crate::config::PolicyConfig;
use crate::error::AppError;
use crate::setup::definition::{describe_app, AppDefinition};
use crate::setup::request::SetupRequest;
use crate::setup::workflow::{build_tasks, failure_summary, WorkflowDeps};
use crate::state::{AppCatalog, AppTarget, SetupBuild, SetupStatus, WorkflowStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Accepts setup requests and runs them in the background
#[derive(Clone)]
pub struct SetupService {
    catalog: Arc<dyn AppCatalog>,
    store: Arc<dyn WorkflowStore>,
    deps: WorkflowDeps,
    policy: PolicyConfig,
    public_url: String,
}

impl SetupService {
    /// Create the service over its store and collaborators
    pub fn new(
        catalog: Arc<dyn AppCatalog>,
        store: Arc<dyn WorkflowStore>,
        deps: WorkflowDeps,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            deps,
            policy,
            public_url: String::new(),
        }
    }

    /// Base URL prefixed to build output links (relative links without it)
    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = public_url.into();
        self
    }

    /// Validate, register the app and start the setup run
    ///
    /// Returns as soon as the run is persisted as `pending`; the tasks run in
    /// the background.
    pub async fn submit(&self, request: SetupRequest) -> Result<SetupStatus, AppError> {
        self.start(request).await.map(|(status, _)| status)
    }

    /// Like `submit`, also handing back the background run
    pub async fn start(
        &self,
        request: SetupRequest,
    ) -> Result<(SetupStatus, JoinHandle<()>), AppError> {
        let plan = request.validate(&self.policy)?;
        let app = self
            .catalog
            .register_app(&plan.app.org, &plan.app.space, &plan.app.name)
            .await?;
        let record = self.store.create_setup(&app).await?;
        let setup_id = record.id;

        let mut queue = build_tasks(&plan, &app, &self.deps, setup_id)?;

        let store = self.store.clone();
        queue.on_progress(move |fraction| {
            let store = store.clone();
            async move {
                if let Err(e) = store.persist_progress(setup_id, fraction).await {
                    warn!(setup_id = %setup_id, error = %e, "Failed to persist setup progress");
                }
            }
        });

        info!(
            setup_id = %setup_id,
            app = %app.key(),
            tasks = queue.len(),
            "Starting app setup"
        );

        let store = self.store.clone();
        let app_key = app.key();
        let handle = queue.run(move |report| async move {
            for (task, err) in report.failures() {
                warn!(setup_id = %report.run_id, app = %app_key, task = %task, error = %err, "Setup step failed");
            }
            let summary = failure_summary(&report);
            store
                .persist_terminal(report.run_id, report.status(), &summary)
                .await?;
            info!(
                setup_id = %report.run_id,
                app = %app_key,
                status = report.status().as_str(),
                "App setup finished"
            );
            Ok(())
        });

        let mut accepted = SetupStatus::from(record);
        accepted.build = Some(SetupBuild::queued());
        Ok((accepted, handle))
    }

    /// Current state of a setup run, with the app's latest build if any
    pub async fn status(&self, setup_id: Uuid) -> Result<SetupStatus, AppError> {
        let record = self.store.get_setup(setup_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("The specified app setup {} was not found.", setup_id))
        })?;
        let app_id = record.app_id;
        let mut status = SetupStatus::from(record);

        // the run state is still worth returning when the build lookup fails
        match self.catalog.find_app(&app_id.to_string()).await {
            Ok(app) => status.build = self.latest_build(&app).await,
            Err(e) => warn!(setup_id = %setup_id, error = %e, "App of setup run not found"),
        }
        Ok(status)
    }

    async fn latest_build(&self, app: &AppTarget) -> Option<SetupBuild> {
        match self.deps.inventory.latest_build(app).await {
            Ok(build) => build.map(|build| SetupBuild {
                output_stream_url: Some(format!(
                    "{}/apps/{}/builds/{}/result",
                    self.public_url,
                    app.key(),
                    build.id
                )),
                id: Some(build.id),
                status: build.status,
            }),
            Err(e) => {
                warn!(app = %app.key(), error = %e, "Failed to look up latest build");
                None
            }
        }
    }

    /// Blueprint of an existing app, in the shape of a setup request
    pub async fn definition(&self, app_key: &str) -> Result<AppDefinition, AppError> {
        let app = self.catalog.find_app(app_key).await?;
        describe_app(&app, &self.deps).await
    }
}
