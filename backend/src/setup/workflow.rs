//! Turns a validated setup plan into an ordered task queue

use crate::config_vars::ConfigReconciler;
use crate::error::AppError;
use crate::executor::{ExecutorError, RunReport, Task, TaskQueue};
use crate::gateway::{GatewayError, PlatformGateway, PlatformInventory};
use crate::setup::request::{
    addon_task, attachment_task, build_task, coupling_task, formation_task, log_drain_task,
    SetupPlan,
};
use crate::state::AppTarget;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Collaborators the setup tasks call into
#[derive(Clone)]
pub struct WorkflowDeps {
    /// Target of the provisioning steps
    pub gateway: Arc<dyn PlatformGateway>,
    /// Runs the config var step
    pub reconciler: Arc<ConfigReconciler>,
    /// Reads back what the steps provisioned
    pub inventory: Arc<dyn PlatformInventory>,
}

fn gateway_task<F>(name: String, deps: &WorkflowDeps, app: &AppTarget, call: F) -> Task
where
    F: FnOnce(Arc<dyn PlatformGateway>, AppTarget) -> BoxFuture<'static, Result<Value, GatewayError>>
        + Send
        + 'static,
{
    let gateway = deps.gateway.clone();
    let app = app.clone();
    Task::new(name, move || call(gateway, app))
}

/// Build the setup run for `app`
///
/// Order: config vars, formations, addons, attachments, build, log drains,
/// pipeline couplings.
pub fn build_tasks(
    plan: &SetupPlan,
    app: &AppTarget,
    deps: &WorkflowDeps,
    run_id: Uuid,
) -> Result<TaskQueue, AppError> {
    let mut queue = TaskQueue::with_run_id(run_id);
    let duplicate = |e: ExecutorError| AppError::Validation(e.to_string());

    let reconciler = deps.reconciler.clone();
    let target = app.clone();
    let vars = plan.config_vars.clone();
    queue
        .add(Task::new(SetupPlan::CONFIG_TASK, move || async move {
            let outcome = reconciler.reconcile(&target, vars).await?;
            Ok::<_, AppError>(json!({ "changes": outcome.changes }))
        }))
        .map_err(duplicate)?;

    for formation in plan.formations.iter().cloned() {
        queue
            .add(gateway_task(formation_task(&formation), deps, app, move |gw, app| {
                Box::pin(async move { gw.create_formation(&app, &formation).await })
            }))
            .map_err(duplicate)?;
    }

    for addon in plan.addons.iter().cloned() {
        queue
            .add(gateway_task(addon_task(&addon), deps, app, move |gw, app| {
                Box::pin(async move { gw.create_addon(&app, &addon).await })
            }))
            .map_err(duplicate)?;
    }

    for attachment in plan.attachments.iter().cloned() {
        queue
            .add(gateway_task(attachment_task(&attachment), deps, app, move |gw, app| {
                Box::pin(async move { gw.create_attachment(&app, &attachment).await })
            }))
            .map_err(duplicate)?;
    }

    let build = plan.build.clone();
    queue
        .add(gateway_task(build_task(&build), deps, app, move |gw, app| {
            Box::pin(async move { gw.create_build(&app, &build).await })
        }))
        .map_err(duplicate)?;

    for drain in plan.log_drains.iter().cloned() {
        queue
            .add(gateway_task(log_drain_task(&drain), deps, app, move |gw, app| {
                Box::pin(async move { gw.create_log_drain(&app, &drain).await })
            }))
            .map_err(duplicate)?;
    }

    for coupling in plan.couplings.iter().cloned() {
        queue
            .add(gateway_task(coupling_task(&coupling), deps, app, move |gw, app| {
                Box::pin(async move { gw.create_pipeline_coupling(&app, &coupling).await })
            }))
            .map_err(duplicate)?;
    }

    Ok(queue)
}

/// `"<task> [<code>]: <message>"` per failed task, joined by `", "`
///
/// Empty when every task succeeded.
pub fn failure_summary(report: &RunReport) -> String {
    report
        .failures()
        .map(|(name, err)| format!("{} {}", name, err))
        .collect::<Vec<_>>()
        .join(", ")
}
