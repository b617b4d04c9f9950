//! Blueprint of an existing app
//!
//! Renders what has been provisioned for an app in the shape of a setup
//! request, so the result can be edited and submitted for a new app. Values
//! hidden by compliance redaction come back as required entries without a
//! value.

use crate::config_vars::{ConfigMap, REDACTED};
use crate::error::AppError;
use crate::gateway::{
    AddonSpec, AttachmentSpec, BuildRecord, FormationSpec, LogDrainRecord, PipelineCouplingSpec,
};
use crate::setup::workflow::WorkflowDeps;
use crate::state::AppTarget;
use serde::Serialize;
use std::collections::BTreeMap;

/// App identity in a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct DefinedApp {
    pub name: String,
    pub organization: String,
    pub space: String,
}

/// One `env` entry of a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinedEnv {
    /// Always empty
    pub description: String,
    /// Set when the value was redacted and must be supplied again
    pub required: bool,
    /// Omitted when redacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One `formation` entry of a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct DefinedFormation {
    pub quantity: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(rename = "health-check", skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
}

/// One `addons` entry of a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct DefinedAddon {
    pub plan: String,
}

/// One `attachments` entry of a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct DefinedAttachment {
    pub id: String,
}

/// Source of the latest build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct DefinedSource {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Body of `GET /apps/:app/app-setups`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct AppDefinition {
    pub app: DefinedApp,
    pub env: BTreeMap<String, DefinedEnv>,
    pub formation: BTreeMap<String, DefinedFormation>,
    pub addons: BTreeMap<String, DefinedAddon>,
    pub attachments: Vec<DefinedAttachment>,
    /// `null` until the app has a build
    pub source_blob: Option<DefinedSource>,
    #[serde(rename = "log-drains")]
    pub log_drains: Vec<LogDrainRecord>,
    #[serde(rename = "pipeline-couplings")]
    pub pipeline_couplings: Vec<PipelineCouplingSpec>,
}

/// Read everything provisioned for `app` and render it as a blueprint
///
/// Env holds user-set vars only; service-owned vars come back with their
/// addons.
pub async fn describe_app(app: &AppTarget, deps: &WorkflowDeps) -> Result<AppDefinition, AppError> {
    let inventory = &deps.inventory;
    let (env, formations, addons, attachments, build, drains, couplings) = tokio::try_join!(
        deps.reconciler.user_config(app),
        async { Ok::<_, AppError>(inventory.list_formations(app).await?) },
        async { Ok::<_, AppError>(inventory.list_addons(app).await?) },
        async { Ok::<_, AppError>(inventory.list_attachments(app).await?) },
        async { Ok::<_, AppError>(inventory.latest_build(app).await?) },
        async { Ok::<_, AppError>(inventory.list_log_drains(app).await?) },
        async { Ok::<_, AppError>(inventory.list_pipeline_couplings(app).await?) },
    )?;

    Ok(AppDefinition {
        app: DefinedApp {
            name: app.name.clone(),
            organization: app.org.clone(),
            space: app.space.clone(),
        },
        env: define_env(env),
        formation: define_formations(formations),
        addons: define_addons(addons),
        attachments: define_attachments(attachments),
        source_blob: build.map(define_source),
        log_drains: drains,
        pipeline_couplings: couplings,
    })
}

fn define_env(vars: ConfigMap) -> BTreeMap<String, DefinedEnv> {
    vars.into_iter()
        .map(|(key, value)| {
            let redacted = value.contains(REDACTED);
            let entry = DefinedEnv {
                description: String::new(),
                required: redacted,
                value: (!redacted).then_some(value),
            };
            (key, entry)
        })
        .collect()
}

fn define_formations(formations: Vec<FormationSpec>) -> BTreeMap<String, DefinedFormation> {
    formations
        .into_iter()
        .map(|f| {
            let size = f.size.strip_suffix("-prod").unwrap_or(&f.size).to_string();
            let entry = DefinedFormation {
                quantity: f.quantity,
                size,
                port: f.port,
                command: f.command,
                health_check: f.health_check,
            };
            (f.kind, entry)
        })
        .collect()
}

fn define_addons(addons: Vec<AddonSpec>) -> BTreeMap<String, DefinedAddon> {
    addons
        .into_iter()
        .map(|addon| (addon.service().to_string(), DefinedAddon { plan: addon.plan }))
        .collect()
}

fn define_attachments(attachments: Vec<AttachmentSpec>) -> Vec<DefinedAttachment> {
    attachments
        .into_iter()
        .map(|a| DefinedAttachment { id: a.addon })
        .collect()
}

fn define_source(build: BuildRecord) -> DefinedSource {
    DefinedSource {
        url: build.url,
        checksum: build.checksum,
        version: build.version,
    }
}
