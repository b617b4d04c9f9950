//! App setup request payload and validation

use crate::config::PolicyConfig;
use crate::config_vars::{is_valid_key, DesiredChanges};
use crate::error::AppError;
use crate::gateway::{
    AddonSpec, AttachmentSpec, BuildSpec, FormationSpec, LogDrainSpec, PipelineCouplingSpec,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

static APP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]{0,23}$").expect("app name pattern is valid"));
static SPACE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]{1,64}$").expect("space name pattern is valid"));
static FORMATION_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+$").expect("formation type pattern is valid"));
static FORMATION_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("formation size pattern is valid"));

const DRAIN_SCHEMES: [&str; 4] = ["syslog://", "syslog+tls://", "http://", "https://"];
const PIPELINE_STAGES: [&str; 4] = ["review", "development", "staging", "production"];

/// Body of `POST /app-setups`
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct SetupRequest {
    #[serde(default)]
    pub app: AppRequest,
    #[serde(default)]
    pub env: BTreeMap<String, EnvEntry>,
    #[serde(default)]
    pub formation: BTreeMap<String, FormationEntry>,
    #[serde(default)]
    pub addons: BTreeMap<String, AddonEntry>,
    #[serde(default)]
    pub attachments: Vec<AttachmentEntry>,
    #[serde(default)]
    pub source_blob: SourceBlob,
    #[serde(default, rename = "log-drains")]
    pub log_drains: Vec<LogDrainEntry>,
    #[serde(default, rename = "pipeline-couplings")]
    pub pipeline_couplings: Vec<PipelineCouplingEntry>,
}

/// App identity as submitted
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct AppRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub space: String,
    #[serde(default)]
    pub organization: String,
}

/// One `env` entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvEntry {
    /// Value; entries without one are skipped
    #[serde(default)]
    pub value: Option<String>,
    /// `true` or `"true"`
    #[serde(default)]
    pub required: Option<Value>,
    /// Free-form description, ignored
    #[serde(default)]
    pub description: Option<String>,
}

impl EnvEntry {
    fn is_required(&self) -> bool {
        match &self.required {
            Some(Value::Bool(required)) => *required,
            Some(Value::String(required)) => required.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// One `formation` entry, keyed by process type
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct FormationEntry {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, rename = "health-check")]
    pub health_check: Option<String>,
}

/// One `addons` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct AddonEntry {
    #[serde(default)]
    pub plan: String,
}

/// One `attachments` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct AttachmentEntry {
    #[serde(default)]
    pub id: String,
}

/// Source of the first build
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct SourceBlob {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// One `log-drains` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct LogDrainEntry {
    #[serde(default)]
    pub url: String,
}

/// One `pipeline-couplings` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct PipelineCouplingEntry {
    #[serde(default)]
    pub pipeline: String,
    #[serde(default)]
    pub stage: String,
}

/// Normalized app identity
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AppIdentity {
    pub name: String,
    pub space: String,
    pub org: String,
}

/// A validated setup request, ready to be turned into tasks
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct SetupPlan {
    pub app: AppIdentity,
    pub config_vars: DesiredChanges,
    pub formations: Vec<FormationSpec>,
    pub addons: Vec<AddonSpec>,
    pub attachments: Vec<AttachmentSpec>,
    pub build: BuildSpec,
    pub log_drains: Vec<LogDrainSpec>,
    pub couplings: Vec<PipelineCouplingSpec>,
}

impl SetupPlan {
    /// Name of the config var step
    pub const CONFIG_TASK: &'static str = "configuration variables";

    /// Task names in execution order
    pub fn task_names(&self) -> Vec<String> {
        let mut names = vec![Self::CONFIG_TASK.to_string()];
        names.extend(self.formations.iter().map(formation_task));
        names.extend(self.addons.iter().map(addon_task));
        names.extend(self.attachments.iter().map(attachment_task));
        names.push(build_task(&self.build));
        names.extend(self.log_drains.iter().map(log_drain_task));
        names.extend(self.couplings.iter().map(coupling_task));
        names
    }
}

pub(crate) fn formation_task(formation: &FormationSpec) -> String {
    format!("formation creation [{}]", formation.kind)
}

pub(crate) fn addon_task(addon: &AddonSpec) -> String {
    format!("addon creation [{}]", addon.plan)
}

pub(crate) fn attachment_task(attachment: &AttachmentSpec) -> String {
    format!("addon attachment [{}]", attachment.addon)
}

pub(crate) fn build_task(build: &BuildSpec) -> String {
    format!("building {}", build.url)
}

pub(crate) fn log_drain_task(drain: &LogDrainSpec) -> String {
    format!("log drain creation to {}", drain.url)
}

pub(crate) fn coupling_task(coupling: &PipelineCouplingSpec) -> String {
    format!(
        "pipeline coupling {} at stage {}",
        coupling.pipeline, coupling.stage
    )
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

impl SetupRequest {
    /// Check every field and normalize it into a `SetupPlan`
    ///
    /// Stops at the first problem found.
    pub fn validate(self, policy: &PolicyConfig) -> Result<SetupPlan, AppError> {
        let app = validate_app(self.app)?;

        let mut config_vars = DesiredChanges::new();
        for (key, entry) in self.env {
            if !is_valid_key(&key) {
                return Err(invalid(format!(
                    "The environment variable {} is invalid. Names must be alpha numeric and may contain underscores.",
                    key
                )));
            }
            let value = entry.value.clone().filter(|v| !v.is_empty());
            if entry.is_required() && value.is_none() {
                return Err(invalid(format!(
                    "The environment variable {} is required but no value was given.",
                    key
                )));
            }
            if let Some(value) = value {
                config_vars.insert(key, Some(value));
            }
        }

        let formations = self
            .formation
            .into_iter()
            .map(|(kind, entry)| validate_formation(kind, entry, policy))
            .collect::<Result<Vec<_>, _>>()?;

        let mut addons = Vec::with_capacity(self.addons.len());
        for (name, entry) in self.addons {
            let plan = entry.plan.trim();
            if plan.is_empty() {
                return Err(invalid(format!("The addon {} does not specify a plan.", name)));
            }
            addons.push(AddonSpec {
                plan: plan.to_string(),
            });
        }

        let mut attachments = Vec::with_capacity(self.attachments.len());
        for entry in self.attachments {
            let id = entry.id.trim();
            if id.is_empty() {
                return Err(invalid("An attachment is missing its addon id."));
            }
            attachments.push(AttachmentSpec {
                addon: id.to_string(),
            });
        }

        let url = self.source_blob.url.trim();
        if url.is_empty() {
            return Err(invalid("The source_blob.url field is required."));
        }
        let build = BuildSpec {
            url: url.to_string(),
        };

        let mut log_drains = Vec::with_capacity(self.log_drains.len());
        for entry in self.log_drains {
            let url = entry.url.trim();
            if !DRAIN_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
                return Err(invalid(format!(
                    "The log drain url {:?} must use syslog://, syslog+tls://, http:// or https://.",
                    url
                )));
            }
            log_drains.push(LogDrainSpec {
                url: url.to_string(),
            });
        }

        let mut couplings = Vec::with_capacity(self.pipeline_couplings.len());
        for entry in self.pipeline_couplings {
            let pipeline = entry.pipeline.trim();
            if pipeline.is_empty() {
                return Err(invalid("A pipeline coupling is missing its pipeline."));
            }
            let stage = entry.stage.trim().to_lowercase();
            if !PIPELINE_STAGES.contains(&stage.as_str()) {
                return Err(invalid(format!(
                    "The pipeline stage {:?} is invalid, expected one of {}.",
                    entry.stage,
                    PIPELINE_STAGES.join(", ")
                )));
            }
            couplings.push(PipelineCouplingSpec {
                pipeline: pipeline.to_string(),
                stage,
            });
        }

        let plan = SetupPlan {
            app,
            config_vars,
            formations,
            addons,
            attachments,
            build,
            log_drains,
            couplings,
        };

        let mut seen = HashSet::new();
        if let Some(duplicate) = plan
            .task_names()
            .into_iter()
            .find(|name| !seen.insert(name.clone()))
        {
            return Err(invalid(format!("The setup step {} is listed twice.", duplicate)));
        }

        Ok(plan)
    }
}

fn validate_app(app: AppRequest) -> Result<AppIdentity, AppError> {
    let name = app.name.trim().to_lowercase();
    if !APP_NAME.is_match(&name) {
        return Err(invalid(format!(
            "The app name {:?} is invalid. Names must start with a letter, contain only lowercase letters and numbers, and be at most 24 characters.",
            app.name
        )));
    }
    let space = app.space.trim().to_lowercase();
    if !SPACE_NAME.is_match(&space) {
        return Err(invalid(format!("The space name {:?} is invalid.", app.space)));
    }
    let org = app.organization.trim();
    if org.is_empty() {
        return Err(invalid("The app organization is required."));
    }
    Ok(AppIdentity {
        name,
        space,
        org: org.to_string(),
    })
}

fn validate_formation(
    kind: String,
    entry: FormationEntry,
    policy: &PolicyConfig,
) -> Result<FormationSpec, AppError> {
    if !FORMATION_TYPE.is_match(&kind) {
        return Err(invalid(format!(
            "The formation type {:?} is invalid; use lowercase letters and numbers.",
            kind
        )));
    }

    let quantity = entry.quantity.unwrap_or(1);
    if quantity < 0 || quantity > i64::from(policy.max_formation_quantity) {
        return Err(invalid(format!(
            "The formation {} quantity {} must be between 0 and {}.",
            kind, quantity, policy.max_formation_quantity
        )));
    }

    let size = entry
        .size
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| policy.default_formation_size.clone());
    let size = size.strip_suffix("-prod").unwrap_or(&size).to_string();
    if !FORMATION_SIZE.is_match(&size) {
        return Err(invalid(format!("The formation {} size {:?} is invalid.", kind, size)));
    }

    let port = match entry.port {
        None => None,
        Some(port) if (1..=65535).contains(&port) => Some(port as u16),
        Some(port) => {
            return Err(invalid(format!(
                "The formation {} port {} must be between 1 and 65535.",
                kind, port
            )))
        }
    };

    Ok(FormationSpec {
        kind,
        quantity: quantity as u32,
        size,
        port,
        command: entry.command.filter(|c| !c.trim().is_empty()),
        health_check: entry.health_check.filter(|h| !h.trim().is_empty()),
    })
}
