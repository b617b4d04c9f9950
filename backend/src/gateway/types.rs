//! Parameters for platform mutations

use serde::{Deserialize, Serialize};

/// A formation (process type) to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationSpec {
    /// Process type, e.g. `web` or `worker`
    #[serde(rename = "type")]
    pub kind: String,
    /// Number of instances
    pub quantity: u32,
    /// Instance size (plan)
    pub size: String,
    /// Listening port, for web formations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Command override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Health check path
    #[serde(rename = "healthcheck", skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
}

/// An addon to provision, identified by `service:plan`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonSpec {
    /// Plan name, e.g. `postgresql:hobby`
    pub plan: String,
}

impl AddonSpec {
    /// Service portion of the plan (`postgresql` for `postgresql:hobby`)
    pub fn service(&self) -> &str {
        self.plan.split(':').next().unwrap_or(&self.plan)
    }
}

/// An existing addon to attach to the app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSpec {
    /// Addon id or name
    pub addon: String,
}

/// The initial build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Source blob URL
    pub url: String,
}

/// A log drain destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDrainSpec {
    /// Drain URL
    pub url: String,
}

/// A pipeline coupling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCouplingSpec {
    /// Pipeline name
    pub pipeline: String,
    /// Stage within the pipeline
    pub stage: String,
}

/// A build as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Build id
    pub id: String,
    /// `queued`, `pending`, `succeeded` or `failed`
    pub status: String,
    /// Source blob the build was made from
    pub url: String,
    /// Source blob checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Source blob version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// RFC 3339
    #[serde(default)]
    pub created_at: String,
}

/// A log drain as reported by the log shuttle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDrainRecord {
    /// Drain URL
    pub url: String,
    /// Token the shuttle stamps on forwarded lines
    #[serde(default)]
    pub token: Option<String>,
}
