// Domain records shared by the setup workflow, the config engine and the store

use crate::executor::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Space tag that switches an app into compliance mode
pub const COMPLIANCE_TAG: &str = "compliance=socs";

/// A registered application and the space it runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTarget {
    /// App id
    pub id: Uuid,
    /// App name (unique within its space)
    pub name: String,
    /// Space name
    pub space: String,
    /// Owning organization
    pub org: String,
    /// Tags of the owning space
    #[serde(default)]
    pub space_tags: Vec<String>,
}

impl AppTarget {
    /// `<name>-<space>`, the key the platform uses for the app
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.space)
    }

    /// Whether responses for this app must be redacted
    pub fn is_compliance(&self) -> bool {
        self.space_tags.iter().any(|t| t == COMPLIANCE_TAG)
    }
}

/// A space and the named stack/region serving it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRecord {
    /// Space name
    pub name: String,
    /// Stack name, resolved to an API through `<STACK>_STACK_API`
    pub stack: String,
    /// Region name, resolved to an API through `<REGION>_REGION_API`
    pub region: String,
    /// Space tags, e.g. `compliance=socs`
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Persisted state of one setup run
#[derive(Debug, Clone, PartialEq)]
pub struct SetupRecord {
    /// Setup id (also the run id)
    pub id: Uuid,
    /// App being set up
    pub app_id: Uuid,
    /// Name of that app
    pub app_name: String,
    /// Completed fraction, 0.0 to 1.0
    pub progress: f64,
    /// Lifecycle state
    pub status: RunStatus,
    /// Summary of failed steps, empty unless failed
    pub failure_message: String,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub updated_at: i64,
}

/// Reference to an app inside an API response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRef {
    /// App id
    pub id: Uuid,
    /// App name
    pub name: String,
}

/// Latest build of the app being set up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupBuild {
    /// `None` while the build step has not run yet
    pub id: Option<String>,
    /// Build status as reported by the platform
    pub status: String,
    /// Where the build output can be followed
    pub output_stream_url: Option<String>,
}

impl SetupBuild {
    /// Placeholder for a build that has not been started yet
    pub fn queued() -> Self {
        Self {
            id: None,
            status: "queued".to_string(),
            output_stream_url: None,
        }
    }
}

/// Public view of a setup run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct SetupStatus {
    pub id: Uuid,
    pub app: AppRef,
    pub progress: f64,
    pub status: RunStatus,
    pub failure_message: String,
    /// Omitted when the app has no build yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<SetupBuild>,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub updated_at: String,
}

impl From<SetupRecord> for SetupStatus {
    fn from(record: SetupRecord) -> Self {
        Self {
            id: record.id,
            app: AppRef {
                id: record.app_id,
                name: record.app_name,
            },
            progress: record.progress,
            status: record.status,
            failure_message: record.failure_message,
            build: None,
            created_at: to_rfc3339(record.created_at),
            updated_at: to_rfc3339(record.updated_at),
        }
    }
}

fn to_rfc3339(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(tags: &[&str]) -> AppTarget {
        AppTarget {
            id: Uuid::new_v4(),
            name: "api".to_string(),
            space: "default".to_string(),
            org: "acme".to_string(),
            space_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_app_key_joins_name_and_space() {
        assert_eq!(target(&[]).key(), "api-default");
    }

    #[test]
    fn test_compliance_requires_exact_tag() {
        assert!(target(&["internal", COMPLIANCE_TAG]).is_compliance());
        assert!(!target(&["compliance=other"]).is_compliance());
        assert!(!target(&[]).is_compliance());
    }

    #[test]
    fn test_setup_status_from_record() {
        let record = SetupRecord {
            id: Uuid::new_v4(),
            app_id: Uuid::new_v4(),
            app_name: "api".to_string(),
            progress: 0.5,
            status: RunStatus::Running,
            failure_message: String::new(),
            created_at: 0,
            updated_at: 60,
        };

        let status = SetupStatus::from(record.clone());
        assert_eq!(status.app.name, "api");
        assert_eq!(status.app.id, record.app_id);
        assert_eq!(status.created_at, "1970-01-01T00:00:00+00:00");
        assert_eq!(status.updated_at, "1970-01-01T00:01:00+00:00");
    }
}
