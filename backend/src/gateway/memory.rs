//! In-process platform
//!
//! Keeps config sets, service-owned vars and provisioned resources in memory
//! and records every mutating call in order. Used when no platform API is configured and as the
//! collaborator double in tests.

use crate::config_vars::{ConfigMap, ConfigMutation};
use crate::error::AppError;
use crate::gateway::types::{
    AddonSpec, AttachmentSpec, BuildRecord, BuildSpec, FormationSpec, LogDrainRecord,
    LogDrainSpec, PipelineCouplingSpec,
};
use crate::gateway::{
    ConfigStateProvider, GatewayError, NotificationSink, PlatformGateway, PlatformInventory,
    RedeployTrigger,
};
use crate::state::AppTarget;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Resources created for one app
#[derive(Default, Clone)]
struct Provisioned {
    formations: Vec<FormationSpec>,
    addons: Vec<AddonSpec>,
    attachments: Vec<AttachmentSpec>,
    builds: Vec<BuildRecord>,
    drains: Vec<LogDrainRecord>,
    couplings: Vec<PipelineCouplingSpec>,
}

#[derive(Default)]
struct Inner {
    provisioned: HashMap<String, Provisioned>,
    calls: Vec<String>,
    user_config: HashMap<String, ConfigMap>,
    service_config: HashMap<String, ConfigMap>,
    failures: Vec<(String, GatewayError)>,
    events: Vec<(String, String, Value)>,
}

/// Recorded event: app key, event type and payload
pub type RecordedEvent = (String, String, Value);

/// Platform double holding all state in memory
#[derive(Default)]
pub struct InMemoryPlatform {
    inner: Mutex<Inner>,
}

impl InMemoryPlatform {
    /// Empty platform with no apps, vars or failures
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // state stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail every call whose label starts with `prefix`
    ///
    /// Labels look like `formation:web`, `addon:postgresql:hobby`,
    /// `config:create:KEY` or `redeploy:api-default`.
    pub fn fail_on(&self, prefix: &str, error: GatewayError) {
        self.lock().failures.push((prefix.to_string(), error));
    }

    /// Replace the user vars of `app`
    pub fn seed_user_config(&self, app: &AppTarget, vars: ConfigMap) {
        self.lock().user_config.insert(app.key(), vars);
    }

    /// Replace the service-owned vars of `app`
    pub fn seed_service_config(&self, app: &AppTarget, vars: ConfigMap) {
        self.lock().service_config.insert(app.key(), vars);
    }

    /// Stored user vars, unredacted
    pub fn user_config(&self, app: &AppTarget) -> ConfigMap {
        self.lock()
            .user_config
            .get(&app.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Labels of every mutating call, in issue order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Labels of config var mutations only
    pub fn config_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("config:"))
            .collect()
    }

    /// Notifications received, in order
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().events.clone()
    }

    /// Record the call and return the injected failure, if any
    fn record(&self, label: String) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        let failure = inner
            .failures
            .iter()
            .find(|(prefix, _)| label.starts_with(prefix.as_str()))
            .map(|(_, err)| err.clone());
        tracing::debug!(call = %label, failed = failure.is_some(), "In-memory platform call");
        inner.calls.push(label);
        failure.map_or(Ok(()), Err)
    }

    fn provisioned(&self, app: &AppTarget) -> Provisioned {
        self.lock()
            .provisioned
            .get(&app.key())
            .cloned()
            .unwrap_or_default()
    }

    fn provision(&self, app: &AppTarget, update: impl FnOnce(&mut Provisioned)) {
        update(self.lock().provisioned.entry(app.key()).or_default());
    }
}

#[async_trait]
impl PlatformGateway for InMemoryPlatform {
    async fn create_formation(
        &self,
        app: &AppTarget,
        formation: &FormationSpec,
    ) -> Result<Value, GatewayError> {
        self.record(format!("formation:{}", formation.kind))?;
        self.provision(app, |p| p.formations.push(formation.clone()));
        Ok(json!({ "app": app.key(), "type": formation.kind, "quantity": formation.quantity }))
    }

    async fn create_addon(
        &self,
        app: &AppTarget,
        addon: &AddonSpec,
    ) -> Result<Value, GatewayError> {
        self.record(format!("addon:{}", addon.plan))?;
        self.provision(app, |p| p.addons.push(addon.clone()));
        Ok(json!({ "app": app.key(), "plan": addon.plan }))
    }

    async fn create_attachment(
        &self,
        app: &AppTarget,
        attachment: &AttachmentSpec,
    ) -> Result<Value, GatewayError> {
        self.record(format!("attachment:{}", attachment.addon))?;
        self.provision(app, |p| p.attachments.push(attachment.clone()));
        Ok(json!({ "app": app.key(), "addon": attachment.addon }))
    }

    async fn create_build(&self, app: &AppTarget, build: &BuildSpec) -> Result<Value, GatewayError> {
        self.record(format!("build:{}", build.url))?;
        let record = BuildRecord {
            id: Uuid::new_v4().to_string(),
            status: "queued".to_string(),
            url: build.url.clone(),
            checksum: None,
            version: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let id = record.id.clone();
        self.provision(app, |p| p.builds.push(record));
        Ok(json!({ "app": app.key(), "id": id, "status": "queued" }))
    }

    async fn create_log_drain(
        &self,
        app: &AppTarget,
        drain: &LogDrainSpec,
    ) -> Result<Value, GatewayError> {
        self.record(format!("log-drain:{}", drain.url))?;
        self.provision(app, |p| {
            p.drains.push(LogDrainRecord {
                url: drain.url.clone(),
                token: Some(app.key()),
            })
        });
        Ok(json!({ "app": app.key(), "url": drain.url }))
    }

    async fn create_pipeline_coupling(
        &self,
        app: &AppTarget,
        coupling: &PipelineCouplingSpec,
    ) -> Result<Value, GatewayError> {
        self.record(format!(
            "pipeline-coupling:{}:{}",
            coupling.pipeline, coupling.stage
        ))?;
        self.provision(app, |p| p.couplings.push(coupling.clone()));
        Ok(json!({ "app": app.key(), "pipeline": coupling.pipeline, "stage": coupling.stage }))
    }

    async fn apply_config_var(
        &self,
        app: &AppTarget,
        key: &str,
        mutation: &ConfigMutation,
    ) -> Result<(), GatewayError> {
        let verb = match mutation {
            ConfigMutation::Create(_) => "create",
            ConfigMutation::Update(_) => "update",
            ConfigMutation::Delete => "delete",
        };
        self.record(format!("config:{}:{}", verb, key))?;

        let mut inner = self.lock();
        let vars = inner.user_config.entry(app.key()).or_default();
        match mutation {
            ConfigMutation::Create(value) | ConfigMutation::Update(value) => {
                vars.insert(key.to_string(), value.clone());
            }
            ConfigMutation::Delete => {
                vars.remove(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStateProvider for InMemoryPlatform {
    async fn current_user_state(&self, app: &AppTarget) -> Result<ConfigMap, GatewayError> {
        Ok(self.user_config(app))
    }

    async fn service_owned_state(&self, app: &AppTarget) -> Result<ConfigMap, GatewayError> {
        Ok(self
            .lock()
            .service_config
            .get(&app.key())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl NotificationSink for InMemoryPlatform {
    async fn notify(
        &self,
        app: &AppTarget,
        event_type: &str,
        payload: Value,
    ) -> Result<(), AppError> {
        self.record(format!("notify:{}", event_type))?;
        self.lock()
            .events
            .push((app.key(), event_type.to_string(), payload));
        Ok(())
    }
}

#[async_trait]
impl RedeployTrigger for InMemoryPlatform {
    async fn schedule_redeploy(&self, app: &AppTarget, reason: &str) -> Result<(), GatewayError> {
        tracing::info!(app = %app.key(), reason = %reason, "Redeploy scheduled");
        self.record(format!("redeploy:{}", app.key()))
    }
}

#[async_trait]
impl PlatformInventory for InMemoryPlatform {
    async fn list_formations(&self, app: &AppTarget) -> Result<Vec<FormationSpec>, GatewayError> {
        Ok(self.provisioned(app).formations)
    }

    async fn list_addons(&self, app: &AppTarget) -> Result<Vec<AddonSpec>, GatewayError> {
        Ok(self.provisioned(app).addons)
    }

    async fn list_attachments(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<AttachmentSpec>, GatewayError> {
        Ok(self.provisioned(app).attachments)
    }

    async fn latest_build(&self, app: &AppTarget) -> Result<Option<BuildRecord>, GatewayError> {
        Ok(self.provisioned(app).builds.pop())
    }

    async fn list_log_drains(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<LogDrainRecord>, GatewayError> {
        Ok(self.provisioned(app).drains)
    }

    async fn list_pipeline_couplings(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<PipelineCouplingSpec>, GatewayError> {
        Ok(self.provisioned(app).couplings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn app() -> AppTarget {
        AppTarget {
            id: Uuid::new_v4(),
            name: "api".to_string(),
            space: "default".to_string(),
            org: "acme".to_string(),
            space_tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_config_mutations_update_user_state() {
        let platform = InMemoryPlatform::new();
        let target = app();

        platform
            .apply_config_var(&target, "A", &ConfigMutation::Create("1".into()))
            .await
            .unwrap();
        platform
            .apply_config_var(&target, "A", &ConfigMutation::Update("2".into()))
            .await
            .unwrap();
        platform
            .apply_config_var(&target, "B", &ConfigMutation::Create("3".into()))
            .await
            .unwrap();
        platform
            .apply_config_var(&target, "B", &ConfigMutation::Delete)
            .await
            .unwrap();

        let state = platform.current_user_state(&target).await.unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("A").map(String::as_str), Some("2"));
        assert_eq!(
            platform.config_calls(),
            vec!["config:create:A", "config:update:A", "config:create:B", "config:delete:B"]
        );
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded_and_returned() {
        let platform = InMemoryPlatform::new();
        platform.fail_on(
            "addon:",
            GatewayError::Status {
                status: 422,
                body: "unknown plan".into(),
            },
        );

        let err = platform
            .create_addon(&app(), &AddonSpec { plan: "x:small".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Status { status: 422, .. }));
        assert_eq!(platform.calls(), vec!["addon:x:small"]);
    }

    #[tokio::test]
    async fn test_failed_config_mutation_leaves_state_untouched() {
        let platform = InMemoryPlatform::new();
        let target = app();
        platform.fail_on("config:create:A", GatewayError::Transport("reset".into()));

        assert!(platform
            .apply_config_var(&target, "A", &ConfigMutation::Create("1".into()))
            .await
            .is_err());
        assert!(platform.user_config(&target).is_empty());
    }

    #[tokio::test]
    async fn test_inventory_lists_only_successful_creations() {
        let platform = InMemoryPlatform::new();
        let target = app();
        platform.fail_on("addon:redis:", GatewayError::Transport("reset".into()));

        platform
            .create_addon(&target, &AddonSpec { plan: "postgresql:hobby".into() })
            .await
            .unwrap();
        assert!(platform
            .create_addon(&target, &AddonSpec { plan: "redis:small".into() })
            .await
            .is_err());
        platform
            .create_build(&target, &BuildSpec { url: "https://blobs.local/1.tgz".into() })
            .await
            .unwrap();
        platform
            .create_build(&target, &BuildSpec { url: "https://blobs.local/2.tgz".into() })
            .await
            .unwrap();

        let addons = platform.list_addons(&target).await.unwrap();
        assert_eq!(addons, vec![AddonSpec { plan: "postgresql:hobby".into() }]);

        let latest = platform.latest_build(&target).await.unwrap().unwrap();
        assert_eq!(latest.url, "https://blobs.local/2.tgz");
        assert_eq!(latest.status, "queued");

        assert!(platform.list_formations(&target).await.unwrap().is_empty());
        assert!(platform.list_log_drains(&target).await.unwrap().is_empty());
    }
}
