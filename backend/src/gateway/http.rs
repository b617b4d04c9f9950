//! HTTP implementation of the platform collaborators
//!
//! Stack APIs own apps, formations, builds and config sets; region APIs own
//! service instances and bindings. Each space names its stack and region, and
//! `<NAME>_STACK_API` / `<NAME>_REGION_API` map those names to base URLs.

use crate::config::{api_override, PlatformConfig};
use crate::config_vars::{ConfigMap, ConfigMutation};
use crate::gateway::cache::{RouteCache, SpaceRoutes};
use crate::gateway::types::{
    AddonSpec, AttachmentSpec, BuildRecord, BuildSpec, FormationSpec, LogDrainRecord,
    LogDrainSpec, PipelineCouplingSpec,
};
use crate::gateway::{
    ConfigStateProvider, GatewayError, PlatformGateway, PlatformInventory, RedeployTrigger,
};
use crate::state::{AppTarget, SpaceDirectory};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Entry of a platform config set
#[derive(Debug, Deserialize)]
struct ConfigSetEntry {
    varname: String,
    #[serde(default)]
    varvalue: Option<String>,
}

/// Platform client speaking to stack, region and log shuttle APIs
pub struct HttpPlatformGateway {
    client: reqwest::Client,
    default_api: Option<String>,
    log_shuttle: Option<String>,
    spaces: Arc<dyn SpaceDirectory>,
    routes: RouteCache,
}

impl HttpPlatformGateway {
    /// Build a client from the platform configuration
    pub fn new(config: &PlatformConfig, spaces: Arc<dyn SpaceDirectory>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build platform HTTP client")?;

        Ok(Self {
            client,
            default_api: config.api_url.clone(),
            log_shuttle: config.log_shuttle_url.clone(),
            spaces,
            routes: RouteCache::new(config.route_cache_ttl),
        })
    }

    /// Forget the cached routes of a space (after its stack or region changed)
    pub async fn bust_routes(&self, space: &str) -> bool {
        self.routes.invalidate(space).await
    }

    async fn routes(&self, space: &str) -> Result<SpaceRoutes, GatewayError> {
        if let Some(routes) = self.routes.get(space).await {
            return Ok(routes);
        }

        let names = self
            .spaces
            .space_route(space)
            .await
            .map_err(|e| GatewayError::Transport(format!("Space lookup failed: {}", e)))?;

        let resolved = match names {
            Some(names) => {
                let stack_api = api_override(&names.stack, "STACK").or_else(|| self.default_api.clone());
                let region_api =
                    api_override(&names.region, "REGION").or_else(|| self.default_api.clone());
                match (stack_api, region_api) {
                    (Some(stack_api), Some(region_api)) => SpaceRoutes {
                        stack_api,
                        region_api,
                    },
                    _ => return Err(GatewayError::NoRoute(space.to_string())),
                }
            }
            None => match &self.default_api {
                Some(api) => SpaceRoutes {
                    stack_api: api.clone(),
                    region_api: api.clone(),
                },
                None => return Err(GatewayError::NoRoute(space.to_string())),
            },
        };

        tracing::debug!(space = %space, stack = %resolved.stack_api, region = %resolved.region_api, "Resolved space routes");
        self.routes.insert(space, resolved.clone()).await;
        Ok(resolved)
    }

    fn log_shuttle_api(&self, routes: &SpaceRoutes) -> String {
        self.log_shuttle
            .clone()
            .unwrap_or_else(|| routes.stack_api.clone())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::warn!(
                status_code = status.as_u16(),
                error_body = %body,
                "Platform returned error status"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body)))
    }

    async fn post(&self, url: String, body: Value) -> Result<Value, GatewayError> {
        tracing::debug!(url = %url, "POST platform");
        self.send(self.client.post(&url).json(&body)).await
    }

    /// GET a JSON array; a 404 or an empty body reads as an empty list
    async fn get_list<T: DeserializeOwned>(
        &self,
        url: String,
        what: &str,
    ) -> Result<Vec<T>, GatewayError> {
        tracing::debug!(url = %url, "GET platform");
        let value = match self.send(self.client.get(&url)).await {
            Ok(Value::Null) => return Ok(Vec::new()),
            Ok(value) => value,
            Err(GatewayError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e),
        };
        serde_json::from_value(value)
            .map_err(|e| GatewayError::InvalidResponse(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl PlatformGateway for HttpPlatformGateway {
    async fn create_formation(
        &self,
        app: &AppTarget,
        formation: &FormationSpec,
    ) -> Result<Value, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/formation",
            routes.stack_api, app.space, app.name
        );
        let body = serde_json::to_value(formation)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        self.post(url, body).await
    }

    async fn create_addon(
        &self,
        app: &AppTarget,
        addon: &AddonSpec,
    ) -> Result<Value, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!("{}/v1/service/{}/instance", routes.region_api, addon.service());
        self.post(
            url,
            json!({
                "plan": addon.plan,
                "billingcode": app.org,
                "app": app.key(),
            }),
        )
        .await
    }

    async fn create_attachment(
        &self,
        app: &AppTarget,
        attachment: &AttachmentSpec,
    ) -> Result<Value, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/bind",
            routes.region_api, app.space, app.name
        );
        self.post(url, json!({ "addon": attachment.addon })).await
    }

    async fn create_build(&self, app: &AppTarget, build: &BuildSpec) -> Result<Value, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/build",
            routes.stack_api, app.space, app.name
        );
        self.post(url, json!({ "url": build.url })).await
    }

    async fn create_log_drain(
        &self,
        app: &AppTarget,
        drain: &LogDrainSpec,
    ) -> Result<Value, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!("{}/apps/{}/log-drains", self.log_shuttle_api(&routes), app.key());
        self.post(url, json!({ "url": drain.url })).await
    }

    async fn create_pipeline_coupling(
        &self,
        app: &AppTarget,
        coupling: &PipelineCouplingSpec,
    ) -> Result<Value, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/pipeline/{}/couplings",
            routes.stack_api, coupling.pipeline
        );
        self.post(
            url,
            json!({
                "app": app.key(),
                "stage": coupling.stage,
            }),
        )
        .await
    }

    async fn apply_config_var(
        &self,
        app: &AppTarget,
        key: &str,
        mutation: &ConfigMutation,
    ) -> Result<(), GatewayError> {
        let routes = self.routes(&app.space).await?;
        let entry = |value: &str| {
            json!([{
                "setname": app.key(),
                "varname": key,
                "varvalue": value,
            }])
        };

        let request = match mutation {
            ConfigMutation::Create(value) => self
                .client
                .post(format!("{}/v1/config/set/configvar", routes.stack_api))
                .json(&entry(value)),
            ConfigMutation::Update(value) => self
                .client
                .request(
                    Method::PATCH,
                    format!("{}/v1/config/set/configvar", routes.stack_api),
                )
                .json(&entry(value)),
            ConfigMutation::Delete => self.client.delete(format!(
                "{}/v1/config/set/{}/configvar/{}",
                routes.stack_api,
                app.key(),
                key
            )),
        };

        tracing::debug!(app = %app.key(), key = %key, change = ?mutation.change_type(), "Applying config var");
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl ConfigStateProvider for HttpPlatformGateway {
    async fn current_user_state(&self, app: &AppTarget) -> Result<ConfigMap, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!("{}/v1/config/set/{}", routes.stack_api, app.key());

        let value = match self.send(self.client.get(&url)).await {
            Ok(value) => value,
            // a missing set means the app has no user vars yet
            Err(GatewayError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(ConfigMap::new())
            }
            Err(e) => return Err(e),
        };

        if value.is_null() {
            return Ok(ConfigMap::new());
        }
        let entries: Vec<ConfigSetEntry> = serde_json::from_value(value)
            .map_err(|e| GatewayError::InvalidResponse(format!("config set: {}", e)))?;

        Ok(entries
            .into_iter()
            .map(|entry| (entry.varname, entry.varvalue.unwrap_or_default()))
            .collect())
    }

    async fn service_owned_state(&self, app: &AppTarget) -> Result<ConfigMap, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/service-config",
            routes.region_api, app.space, app.name
        );

        match self.send(self.client.get(&url)).await? {
            Value::Null => Ok(ConfigMap::new()),
            Value::Object(vars) => Ok(vars
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(s) => (key, s),
                    other => (key, other.to_string()),
                })
                .collect()),
            other => Err(GatewayError::InvalidResponse(format!(
                "service config must be an object, got {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl RedeployTrigger for HttpPlatformGateway {
    async fn schedule_redeploy(&self, app: &AppTarget, reason: &str) -> Result<(), GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/restart",
            routes.stack_api, app.space, app.name
        );
        self.post(url, json!({ "reason": reason })).await.map(|_| ())
    }
}

#[async_trait]
impl PlatformInventory for HttpPlatformGateway {
    async fn list_formations(&self, app: &AppTarget) -> Result<Vec<FormationSpec>, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/formation",
            routes.stack_api, app.space, app.name
        );
        self.get_list(url, "formations").await
    }

    async fn list_addons(&self, app: &AppTarget) -> Result<Vec<AddonSpec>, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!("{}/v1/service/instances?app={}", routes.region_api, app.key());
        self.get_list(url, "addons").await
    }

    async fn list_attachments(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<AttachmentSpec>, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/bind",
            routes.region_api, app.space, app.name
        );
        self.get_list(url, "attachments").await
    }

    async fn latest_build(&self, app: &AppTarget) -> Result<Option<BuildRecord>, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!(
            "{}/v1/space/{}/app/{}/build",
            routes.stack_api, app.space, app.name
        );
        let builds: Vec<BuildRecord> = self.get_list(url, "builds").await?;
        // RFC 3339 UTC timestamps sort lexicographically
        Ok(builds.into_iter().max_by(|a, b| a.created_at.cmp(&b.created_at)))
    }

    async fn list_log_drains(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<LogDrainRecord>, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!("{}/apps/{}/log-drains", self.log_shuttle_api(&routes), app.key());
        self.get_list(url, "log drains").await
    }

    async fn list_pipeline_couplings(
        &self,
        app: &AppTarget,
    ) -> Result<Vec<PipelineCouplingSpec>, GatewayError> {
        let routes = self.routes(&app.space).await?;
        let url = format!("{}/v1/pipeline-couplings?app={}", routes.stack_api, app.key());
        self.get_list(url, "pipeline couplings").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::state::SpaceRouteNames;
    use mockito::Matcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    /// Directory that knows one space and counts lookups
    struct OneSpace {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl SpaceDirectory for OneSpace {
        async fn space_route(&self, space: &str) -> Result<Option<SpaceRouteNames>, AppError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok((space == "default").then(|| SpaceRouteNames {
                stack: "gateway-test-stack".to_string(),
                region: "gateway-test-region".to_string(),
            }))
        }
    }

    fn gateway(api_url: Option<String>) -> (HttpPlatformGateway, Arc<OneSpace>) {
        let spaces = Arc::new(OneSpace {
            lookups: AtomicUsize::new(0),
        });
        let config = PlatformConfig {
            api_url,
            log_shuttle_url: None,
            request_timeout: Duration::from_secs(5),
            route_cache_ttl: Duration::from_secs(60),
        };
        (
            HttpPlatformGateway::new(&config, spaces.clone()).unwrap(),
            spaces,
        )
    }

    fn app(space: &str) -> AppTarget {
        AppTarget {
            id: Uuid::new_v4(),
            name: "api".to_string(),
            space: space.to_string(),
            org: "acme".to_string(),
            space_tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_current_user_state_parses_config_set() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/config/set/api-default")
            .with_status(200)
            .with_body(r#"[{"varname":"FOO","varvalue":"bar"},{"varname":"EMPTY"}]"#)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let state = gateway.current_user_state(&app("default")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(state.get("FOO").map(String::as_str), Some("bar"));
        assert_eq!(state.get("EMPTY").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_missing_config_set_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/config/set/api-default")
            .with_status(404)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        assert!(gateway
            .current_user_state(&app("default"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_config_mutations_use_matching_verbs() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/v1/config/set/configvar")
            .match_body(Matcher::Json(json!([
                {"setname": "api-default", "varname": "NEW", "varvalue": "1"}
            ])))
            .with_status(201)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/v1/config/set/configvar")
            .with_status(200)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/v1/config/set/api-default/configvar/OLD")
            .with_status(200)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let target = app("default");
        gateway
            .apply_config_var(&target, "NEW", &ConfigMutation::Create("1".into()))
            .await
            .unwrap();
        gateway
            .apply_config_var(&target, "CUR", &ConfigMutation::Update("2".into()))
            .await
            .unwrap();
        gateway
            .apply_config_var(&target, "OLD", &ConfigMutation::Delete)
            .await
            .unwrap();

        create.assert_async().await;
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/space/default/app/api/build")
            .with_status(503)
            .with_body("stack unavailable")
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let err = gateway
            .create_build(
                &app("default"),
                &BuildSpec {
                    url: "https://blobs/app.tgz".into(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GatewayError::Status {
                status: 503,
                body: "stack unavailable".into()
            }
        );
    }

    #[tokio::test]
    async fn test_addon_goes_to_service_instance_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/service/postgresql/instance")
            .match_body(Matcher::PartialJson(json!({"plan": "postgresql:hobby"})))
            .with_status(201)
            .with_body(r#"{"id":"addon-1"}"#)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let created = gateway
            .create_addon(
                &app("default"),
                &AddonSpec {
                    plan: "postgresql:hobby".into(),
                },
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created["id"], "addon-1");
    }

    #[tokio::test]
    async fn test_service_owned_state_reads_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/space/default/app/api/service-config")
            .with_status(200)
            .with_body(r#"{"DATABASE_URL":"postgres://db","POOL":5}"#)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let owned = gateway.service_owned_state(&app("default")).await.unwrap();
        assert_eq!(owned.get("DATABASE_URL").map(String::as_str), Some("postgres://db"));
        assert_eq!(owned.get("POOL").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn test_routes_are_cached_until_busted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/space/default/app/api/restart")
            .with_status(200)
            .expect(3)
            .create_async()
            .await;

        let (gateway, spaces) = gateway(Some(server.url()));
        let target = app("default");
        gateway.schedule_redeploy(&target, "test").await.unwrap();
        gateway.schedule_redeploy(&target, "test").await.unwrap();
        assert_eq!(spaces.lookups.load(Ordering::SeqCst), 1);

        assert!(gateway.bust_routes("default").await);
        gateway.schedule_redeploy(&target, "test").await.unwrap();
        assert_eq!(spaces.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unroutable_space_without_default_api() {
        let (gateway, _) = gateway(None);
        let err = gateway
            .current_user_state(&app("nowhere"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NoRoute("nowhere".into()));
    }

    #[tokio::test]
    async fn test_latest_build_picks_newest() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/space/default/app/api/build")
            .with_status(200)
            .with_body(
                r#"[
                    {"id":"b1","status":"succeeded","url":"https://blobs/1.tgz","created_at":"2024-01-01T00:00:00Z"},
                    {"id":"b3","status":"failed","url":"https://blobs/3.tgz","created_at":"2024-03-01T00:00:00Z"},
                    {"id":"b2","status":"succeeded","url":"https://blobs/2.tgz","created_at":"2024-02-01T00:00:00Z"}
                ]"#,
            )
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let latest = gateway.latest_build(&app("default")).await.unwrap().unwrap();
        assert_eq!(latest.id, "b3");
        assert_eq!(latest.status, "failed");
    }

    #[tokio::test]
    async fn test_inventory_reads_missing_lists_as_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apps/api-default/log-drains")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/space/default/app/api/build")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let target = app("default");
        assert!(gateway.list_log_drains(&target).await.unwrap().is_empty());
        assert!(gateway.latest_build(&target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_addons_are_listed_by_app_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/service/instances")
            .match_query(Matcher::UrlEncoded("app".into(), "api-default".into()))
            .with_status(200)
            .with_body(r#"[{"plan":"postgresql:hobby"}]"#)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let addons = gateway.list_addons(&app("default")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(addons.len(), 1);
        assert_eq!(addons[0].service(), "postgresql");
    }

    #[tokio::test]
    async fn test_malformed_inventory_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/space/default/app/api/formation")
            .with_status(200)
            .with_body(r#"{"not":"a list"}"#)
            .create_async()
            .await;

        let (gateway, _) = gateway(Some(server.url()));
        let err = gateway.list_formations(&app("default")).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
