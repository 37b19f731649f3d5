//! Kong admin API client
//!
//! Implements the Kong 0.x admin API: `/apis/`, `/apis/{api}/plugins/` and
//! `/upstreams/{upstream}/targets`.

use crate::common::{HttpClient, segment};
use crate::error::KongError;
use crate::kong_trait::KongClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Kong admin API client
#[derive(Clone)]
pub struct KongClient {
    http: HttpClient,
}

impl std::fmt::Debug for KongClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KongClient")
            .field("base_url", &self.http.base_url())
            .finish()
    }
}

impl KongClient {
    /// Create a new Kong client
    ///
    /// # Arguments
    /// * `base_url` - admin API base URL (e.g., "http://kong:8001")
    /// * `timeout` - per-request timeout; `None` leaves requests unbounded
    pub fn new(base_url: String, timeout: Option<Duration>) -> Result<Self, KongError> {
        if base_url.trim().is_empty() {
            return Err(KongError::InvalidRequest("Kong base URL is empty".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url),
        })
    }

    /// Find the id of the plugin named `plugin_name` attached to `api`
    async fn plugin_id(&self, api: &str, plugin_name: &str) -> Result<String, KongError> {
        let plugins = self.list_plugins(api).await?;
        plugins
            .data
            .into_iter()
            .find(|p| p.name == plugin_name)
            .and_then(|p| p.id)
            .ok_or_else(|| {
                KongError::NotFound(format!("plugin {} is not attached to API {}", plugin_name, api))
            })
    }
}

#[async_trait::async_trait]
impl KongClientTrait for KongClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn status(&self) -> Result<(), KongError> {
        debug!("Checking Kong admin API connectivity");
        let _: serde_json::Value = self.http.get("/status").await?;
        Ok(())
    }

    async fn create_api(&self, api: &Api) -> Result<Api, KongError> {
        if api.name.is_empty() {
            return Err(KongError::InvalidRequest("API name is required".to_string()));
        }
        self.http.post("/apis/", api).await
    }

    async fn get_api(&self, name_or_id: &str) -> Result<Api, KongError> {
        self.http.get(&format!("/apis/{}", segment(name_or_id))).await
    }

    async fn update_api(&self, api: &Api) -> Result<Api, KongError> {
        self.http
            .put(&format!("/apis/{}", segment(api.name_or_id())), api)
            .await
    }

    async fn delete_api(&self, name_or_id: &str) -> Result<(), KongError> {
        self.http.delete(&format!("/apis/{}", segment(name_or_id))).await
    }

    async fn create_upstream(&self, upstream: &Upstream) -> Result<Upstream, KongError> {
        self.http.post("/upstreams/", upstream).await
    }

    async fn get_upstream(&self, name_or_id: &str) -> Result<Upstream, KongError> {
        self.http
            .get(&format!("/upstreams/{}", segment(name_or_id)))
            .await
    }

    async fn delete_upstream(&self, name_or_id: &str) -> Result<(), KongError> {
        self.http
            .delete(&format!("/upstreams/{}", segment(name_or_id)))
            .await
    }

    async fn create_target(&self, upstream: &str, target: &Target) -> Result<Target, KongError> {
        self.http
            .post(&format!("/upstreams/{}/targets", segment(upstream)), target)
            .await
    }

    async fn list_targets(&self, upstream: &str) -> Result<TargetList, KongError> {
        self.http
            .get(&format!("/upstreams/{}/targets", segment(upstream)))
            .await
    }

    async fn list_plugins(&self, api: &str) -> Result<PluginList, KongError> {
        self.http
            .get(&format!("/apis/{}/plugins/", segment(api)))
            .await
    }

    async fn add_plugin(&self, api: &str, plugin: &Plugin) -> Result<Plugin, KongError> {
        self.http
            .post(&format!("/apis/{}/plugins/", segment(api)), plugin)
            .await
    }

    async fn update_plugin(&self, api: &str, plugin: &Plugin) -> Result<Plugin, KongError> {
        let id = self.plugin_id(api, &plugin.name).await?;
        let body = serde_json::json!({
            "name": plugin.name,
            "config": plugin.config,
            "enabled": plugin.enabled,
        });
        self.http
            .patch(&format!("/apis/{}/plugins/{}", segment(api), segment(&id)), &body)
            .await
    }

    async fn remove_plugin(&self, api: &str, plugin_name: &str) -> Result<(), KongError> {
        let id = self.plugin_id(api, plugin_name).await?;
        self.http
            .delete(&format!("/apis/{}/plugins/{}", segment(api), segment(&id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_base_url() {
        let err = KongClient::new("  ".to_string(), None).unwrap_err();
        assert!(matches!(err, KongError::InvalidRequest(_)));
    }

    #[test]
    fn trims_trailing_slash() {
        let client = KongClient::new("http://kong:8001/".to_string(), Some(Duration::from_secs(5))).unwrap();
        assert_eq!(client.base_url(), "http://kong:8001");
    }
}
