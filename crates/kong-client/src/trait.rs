//! KongClient trait for mocking
//!
//! This trait abstracts the Kong admin API so the controllers can be unit
//! tested against [`crate::MockKongClient`].

use crate::error::KongError;
use crate::models::*;

/// Trait for Kong admin API operations
///
/// `name_or_id` arguments accept either the Kong id or the object's name,
/// as the admin API does.
#[async_trait::async_trait]
pub trait KongClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Check that the admin API is reachable
    async fn status(&self) -> Result<(), KongError>;

    // API objects
    async fn create_api(&self, api: &Api) -> Result<Api, KongError>;
    async fn get_api(&self, name_or_id: &str) -> Result<Api, KongError>;
    /// Full replace of an existing API, addressed by its id or, failing that, its name.
    async fn update_api(&self, api: &Api) -> Result<Api, KongError>;
    async fn delete_api(&self, name_or_id: &str) -> Result<(), KongError>;

    // Upstreams and targets
    async fn create_upstream(&self, upstream: &Upstream) -> Result<Upstream, KongError>;
    async fn get_upstream(&self, name_or_id: &str) -> Result<Upstream, KongError>;
    async fn delete_upstream(&self, name_or_id: &str) -> Result<(), KongError>;
    async fn create_target(&self, upstream: &str, target: &Target) -> Result<Target, KongError>;
    async fn list_targets(&self, upstream: &str) -> Result<TargetList, KongError>;

    // Plugins
    async fn list_plugins(&self, api: &str) -> Result<PluginList, KongError>;
    async fn add_plugin(&self, api: &str, plugin: &Plugin) -> Result<Plugin, KongError>;
    /// Update the plugin of the same name attached to `api`.
    async fn update_plugin(&self, api: &str, plugin: &Plugin) -> Result<Plugin, KongError>;
    /// Detach the plugin named `plugin_name` from `api`.
    async fn remove_plugin(&self, api: &str, plugin_name: &str) -> Result<(), KongError>;

    /// Add `address` to `upstream` with the standard weight.
    async fn enable_target(&self, upstream: &str, address: &str) -> Result<Target, KongError> {
        let target = Target {
            target: address.to_string(),
            weight: TARGET_ENABLED_WEIGHT,
            ..Default::default()
        };
        self.create_target(upstream, &target).await
    }

    /// Take `address` out of rotation; targets cannot be deleted, only zero-weighted.
    async fn disable_target(&self, upstream: &str, address: &str) -> Result<Target, KongError> {
        let target = Target {
            target: address.to_string(),
            weight: 0,
            ..Default::default()
        };
        self.create_target(upstream, &target).await
    }

    /// Whether a plugin named `plugin_name` is attached to `api`.
    async fn api_has_plugin(&self, api: &str, plugin_name: &str) -> Result<bool, KongError> {
        let plugins = self.list_plugins(api).await?;
        Ok(plugins.data.iter().any(|p| p.name == plugin_name))
    }
}
