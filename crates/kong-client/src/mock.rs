//! Mock KongClient for unit testing
//!
//! In-memory implementation of [`KongClientTrait`] that mirrors the admin
//! API's observable behavior: names are unique, duplicate creates conflict,
//! and unknown objects answer `NotFound`.

use crate::error::KongError;
use crate::kong_trait::KongClientTrait;
use crate::models::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock KongClient for testing
#[derive(Clone, Debug)]
pub struct MockKongClient {
    base_url: String,
    // API objects keyed by name
    apis: Arc<Mutex<BTreeMap<String, Api>>>,
    // Attached plugins keyed by API name
    plugins: Arc<Mutex<HashMap<String, Vec<Plugin>>>>,
    upstreams: Arc<Mutex<BTreeMap<String, Upstream>>>,
    // Target history keyed by upstream name, oldest first
    targets: Arc<Mutex<HashMap<String, Vec<Target>>>>,
    // Mutating calls in the order they were made
    calls: Arc<Mutex<Vec<String>>>,
    unavailable: Arc<Mutex<bool>>,
    // Counter for generating IDs
    next_id: Arc<Mutex<u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockKongClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            apis: Arc::new(Mutex::new(BTreeMap::new())),
            plugins: Arc::new(Mutex::new(HashMap::new())),
            upstreams: Arc::new(Mutex::new(BTreeMap::new())),
            targets: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            unavailable: Arc::new(Mutex::new(false)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add an API to the mock store (for test setup). Not recorded as a call.
    pub fn add_api(&self, mut api: Api) -> Api {
        if api.id.is_none() {
            api.id = Some(self.generate_id("api"));
        }
        lock(&self.apis).insert(api.name.clone(), api.clone());
        api
    }

    /// Remove an API behind the controller's back (for test setup)
    pub fn forget_api(&self, name: &str) {
        lock(&self.apis).remove(name);
        lock(&self.plugins).remove(name);
    }

    /// Snapshot of all API objects, ordered by name
    pub fn apis(&self) -> Vec<Api> {
        lock(&self.apis).values().cloned().collect()
    }

    /// API object by name
    pub fn api(&self, name: &str) -> Option<Api> {
        lock(&self.apis).get(name).cloned()
    }

    /// Plugins attached to the named API
    pub fn plugins(&self, api_name: &str) -> Vec<Plugin> {
        lock(&self.plugins).get(api_name).cloned().unwrap_or_default()
    }

    /// Target history of the named upstream, oldest first
    pub fn targets(&self, upstream: &str) -> Vec<Target> {
        lock(&self.targets).get(upstream).cloned().unwrap_or_default()
    }

    /// Mutating calls made so far, e.g. `"create_api myapp-auth"`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Make every subsequent request fail with a 503
    pub fn set_unavailable(&self, unavailable: bool) {
        *lock(&self.unavailable) = unavailable;
    }

    fn generate_id(&self, prefix: &str) -> String {
        let mut next = lock(&self.next_id);
        let id = format!("{}-{}", prefix, *next);
        *next += 1;
        id
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }

    fn check_available(&self) -> Result<(), KongError> {
        if *lock(&self.unavailable) {
            return Err(KongError::Api {
                status: 503,
                message: "Kong admin API unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve an API name or id to the name it is stored under
    fn api_name(&self, name_or_id: &str) -> Result<String, KongError> {
        let apis = lock(&self.apis);
        if apis.contains_key(name_or_id) {
            return Ok(name_or_id.to_string());
        }
        apis.values()
            .find(|a| a.id.as_deref() == Some(name_or_id))
            .map(|a| a.name.clone())
            .ok_or_else(|| KongError::NotFound(format!("API {}", name_or_id)))
    }

    fn upstream_name(&self, name_or_id: &str) -> Result<String, KongError> {
        let upstreams = lock(&self.upstreams);
        if upstreams.contains_key(name_or_id) {
            return Ok(name_or_id.to_string());
        }
        upstreams
            .values()
            .find(|u| u.id.as_deref() == Some(name_or_id))
            .map(|u| u.name.clone())
            .ok_or_else(|| KongError::NotFound(format!("upstream {}", name_or_id)))
    }
}

fn conflict(message: String) -> KongError {
    KongError::Api {
        status: 409,
        message,
    }
}

#[async_trait::async_trait]
impl KongClientTrait for MockKongClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn status(&self) -> Result<(), KongError> {
        self.check_available()
    }

    async fn create_api(&self, api: &Api) -> Result<Api, KongError> {
        self.check_available()?;
        if api.name.is_empty() {
            return Err(KongError::InvalidRequest("API name is required".to_string()));
        }
        if lock(&self.apis).contains_key(&api.name) {
            return Err(conflict(format!("API {} already exists", api.name)));
        }

        self.record(format!("create_api {}", api.name));
        let mut created = api.clone();
        created.id = Some(self.generate_id("api"));
        lock(&self.apis).insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn get_api(&self, name_or_id: &str) -> Result<Api, KongError> {
        self.check_available()?;
        let name = self.api_name(name_or_id)?;
        lock(&self.apis)
            .get(&name)
            .cloned()
            .ok_or_else(|| KongError::NotFound(format!("API {}", name_or_id)))
    }

    async fn update_api(&self, api: &Api) -> Result<Api, KongError> {
        self.check_available()?;
        let existing_name = self.api_name(api.name_or_id())?;

        self.record(format!("update_api {}", api.name));
        let mut apis = lock(&self.apis);
        let existing = apis
            .remove(&existing_name)
            .ok_or_else(|| KongError::NotFound(format!("API {}", existing_name)))?;
        let mut updated = api.clone();
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        apis.insert(updated.name.clone(), updated.clone());
        drop(apis);

        if existing_name != updated.name {
            let mut plugins = lock(&self.plugins);
            if let Some(attached) = plugins.remove(&existing_name) {
                plugins.insert(updated.name.clone(), attached);
            }
        }
        Ok(updated)
    }

    async fn delete_api(&self, name_or_id: &str) -> Result<(), KongError> {
        self.check_available()?;
        let name = self.api_name(name_or_id)?;

        self.record(format!("delete_api {}", name));
        lock(&self.apis).remove(&name);
        lock(&self.plugins).remove(&name);
        Ok(())
    }

    async fn create_upstream(&self, upstream: &Upstream) -> Result<Upstream, KongError> {
        self.check_available()?;
        if lock(&self.upstreams).contains_key(&upstream.name) {
            return Err(conflict(format!("upstream {} already exists", upstream.name)));
        }

        self.record(format!("create_upstream {}", upstream.name));
        let created = Upstream {
            id: Some(self.generate_id("upstream")),
            name: upstream.name.clone(),
        };
        lock(&self.upstreams).insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn get_upstream(&self, name_or_id: &str) -> Result<Upstream, KongError> {
        self.check_available()?;
        let name = self.upstream_name(name_or_id)?;
        lock(&self.upstreams)
            .get(&name)
            .cloned()
            .ok_or_else(|| KongError::NotFound(format!("upstream {}", name_or_id)))
    }

    async fn delete_upstream(&self, name_or_id: &str) -> Result<(), KongError> {
        self.check_available()?;
        let name = self.upstream_name(name_or_id)?;

        self.record(format!("delete_upstream {}", name));
        lock(&self.upstreams).remove(&name);
        lock(&self.targets).remove(&name);
        Ok(())
    }

    async fn create_target(&self, upstream: &str, target: &Target) -> Result<Target, KongError> {
        self.check_available()?;
        let name = self.upstream_name(upstream)?;
        let upstream_id = lock(&self.upstreams).get(&name).and_then(|u| u.id.clone());

        self.record(format!("create_target {} {} {}", name, target.target, target.weight));
        let created = Target {
            id: Some(self.generate_id("target")),
            target: target.target.clone(),
            weight: target.weight,
            upstream_id,
            created_at: target.created_at,
        };
        lock(&self.targets)
            .entry(name)
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn list_targets(&self, upstream: &str) -> Result<TargetList, KongError> {
        self.check_available()?;
        let name = self.upstream_name(upstream)?;
        let data = self.targets(&name);
        Ok(TargetList {
            total: data.len() as u64,
            data,
        })
    }

    async fn list_plugins(&self, api: &str) -> Result<PluginList, KongError> {
        self.check_available()?;
        let name = self.api_name(api)?;
        let data = self.plugins(&name);
        Ok(PluginList {
            total: data.len() as u64,
            data,
        })
    }

    async fn add_plugin(&self, api: &str, plugin: &Plugin) -> Result<Plugin, KongError> {
        self.check_available()?;
        let name = self.api_name(api)?;
        let api_id = lock(&self.apis).get(&name).and_then(|a| a.id.clone());

        let mut plugins = lock(&self.plugins);
        let attached = plugins.entry(name.clone()).or_default();
        if attached.iter().any(|p| p.name == plugin.name) {
            return Err(conflict(format!(
                "plugin {} already attached to API {}",
                plugin.name, name
            )));
        }

        self.record(format!("add_plugin {} {}", name, plugin.name));
        let mut created = plugin.clone();
        created.id = Some(self.generate_id("plugin"));
        created.api_id = api_id;
        attached.push(created.clone());
        Ok(created)
    }

    async fn update_plugin(&self, api: &str, plugin: &Plugin) -> Result<Plugin, KongError> {
        self.check_available()?;
        let name = self.api_name(api)?;

        let mut plugins = lock(&self.plugins);
        let existing = plugins
            .get_mut(&name)
            .and_then(|attached| attached.iter_mut().find(|p| p.name == plugin.name))
            .ok_or_else(|| {
                KongError::NotFound(format!("plugin {} is not attached to API {}", plugin.name, name))
            })?;

        self.record(format!("update_plugin {} {}", name, plugin.name));
        existing.config = plugin.config.clone();
        existing.enabled = plugin.enabled;
        Ok(existing.clone())
    }

    async fn remove_plugin(&self, api: &str, plugin_name: &str) -> Result<(), KongError> {
        self.check_available()?;
        let name = self.api_name(api)?;

        let mut plugins = lock(&self.plugins);
        let attached = plugins.entry(name.clone()).or_default();
        let before = attached.len();
        attached.retain(|p| p.name != plugin_name);
        if attached.len() == before {
            return Err(KongError::NotFound(format!(
                "plugin {} is not attached to API {}",
                plugin_name, name
            )));
        }

        self.record(format!("remove_plugin {} {}", name, plugin_name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(name: &str) -> Api {
        Api {
            name: name.to_string(),
            upstream_url: "10.0.0.5:3000".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn duplicate_api_create_conflicts() {
        let kong = MockKongClient::new("http://kong:8001");
        let created = kong.create_api(&api("myapp-auth")).await.unwrap();
        assert!(created.id.is_some());

        let err = kong.create_api(&api("myapp-auth")).await.unwrap_err();
        assert!(matches!(err, KongError::Api { status: 409, .. }));
        assert_eq!(kong.apis().len(), 1);
    }

    #[tokio::test]
    async fn api_addressable_by_id_or_name() {
        let kong = MockKongClient::new("http://kong:8001");
        let created = kong.create_api(&api("myapp-auth")).await.unwrap();
        let id = created.id.clone().unwrap();

        assert_eq!(kong.get_api(&id).await.unwrap().name, "myapp-auth");
        kong.delete_api(&id).await.unwrap();
        assert!(kong.get_api("myapp-auth").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_keeps_id() {
        let kong = MockKongClient::new("http://kong:8001");
        let created = kong.create_api(&api("myapp-auth")).await.unwrap();

        let mut desired = api("myapp-auth");
        desired.upstream_url = "10.0.0.9:3000".to_string();
        let updated = kong.update_api(&desired).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(kong.api("myapp-auth").unwrap().upstream_url, "10.0.0.9:3000");
        assert!(kong.update_api(&api("missing")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn plugin_lifecycle() {
        let kong = MockKongClient::new("http://kong:8001");
        kong.create_api(&api("myapp-auth")).await.unwrap();

        let mut config = serde_json::Map::new();
        config.insert("hide_credentials".to_string(), serde_json::json!(true));
        kong.add_plugin("myapp-auth", &Plugin::new("key-auth", config))
            .await
            .unwrap();
        assert!(kong.api_has_plugin("myapp-auth", "key-auth").await.unwrap());
        assert!(!kong.api_has_plugin("myapp-auth", "cors").await.unwrap());

        let mut config = serde_json::Map::new();
        config.insert("hide_credentials".to_string(), serde_json::json!(false));
        kong.update_plugin("myapp-auth", &Plugin::new("key-auth", config))
            .await
            .unwrap();
        assert_eq!(
            kong.plugins("myapp-auth")[0].config["hide_credentials"],
            serde_json::json!(false)
        );

        kong.remove_plugin("myapp-auth", "key-auth").await.unwrap();
        assert!(kong.plugins("myapp-auth").is_empty());
        assert!(kong
            .remove_plugin("myapp-auth", "key-auth")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn plugins_on_missing_api_are_not_found() {
        let kong = MockKongClient::new("http://kong:8001");
        assert!(kong.list_plugins("ghost").await.unwrap_err().is_not_found());
        assert!(kong
            .add_plugin("ghost", &Plugin::new("cors", serde_json::Map::new()))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn enable_and_disable_target_weights() {
        let kong = MockKongClient::new("http://kong:8001");
        kong.create_upstream(&Upstream {
            id: None,
            name: "auth.v1.service".to_string(),
        })
        .await
        .unwrap();

        kong.enable_target("auth.v1.service", "10.0.0.5:3000").await.unwrap();
        kong.disable_target("auth.v1.service", "10.0.0.5:3000").await.unwrap();

        let targets = kong.list_targets("auth.v1.service").await.unwrap();
        assert_eq!(targets.total, 2);
        assert_eq!(targets.data[0].weight, TARGET_ENABLED_WEIGHT);
        assert_eq!(targets.data[1].weight, 0);
    }

    #[tokio::test]
    async fn unavailable_fails_every_call() {
        let kong = MockKongClient::new("http://kong:8001");
        kong.set_unavailable(true);
        assert!(kong.status().await.is_err());
        assert!(matches!(
            kong.get_api("x").await.unwrap_err(),
            KongError::Api { status: 503, .. }
        ));
        kong.set_unavailable(false);
        assert!(kong.status().await.is_ok());
    }
}
