//! Test utilities for unit testing the reconcilers
//!
//! This module provides an in-memory [`ResourceStore`] and helpers for
//! creating test resources.

use crate::error::ControllerError;
use crate::selector::LabelSelector;
use crate::store::{ResourceStore, WatchStream};
use crds::{ApiPlugin, ApiPluginSpec, GatewayApi, GatewayApiSpec};
use futures::StreamExt;
use futures::channel::mpsc;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use kube_runtime::watcher;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type WatchSender<K> = mpsc::UnboundedSender<Result<watcher::Event<K>, watcher::Error>>;

/// In-memory store that drives watch streams the way the API server does:
/// an initial list followed by live events.
pub struct MockStore<K> {
    objects: Arc<Mutex<Vec<K>>>,
    watchers: Arc<Mutex<Vec<(LabelSelector, WatchSender<K>)>>>,
    next_version: Arc<Mutex<u64>>,
}

impl<K> MockStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(Vec::new())),
            watchers: Arc::new(Mutex::new(Vec::new())),
            next_version: Arc::new(Mutex::new(1)),
        }
    }

    /// Store with `objects` already present (no events emitted)
    pub fn with(objects: Vec<K>) -> Self {
        let store = Self::new();
        for obj in objects {
            store.put(obj);
        }
        store
    }

    /// Create or replace an object and notify watchers
    pub fn apply(&self, obj: K) {
        let previous = self.find(&obj.name_any());
        let obj = self.put(obj);
        self.notify(|selector| {
            let now = selector.matches(obj.labels());
            let before = previous.as_ref().is_some_and(|p| selector.matches(p.labels()));
            if now {
                Some(watcher::Event::Apply(obj.clone()))
            } else if before {
                Some(watcher::Event::Delete(obj.clone()))
            } else {
                None
            }
        });
    }

    /// Delete an object and notify watchers
    pub fn delete(&self, name: &str) {
        let Some(obj) = self.take(name) else {
            return;
        };
        self.notify(|selector| {
            selector
                .matches(obj.labels())
                .then(|| watcher::Event::Delete(obj.clone()))
        });
    }

    /// Delete an object without telling watchers (a missed event)
    pub fn delete_silently(&self, name: &str) {
        self.take(name);
    }

    /// Replay the full list to every watcher, as after a reconnect
    pub fn relist(&self) {
        let objects = self.objects.lock().unwrap().clone();
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|(_, tx)| !tx.is_closed());
        for (selector, tx) in watchers.iter() {
            for event in initial_list(selector, &objects) {
                let _ = tx.unbounded_send(Ok(event));
            }
        }
    }

    /// Push a watch error to every watcher
    pub fn fail_watch(&self) {
        for (_, tx) in self.watchers.lock().unwrap().iter() {
            let _ = tx.unbounded_send(Err(watcher::Error::NoResourceVersion));
        }
    }

    pub fn watcher_count(&self) -> usize {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|(_, tx)| !tx.is_closed());
        watchers.len()
    }

    fn find(&self, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.name_any() == name)
            .cloned()
    }

    fn put(&self, mut obj: K) -> K {
        let version = {
            let mut next = self.next_version.lock().unwrap();
            let version = *next;
            *next += 1;
            version
        };
        obj.meta_mut().resource_version = Some(version.to_string());

        let mut objects = self.objects.lock().unwrap();
        match objects.iter_mut().find(|o| o.name_any() == obj.name_any()) {
            Some(existing) => *existing = obj.clone(),
            None => objects.push(obj.clone()),
        }
        obj
    }

    fn take(&self, name: &str) -> Option<K> {
        let mut objects = self.objects.lock().unwrap();
        let index = objects.iter().position(|o| o.name_any() == name)?;
        Some(objects.remove(index))
    }

    fn notify(&self, event_for: impl Fn(&LabelSelector) -> Option<watcher::Event<K>>) {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|(_, tx)| !tx.is_closed());
        for (selector, tx) in watchers.iter() {
            if let Some(event) = event_for(selector) {
                let _ = tx.unbounded_send(Ok(event));
            }
        }
    }
}

fn initial_list<K>(selector: &LabelSelector, objects: &[K]) -> Vec<watcher::Event<K>>
where
    K: Resource + Clone,
{
    let mut events = vec![watcher::Event::Init];
    events.extend(
        objects
            .iter()
            .filter(|o| selector.matches(o.labels()))
            .cloned()
            .map(watcher::Event::InitApply),
    );
    events.push(watcher::Event::InitDone);
    events
}

#[async_trait::async_trait]
impl<K> ResourceStore<K> for MockStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<K>, ControllerError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| selector.matches(o.labels()))
            .cloned()
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Option<K>, ControllerError> {
        Ok(self.find(name))
    }

    fn watch(&self, selector: &LabelSelector) -> WatchStream<K> {
        let (tx, rx) = mpsc::unbounded();
        let objects = self.objects.lock().unwrap().clone();
        for event in initial_list(selector, &objects) {
            let _ = tx.unbounded_send(Ok(event));
        }
        self.watchers.lock().unwrap().push((selector.clone(), tx));
        rx.boxed()
    }
}

fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Helper to create a test Service
pub fn create_test_service(
    name: &str,
    label_pairs: &[(&str, &str)],
    cluster_ip: &str,
    ports: &[(&str, i32)],
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: labels(label_pairs),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some(cluster_ip.to_string()),
            ports: Some(
                ports
                    .iter()
                    .map(|(port_name, port)| ServicePort {
                        name: Some(port_name.to_string()),
                        port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        status: None,
    }
}

/// The `myapp-auth` Service: `10.0.0.5`, ports auth:3000 and auth2:3001,
/// referencing the `myapp-auth` GatewayApi.
pub fn create_myapp_auth_service() -> Service {
    create_test_service(
        "myapp-auth",
        &[("kong.api", "myapp-auth"), ("service", "myapp-auth")],
        "10.0.0.5",
        &[("auth", 3000), ("auth2", 3001)],
    )
}

/// Helper to create a test GatewayApi selecting `service`
pub fn create_test_gateway_api(name: &str, service: &str, spec: GatewayApiSpec) -> GatewayApi {
    let mut route = GatewayApi::new(name, spec);
    route.metadata.namespace = Some("default".to_string());
    route.metadata.labels = labels(&[("kong.api", "true")]);
    route
        .spec
        .selector
        .insert("service".to_string(), service.to_string());
    route
}

/// The `myapp-auth` GatewayApi: uris /oauth and /authenticate, strip_uri on
pub fn create_myapp_auth_route() -> GatewayApi {
    create_test_gateway_api(
        "myapp-auth",
        "myapp-auth",
        GatewayApiSpec {
            uris: vec!["/oauth".to_string(), "/authenticate".to_string()],
            strip_uri: Some(true),
            ..Default::default()
        },
    )
}

/// Helper to create a test ApiPlugin selecting `service`
pub fn create_test_api_plugin(
    name: &str,
    plugin_name: &str,
    config: serde_json::Value,
    service: &str,
) -> ApiPlugin {
    let config = match config {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let mut selector = BTreeMap::new();
    selector.insert("service".to_string(), service.to_string());

    let mut plugin = ApiPlugin::new(
        name,
        ApiPluginSpec {
            name: plugin_name.to_string(),
            config,
            selector,
        },
    );
    plugin.metadata.namespace = Some("default".to_string());
    plugin
}

/// Poll `check` until it holds, failing the test after two seconds
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 2s"
        );
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
