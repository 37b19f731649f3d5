//! Namespace-scoped access to cluster resources.
//!
//! The controllers only see resources through [`ResourceStore`], so they can
//! be driven by an in-memory store in unit tests.

use crate::error::ControllerError;
use crate::selector::LabelSelector;
use futures::StreamExt;
use futures::stream::BoxStream;
use kube::api::ListParams;
use kube::{Api, Client, Resource};
use kube_runtime::{WatchStreamExt, watcher};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Raw watch stream: the initial list (`Init`/`InitApply`/`InitDone`)
/// followed by live `Apply`/`Delete` events.
pub type WatchStream<K> = BoxStream<'static, Result<watcher::Event<K>, watcher::Error>>;

/// Trait for list/get/watch access to one resource kind in one namespace
#[async_trait::async_trait]
pub trait ResourceStore<K>: Send + Sync
where
    K: Clone + Send + 'static,
{
    /// List the objects matching `selector`, in store order
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<K>, ControllerError>;

    /// Get an object by name; `None` if it does not exist
    async fn get(&self, name: &str) -> Result<Option<K>, ControllerError>;

    /// Subscribe to the objects matching `selector`
    fn watch(&self, selector: &LabelSelector) -> WatchStream<K>;
}

/// [`ResourceStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore<K> {
    api: Api<K>,
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    /// Create a store scoped to `namespace`
    pub fn namespaced(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

impl<K> Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default,
{
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<K>, ControllerError> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }
        let list = self.api.list(&params).await?;
        Ok(list.items)
    }

    async fn get(&self, name: &str) -> Result<Option<K>, ControllerError> {
        Ok(self.api.get_opt(name).await?)
    }

    fn watch(&self, selector: &LabelSelector) -> WatchStream<K> {
        let mut config = watcher::Config::default();
        if !selector.is_empty() {
            config = config.labels(&selector.to_string());
        }
        watcher(self.api.clone(), config).default_backoff().boxed()
    }
}
