//! ApiPlugin reconciler.
//!
//! Attaches, updates and detaches Kong plugins on API objects created by the
//! route reconciler. A missing API object is always an error here, even on
//! the detach path.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::selector::{LabelSelector, lookup_service};
use crate::store::ResourceStore;
use crate::watcher::{ResourceEvent, ResourceWatcher, WatchHandle};
use crds::ApiPlugin;
use k8s_openapi::api::core::v1::Service;
use kong_client::{KongClientTrait, Plugin};
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Reconciles ApiPlugin resources into plugins on Kong API objects.
pub struct PluginController {
    kong: Arc<dyn KongClientTrait>,
    services: Arc<dyn ResourceStore<Service>>,
    plugins: Arc<dyn ResourceStore<ApiPlugin>>,
    api_label: String,
    plugin_service_selector_label: String,
}

impl PluginController {
    pub fn new(
        kong: Arc<dyn KongClientTrait>,
        services: Arc<dyn ResourceStore<Service>>,
        plugins: Arc<dyn ResourceStore<ApiPlugin>>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            kong,
            services,
            plugins,
            api_label: config.api_label.clone(),
            plugin_service_selector_label: config.plugin_service_selector_label.clone(),
        }
    }

    /// Watch labelled Services and all ApiPlugins and reconcile until
    /// `shutdown` is cancelled. Returns once every watcher has stopped.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        let WatchHandle {
            events: mut service_events,
            task: service_task,
            ..
        } = ResourceWatcher::new(
            "Service",
            Arc::clone(&self.services),
            LabelSelector::exists(&self.api_label)?,
        )
        .spawn(shutdown.clone());
        let WatchHandle {
            events: mut plugin_events,
            task: plugin_task,
            ..
        } = ResourceWatcher::new("ApiPlugin", Arc::clone(&self.plugins), LabelSelector::everything())
            .spawn(shutdown.clone());

        info!("Plugin controller running");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = plugin_events.recv() => {
                    let name = event.object().name_any();
                    if let Err(e) = self.on_plugin_event(event).await {
                        error!("Failed to process ApiPlugin event for {}: {}", name, e);
                    }
                }
                Some(event) = service_events.recv() => {
                    let name = event.object().name_any();
                    if let Err(e) = self.on_service_event(event).await {
                        error!("Failed to process Service event for {}: {}", name, e);
                    }
                }
            }
        }

        drop((service_events, plugin_events));
        for task in [service_task, plugin_task] {
            if let Err(e) = task.await {
                error!("Plugin controller watcher task failed: {}", e);
            }
        }
        info!("Stopped plugin controller");
        Ok(())
    }

    pub(crate) async fn on_service_event(&self, event: ResourceEvent<Service>) -> Result<(), ControllerError> {
        match event {
            ResourceEvent::Added(service) | ResourceEvent::Modified(service) => {
                self.attach_service_plugins(&service).await
            }
            ResourceEvent::Deleted(_) => Ok(()),
        }
    }

    pub(crate) async fn on_plugin_event(&self, event: ResourceEvent<ApiPlugin>) -> Result<(), ControllerError> {
        match event {
            ResourceEvent::Added(plugin) => self.attach_plugin(&plugin).await,
            ResourceEvent::Modified(plugin) => self.update_plugin(&plugin).await,
            ResourceEvent::Deleted(plugin) => self.detach_plugin(&plugin).await,
        }
    }

    /// Attach every ApiPlugin selecting `service` that is not attached yet.
    async fn attach_service_plugins(&self, service: &Service) -> Result<(), ControllerError> {
        let name = service.name_any();
        let selected: Vec<ApiPlugin> = self
            .plugins
            .list(&LabelSelector::everything())
            .await?
            .into_iter()
            .filter(|p| p.spec.selector_value(&self.plugin_service_selector_label) == Some(name.as_str()))
            .collect();

        if selected.is_empty() {
            debug!("No ApiPlugins select Service {}", name);
            return Ok(());
        }

        self.kong.get_api(&name).await?;
        for plugin in &selected {
            self.ensure_attached(&name, plugin).await?;
        }
        Ok(())
    }

    async fn attach_plugin(&self, plugin: &ApiPlugin) -> Result<(), ControllerError> {
        let api_name = self.resolve_api(plugin).await?;
        self.ensure_attached(&api_name, plugin).await
    }

    async fn update_plugin(&self, plugin: &ApiPlugin) -> Result<(), ControllerError> {
        let api_name = self.resolve_api(plugin).await?;
        if !self.kong.api_has_plugin(&api_name, &plugin.spec.name).await? {
            debug!("Plugin {} not attached to API {}, not creating on update", plugin.spec.name, api_name);
            return Ok(());
        }

        self.kong.update_plugin(&api_name, &desired_plugin(plugin)).await?;
        info!("Updated plugin {} on API {} from ApiPlugin {}", plugin.spec.name, api_name, plugin.name_any());
        Ok(())
    }

    async fn detach_plugin(&self, plugin: &ApiPlugin) -> Result<(), ControllerError> {
        let api_name = self.resolve_api(plugin).await?;
        if !self.kong.api_has_plugin(&api_name, &plugin.spec.name).await? {
            debug!("Plugin {} not attached to API {}", plugin.spec.name, api_name);
            return Ok(());
        }

        self.kong.remove_plugin(&api_name, &plugin.spec.name).await?;
        info!("Removed plugin {} from API {}", plugin.spec.name, api_name);
        Ok(())
    }

    async fn ensure_attached(&self, api_name: &str, plugin: &ApiPlugin) -> Result<(), ControllerError> {
        if self.kong.api_has_plugin(api_name, &plugin.spec.name).await? {
            debug!("Plugin {} already attached to API {}", plugin.spec.name, api_name);
            return Ok(());
        }

        self.kong.add_plugin(api_name, &desired_plugin(plugin)).await?;
        info!("Attached plugin {} to API {} from ApiPlugin {}", plugin.spec.name, api_name, plugin.name_any());
        Ok(())
    }

    /// Backing Service of `plugin`, whose API object must already exist.
    async fn resolve_api(&self, plugin: &ApiPlugin) -> Result<String, ControllerError> {
        let value = plugin
            .spec
            .selector_value(&self.plugin_service_selector_label)
            .ok_or_else(|| ControllerError::MissingSelector {
                kind: "ApiPlugin",
                name: plugin.name_any(),
                key: self.plugin_service_selector_label.clone(),
            })?;

        let service = lookup_service(
            self.services.as_ref(),
            &self.plugin_service_selector_label,
            value,
            Some(&self.api_label),
        )
        .await?;
        let api = self.kong.get_api(&service.name_any()).await?;
        Ok(api.name)
    }
}

fn desired_plugin(plugin: &ApiPlugin) -> Plugin {
    Plugin::new(plugin.spec.name.clone(), plugin.spec.config.clone())
}
