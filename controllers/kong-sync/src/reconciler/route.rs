//! GatewayApi reconciler.
//!
//! Creates, updates and deletes one Kong API object per backing Service, named
//! after that Service. Service and GatewayApi events are consumed from a
//! single select loop so at most one reconciliation runs at a time.

use super::{build_api, find_api, tolerate_not_found, upstream_address};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::selector::{LabelSelector, lookup_service};
use crate::store::ResourceStore;
use crate::watcher::{ResourceEvent, ResourceUpdate, ResourceWatcher, WatchHandle};
use crds::GatewayApi;
use k8s_openapi::api::core::v1::Service;
use kong_client::KongClientTrait;
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Reconciles GatewayApi resources and their Services into Kong API objects.
pub struct RouteController {
    kong: Arc<dyn KongClientTrait>,
    services: Arc<dyn ResourceStore<Service>>,
    routes: Arc<dyn ResourceStore<GatewayApi>>,
    api_label: String,
    service_selector_label: String,
}

impl RouteController {
    pub fn new(
        kong: Arc<dyn KongClientTrait>,
        services: Arc<dyn ResourceStore<Service>>,
        routes: Arc<dyn ResourceStore<GatewayApi>>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            kong,
            services,
            routes,
            api_label: config.api_label.clone(),
            service_selector_label: config.service_selector_label.clone(),
        }
    }

    /// Watch Services and GatewayApis carrying the API label and reconcile
    /// until `shutdown` is cancelled. Returns once every watcher has stopped.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        let selector = LabelSelector::exists(&self.api_label)?;

        let WatchHandle {
            events: mut service_events,
            updates: service_updates,
            task: service_task,
        } = ResourceWatcher::new("Service", Arc::clone(&self.services), selector.clone())
            .with_updates()
            .spawn(shutdown.clone());
        let WatchHandle {
            events: mut route_events,
            updates: route_updates,
            task: route_task,
        } = ResourceWatcher::new("GatewayApi", Arc::clone(&self.routes), selector)
            .with_updates()
            .spawn(shutdown.clone());

        let (Some(mut service_updates), Some(mut route_updates)) = (service_updates, route_updates) else {
            return Err(ControllerError::Watch("update streams were not started".to_string()));
        };

        info!("Route controller running");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = route_events.recv() => {
                    let name = event.object().name_any();
                    if let Err(e) = self.on_route_event(event).await {
                        error!("Failed to process GatewayApi event for {}: {}", name, e);
                    }
                }
                Some(update) = route_updates.recv() => {
                    let name = update.new.name_any();
                    if let Err(e) = self.on_route_update(update).await {
                        error!("Failed to process GatewayApi update for {}: {}", name, e);
                    }
                }
                Some(update) = service_updates.recv() => {
                    let name = update.new.name_any();
                    if let Err(e) = self.on_service_update(update).await {
                        error!("Failed to process Service update for {}: {}", name, e);
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

        drop((service_events, service_updates, route_events, route_updates));
        for task in [service_task, route_task] {
            if let Err(e) = task.await {
                error!("Route controller watcher task failed: {}", e);
            }
        }
        info!("Stopped route controller");
        Ok(())
    }

    pub(crate) async fn on_service_event(&self, event: ResourceEvent<Service>) -> Result<(), ControllerError> {
        match event {
            ResourceEvent::Added(service) => self.create_api_for_service(&service).await,
            // Modifications arrive on the update stream; deletions leave the API object in place.
            ResourceEvent::Modified(_) | ResourceEvent::Deleted(_) => Ok(()),
        }
    }

    pub(crate) async fn on_service_update(&self, update: ResourceUpdate<Service>) -> Result<(), ControllerError> {
        let old_upstream = upstream_address(&update.old)?;
        let new_upstream = upstream_address(&update.new)?;
        if old_upstream == new_upstream {
            debug!("Upstream of Service {} unchanged", update.new.name_any());
            return Ok(());
        }

        let name = update.new.name_any();
        let mut api = self.kong.get_api(&name).await?;
        api.upstream_url = new_upstream;
        self.kong.update_api(&api).await?;
        info!("Updated upstream of API {}: {} -> {}", name, old_upstream, api.upstream_url);
        Ok(())
    }

    pub(crate) async fn on_route_event(&self, event: ResourceEvent<GatewayApi>) -> Result<(), ControllerError> {
        match event {
            ResourceEvent::Added(route) => self.create_api_for_route(&route).await,
            ResourceEvent::Modified(_) => Ok(()),
            ResourceEvent::Deleted(route) => self.delete_api_for_route(&route).await,
        }
    }

    pub(crate) async fn on_route_update(&self, update: ResourceUpdate<GatewayApi>) -> Result<(), ControllerError> {
        let ResourceUpdate { old, new } = update;
        let old_service = self.selector_value(&old)?;
        let new_service = self.selector_value(&new)?;

        let service = lookup_service(
            self.services.as_ref(),
            &self.service_selector_label,
            new_service,
            Some(&self.api_label),
        )
        .await?;
        let api = build_api(&service.name_any(), upstream_address(&service)?, &new.spec);

        if old_service == new_service {
            self.kong.update_api(&api).await?;
            info!("Updated API {} from GatewayApi {}", api.name, new.name_any());
            return Ok(());
        }

        if tolerate_not_found(self.kong.delete_api(old_service).await)? {
            info!("Deleted API {} after GatewayApi {} moved to {}", old_service, new.name_any(), new_service);
        }
        if find_api(self.kong.as_ref(), &api.name).await?.is_some() {
            self.kong.update_api(&api).await?;
            info!("Updated existing API {} from GatewayApi {}", api.name, new.name_any());
        } else {
            self.kong.create_api(&api).await?;
            info!("Created API {} from GatewayApi {}", api.name, new.name_any());
        }
        Ok(())
    }

    async fn create_api_for_service(&self, service: &Service) -> Result<(), ControllerError> {
        let name = service.name_any();
        let Some(route_name) = service.labels().get(&self.api_label) else {
            debug!("Service {} has no {} label", name, self.api_label);
            return Ok(());
        };

        let route = self
            .routes
            .get(route_name)
            .await?
            .ok_or_else(|| ControllerError::GatewayApiNotFound(route_name.clone()))?;

        if find_api(self.kong.as_ref(), &name).await?.is_some() {
            debug!("API {} already exists", name);
            return Ok(());
        }

        let api = build_api(&name, upstream_address(service)?, &route.spec);
        self.kong.create_api(&api).await?;
        info!("Created API {} for Service {} (upstream {})", name, name, api.upstream_url);
        Ok(())
    }

    async fn create_api_for_route(&self, route: &GatewayApi) -> Result<(), ControllerError> {
        let Some(service_name) = route.spec.selector_value(&self.service_selector_label) else {
            debug!(
                "GatewayApi {} has no {} selector, ignoring",
                route.name_any(),
                self.service_selector_label
            );
            return Ok(());
        };

        let service = lookup_service(
            self.services.as_ref(),
            &self.service_selector_label,
            service_name,
            Some(&self.api_label),
        )
        .await?;
        let name = service.name_any();

        if find_api(self.kong.as_ref(), &name).await?.is_some() {
            debug!("API {} already exists", name);
            return Ok(());
        }

        let api = build_api(&name, upstream_address(&service)?, &route.spec);
        self.kong.create_api(&api).await?;
        info!("Created API {} from GatewayApi {} (upstream {})", name, route.name_any(), api.upstream_url);
        Ok(())
    }

    async fn delete_api_for_route(&self, route: &GatewayApi) -> Result<(), ControllerError> {
        let Some(api_name) = route.spec.selector_value(&self.service_selector_label) else {
            debug!(
                "GatewayApi {} has no {} selector, nothing to delete",
                route.name_any(),
                self.service_selector_label
            );
            return Ok(());
        };

        if find_api(self.kong.as_ref(), api_name).await?.is_none() {
            debug!("API {} already absent", api_name);
            return Ok(());
        }
        if tolerate_not_found(self.kong.delete_api(api_name).await)? {
            info!("Deleted API {} for GatewayApi {}", api_name, route.name_any());
        }
        Ok(())
    }

    fn selector_value<'a>(&self, route: &'a GatewayApi) -> Result<&'a str, ControllerError> {
        route
            .spec
            .selector_value(&self.service_selector_label)
            .ok_or_else(|| ControllerError::MissingSelector {
                kind: "GatewayApi",
                name: route.name_any(),
                key: self.service_selector_label.clone(),
            })
    }
}
