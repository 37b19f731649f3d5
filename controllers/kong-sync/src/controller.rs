//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the route and
//! plugin reconcilers to their stores and the Kong client, runs them as
//! supervised tasks, and joins them on shutdown.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::{PluginController, RouteController};
use crate::store::{KubeStore, ResourceStore};
use crds::{ApiPlugin, GatewayApi};
use k8s_openapi::api::core::v1::Service;
use kong_client::{KongClient, KongClientTrait};
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Main controller for Kong synchronisation.
pub struct Controller {
    kong: Arc<dyn KongClientTrait>,
    services: Arc<dyn ResourceStore<Service>>,
    routes: Arc<dyn ResourceStore<GatewayApi>>,
    plugins: Arc<dyn ResourceStore<ApiPlugin>>,
    config: ControllerConfig,
}

impl Controller {
    /// Creates a controller talking to the cluster and the Kong admin API
    /// described by `config`. Fails if Kong is unreachable.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing kong-sync controller");

        let kube_client = match &config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ControllerError::InvalidConfig(format!("cannot read kubeconfig {}: {}", path.display(), e))
                })?;
                let kube_config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        ControllerError::InvalidConfig(format!("invalid kubeconfig {}: {}", path.display(), e))
                    })?;
                Client::try_from(kube_config)?
            }
            None => Client::try_default().await?,
        };

        let kong = KongClient::new(config.kong_url.clone(), config.kong_timeout)?;

        info!("Validating Kong admin API connectivity...");
        kong.status().await.map_err(|e| {
            error!("Kong admin API is not reachable at {}: {}", config.kong_url, e);
            ControllerError::Kong(e)
        })?;
        info!("Kong admin API reachable at {}", config.kong_url);

        let ns = config.namespace.as_str();
        Ok(Self::with_stores(
            Arc::new(kong),
            Arc::new(KubeStore::<Service>::namespaced(kube_client.clone(), ns)),
            Arc::new(KubeStore::<GatewayApi>::namespaced(kube_client.clone(), ns)),
            Arc::new(KubeStore::<ApiPlugin>::namespaced(kube_client, ns)),
            config,
        ))
    }

    /// Creates a controller over explicit clients.
    pub fn with_stores(
        kong: Arc<dyn KongClientTrait>,
        services: Arc<dyn ResourceStore<Service>>,
        routes: Arc<dyn ResourceStore<GatewayApi>>,
        plugins: Arc<dyn ResourceStore<ApiPlugin>>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            kong,
            services,
            routes,
            plugins,
            config,
        }
    }

    /// Runs both reconcilers until `stop` resolves or one of them exits,
    /// then cancels the rest and waits for every task to finish.
    pub async fn run(self, stop: impl Future<Output = ()>) -> Result<(), ControllerError> {
        let shutdown = CancellationToken::new();

        let route_controller = RouteController::new(
            Arc::clone(&self.kong),
            Arc::clone(&self.services),
            Arc::clone(&self.routes),
            &self.config,
        );
        let plugin_controller = PluginController::new(
            Arc::clone(&self.kong),
            Arc::clone(&self.services),
            Arc::clone(&self.plugins),
            &self.config,
        );

        let mut route_task: JoinHandle<Result<(), ControllerError>> =
            tokio::spawn(route_controller.run(shutdown.clone()));
        let mut plugin_task: JoinHandle<Result<(), ControllerError>> =
            tokio::spawn(plugin_controller.run(shutdown.clone()));

        info!("kong-sync controller running in namespace {}", self.config.namespace);

        let (route_result, plugin_result) = tokio::select! {
            _ = stop => {
                info!("Shutdown requested");
                shutdown.cancel();
                (route_task.await, plugin_task.await)
            }
            result = &mut route_task => {
                shutdown.cancel();
                (result, plugin_task.await)
            }
            result = &mut plugin_task => {
                shutdown.cancel();
                (route_task.await, result)
            }
        };

        let route_result = route_result
            .map_err(|e| ControllerError::Watch(format!("route controller panicked: {}", e)))
            .and_then(|r| r);
        let plugin_result = plugin_result
            .map_err(|e| ControllerError::Watch(format!("plugin controller panicked: {}", e)))
            .and_then(|r| r);

        info!("kong-sync controller stopped");
        route_result.and(plugin_result)
    }
}
