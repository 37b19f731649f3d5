//! Reconciliation logic for kong-sync.
//!
//! - `route`: GatewayApi + Service events → Kong API objects
//! - `plugin`: ApiPlugin + Service events → Kong plugins on existing API objects

pub mod plugin;
pub mod route;


use crate::error::ControllerError;
use crds::GatewayApiSpec;
use k8s_openapi::api::core::v1::Service;
use kong_client::{Api, KongClientTrait, KongError};
use kube::ResourceExt;

pub use plugin::PluginController;
pub use route::RouteController;

/// Upstream address of a Service: `cluster_ip:port` of its first declared port.
/// Services exposing several ports are only reachable on the first one.
pub fn upstream_address(service: &Service) -> Result<String, ControllerError> {
    let name = service.name_any();
    let spec = service
        .spec
        .as_ref()
        .ok_or_else(|| ControllerError::MissingClusterIp(name.clone()))?;

    let cluster_ip = spec
        .cluster_ip
        .as_deref()
        .filter(|ip| !ip.is_empty() && *ip != "None")
        .ok_or_else(|| ControllerError::MissingClusterIp(name.clone()))?;

    let port = spec
        .ports
        .as_ref()
        .and_then(|ports| ports.first())
        .ok_or(ControllerError::NoServicePorts(name))?;

    Ok(format!("{}:{}", cluster_ip, port.port))
}

/// Desired Kong API object for `service_name` routed per `spec`
pub fn build_api(service_name: &str, upstream_url: String, spec: &GatewayApiSpec) -> Api {
    Api {
        id: None,
        name: service_name.to_string(),
        hosts: spec.hosts.clone(),
        uris: spec.uris.clone(),
        upstream_url,
        strip_uri: spec.strip_uri,
        methods: spec.methods.clone(),
        preserve_host: spec.preserve_host,
        retries: spec.retries,
        upstream_connect_timeout: spec.upstream_connect_timeout,
        upstream_send_timeout: spec.upstream_send_timeout,
        upstream_read_timeout: spec.upstream_read_timeout,
        https_only: spec.https_only,
        http_if_terminated: spec.http_if_terminated,
        created_at: None,
    }
}

/// Fetch an API object, mapping "not found" to `None`
pub(crate) async fn find_api(
    kong: &dyn KongClientTrait,
    name: &str,
) -> Result<Option<Api>, ControllerError> {
    match kong.get_api(name).await {
        Ok(api) => Ok(Some(api)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Treat a "not found" answer as success (delete paths only)
pub(crate) fn tolerate_not_found(result: Result<(), KongError>) -> Result<bool, ControllerError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
