//! Controller-specific error types.
//!
//! This module defines error types specific to kong-sync that are not
//! covered by upstream library errors.

use kong_client::KongError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the kong-sync controllers.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Kong admin API error
    #[error("Kong error: {0}")]
    Kong(#[from] KongError),

    /// No Service carries the selector label with the requested value
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// A Service references a GatewayApi that does not exist
    #[error("GatewayApi not found: {0}")]
    GatewayApiNotFound(String),

    /// A resource's selector does not carry the configured key
    #[error("{kind} {name} has no selector value for {key}")]
    MissingSelector {
        kind: &'static str,
        name: String,
        key: String,
    },

    /// The Service declares no ports to route to
    #[error("Service {0} exposes no ports")]
    NoServicePorts(String),

    /// The Service has no cluster IP (headless or not yet allocated)
    #[error("Service {0} has no cluster IP")]
    MissingClusterIp(String),

    /// A label selector could not be built from its parts
    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch or controller task failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
