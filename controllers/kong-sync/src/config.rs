//! Command line / environment configuration.

use crate::error::ControllerError;
use crate::selector::validate_key;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Keeps Kong API objects and plugins in sync with GatewayApi and ApiPlugin resources
#[derive(Debug, Clone, Parser)]
#[command(name = "kong-sync", version, about)]
pub struct Args {
    /// Path to a kubeconfig file; in-cluster or default config when unset
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace to watch
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Kong admin API host
    #[arg(long, env = "KONG_HOST", default_value = "kong")]
    pub kong_host: String,

    /// Kong admin API port
    #[arg(long, env = "KONG_PORT", default_value = "8001")]
    pub kong_port: u16,

    /// Kong admin API scheme
    #[arg(long, env = "KONG_SCHEME", default_value = "http")]
    pub kong_scheme: String,

    /// Per-request timeout for Kong admin API calls, in seconds (no timeout when unset)
    #[arg(long, env = "KONG_TIMEOUT_SECS")]
    pub kong_timeout_secs: Option<u64>,

    /// Label carried by Services that names their GatewayApi
    #[arg(long, env = "API_LABEL", default_value = "kong.api")]
    pub api_label: String,

    /// GatewayApi selector key (and Service label) naming the backing Service
    #[arg(long, env = "SERVICE_SELECTOR_LABEL", default_value = "service")]
    pub service_selector_label: String,

    /// ApiPlugin selector key (and Service label) naming the backing Service
    #[arg(long, env = "PLUGIN_SERVICE_SELECTOR_LABEL", default_value = "service")]
    pub plugin_service_selector_label: String,
}

/// Validated runtime configuration shared by both controllers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub kubeconfig: Option<PathBuf>,
    pub namespace: String,
    pub kong_url: String,
    pub kong_timeout: Option<Duration>,
    pub api_label: String,
    pub service_selector_label: String,
    pub plugin_service_selector_label: String,
}

impl Args {
    /// Validate the arguments and build the controller configuration
    pub fn into_config(self) -> Result<ControllerConfig, ControllerError> {
        if self.namespace.trim().is_empty() {
            return Err(ControllerError::InvalidConfig("namespace must not be empty".to_string()));
        }
        if self.kong_scheme != "http" && self.kong_scheme != "https" {
            return Err(ControllerError::InvalidConfig(format!(
                "unsupported Kong scheme {:?} (expected http or https)",
                self.kong_scheme
            )));
        }
        if self.kong_host.trim().is_empty() {
            return Err(ControllerError::InvalidConfig("Kong host must not be empty".to_string()));
        }

        validate_key(&self.api_label)?;
        validate_key(&self.service_selector_label)?;
        validate_key(&self.plugin_service_selector_label)?;

        Ok(ControllerConfig {
            kubeconfig: self.kubeconfig,
            namespace: self.namespace,
            kong_url: format!("{}://{}:{}", self.kong_scheme, self.kong_host, self.kong_port),
            kong_timeout: self.kong_timeout_secs.map(Duration::from_secs),
            api_label: self.api_label,
            service_selector_label: self.service_selector_label,
            plugin_service_selector_label: self.plugin_service_selector_label,
        })
    }
}

impl ControllerConfig {
    /// Configuration with the default labels, for the given namespace
    #[cfg(test)]
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            kubeconfig: None,
            namespace: namespace.to_string(),
            kong_url: "http://kong:8001".to_string(),
            kong_timeout: None,
            api_label: "kong.api".to_string(),
            service_selector_label: "service".to_string(),
            plugin_service_selector_label: "service".to_string(),
        }
    }
}
