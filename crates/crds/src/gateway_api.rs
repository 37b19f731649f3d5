//! GatewayApi CRD
//!
//! Declares a Kong API object for the backing Service picked out by `selector`.
//! The name and upstream URL of the Kong API are taken from that Service, so
//! neither appears in the spec.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Route definition for a single backing Service.
///
/// Field names are kept snake_case so manifests written for earlier
/// deployments keep deserializing unchanged.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kongsync.io",
    version = "v1",
    kind = "GatewayApi",
    plural = "gatewayapis",
    namespaced
)]
pub struct GatewayApiSpec {
    /// Host names routed to the API
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// URI prefixes routed to the API
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,

    /// Strip the matched URI prefix before proxying upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_uri: Option<bool>,

    /// HTTP methods routed to the API
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,

    /// Forward the client Host header upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_host: Option<bool>,

    /// Upstream retries on connection failure (0 leaves the gateway default)
    #[serde(default)]
    pub retries: i64,

    /// Upstream connect timeout in milliseconds (0 leaves the gateway default)
    #[serde(default)]
    pub upstream_connect_timeout: i64,

    /// Upstream send timeout in milliseconds (0 leaves the gateway default)
    #[serde(default)]
    pub upstream_send_timeout: i64,

    /// Upstream read timeout in milliseconds (0 leaves the gateway default)
    #[serde(default)]
    pub upstream_read_timeout: i64,

    /// Only accept HTTPS traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_only: Option<bool>,

    /// Accept plain HTTP when TLS was terminated in front of the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_if_terminated: Option<bool>,

    /// Label/value pairs identifying the backing Service
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

impl GatewayApiSpec {
    /// Value of the given selector key, if set.
    pub fn selector_value(&self, key: &str) -> Option<&str> {
        self.selector.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn spec_decodes_snake_case_manifest() {
        let spec: GatewayApiSpec = serde_json::from_value(serde_json::json!({
            "uris": ["/oauth", "/authenticate"],
            "strip_uri": true,
            "upstream_read_timeout": 60000,
            "selector": { "service": "myapp-auth" }
        }))
        .unwrap();

        assert_eq!(spec.uris, vec!["/oauth", "/authenticate"]);
        assert_eq!(spec.strip_uri, Some(true));
        assert_eq!(spec.upstream_read_timeout, 60000);
        assert_eq!(spec.retries, 0);
        assert!(spec.hosts.is_empty());
        assert_eq!(spec.selector_value("service"), Some("myapp-auth"));
        assert_eq!(spec.selector_value("app"), None);
    }

    #[test]
    fn crd_uses_expected_names() {
        let crd = GatewayApi::crd();
        assert_eq!(crd.spec.group, "kongsync.io");
        assert_eq!(crd.spec.names.kind, "GatewayApi");
        assert_eq!(crd.spec.names.plural, "gatewayapis");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(<GatewayApi as kube::Resource>::api_version(&()), "kongsync.io/v1");
    }
}
