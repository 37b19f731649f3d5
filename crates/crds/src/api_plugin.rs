//! ApiPlugin CRD
//!
//! Attaches a Kong plugin to the API object of the Service picked out by
//! `selector`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kongsync.io",
    version = "v1",
    kind = "ApiPlugin",
    plural = "apiplugins",
    namespaced
)]
pub struct ApiPluginSpec {
    /// Kong plugin name (e.g. "key-auth", "rate-limiting")
    pub name: String,

    /// Plugin configuration exactly as Kong expects it, without the `config.` prefix.
    /// Passed through unvalidated.
    #[serde(default)]
    #[schemars(schema_with = "free_form_object")]
    pub config: serde_json::Map<String, serde_json::Value>,

    /// Label/value pairs identifying the backing Service
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

impl ApiPluginSpec {
    /// Value of the given selector key, if set.
    pub fn selector_value(&self, key: &str) -> Option<&str> {
        self.selector.get(key).map(String::as_str)
    }
}

fn free_form_object(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn config_is_kept_verbatim() {
        let spec: ApiPluginSpec = serde_json::from_value(serde_json::json!({
            "name": "rate-limiting",
            "config": { "minute": 20, "limit_by": "consumer", "nested": { "a": [1, 2] } },
            "selector": { "service": "myapp-auth" }
        }))
        .unwrap();

        assert_eq!(spec.name, "rate-limiting");
        assert_eq!(spec.config["minute"], serde_json::json!(20));
        assert_eq!(spec.config["nested"]["a"][1], serde_json::json!(2));
        assert_eq!(spec.selector_value("service"), Some("myapp-auth"));
    }

    #[test]
    fn config_schema_preserves_unknown_fields() {
        let crd = serde_json::to_value(ApiPlugin::crd()).unwrap();
        let config = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"]
            ["properties"]["config"];
        assert_eq!(config["x-kubernetes-preserve-unknown-fields"], serde_json::json!(true));
    }

    #[test]
    fn crd_uses_expected_names() {
        let crd = ApiPlugin::crd();
        assert_eq!(crd.spec.group, "kongsync.io");
        assert_eq!(crd.spec.names.plural, "apiplugins");
        assert_eq!(<ApiPlugin as kube::Resource>::api_version(&()), "kongsync.io/v1");
    }
}
