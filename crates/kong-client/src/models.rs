//! Kong admin API models
//!
//! These models cover the subset of the Kong 0.x admin API (`/apis`,
//! `/upstreams`, `/plugins`) that kong-sync manages. Empty/zero fields are
//! omitted on the wire so Kong applies its own defaults.

use serde::{Deserialize, Serialize};

/// Kong API object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Api {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
    pub upstream_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_uri: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_host: Option<bool>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub upstream_connect_timeout: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub upstream_send_timeout: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub upstream_read_timeout: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_if_terminated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Api {
    /// Identifier to address this API by: the Kong id once known, the name otherwise.
    pub fn name_or_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Kong upstream (load balancer virtual host)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// Kong upstream target. Targets are append-only: the latest entry for a
/// given `target` wins, and weight 0 disables it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub target: String,
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

/// Weight given to a target by [`crate::KongClientTrait::enable_target`]
pub const TARGET_ENABLED_WEIGHT: u32 = 10;

/// Kong plugin instance attached to an API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Plugin {
    /// Desired plugin definition (no instance fields) with the given config.
    pub fn new(name: impl Into<String>, config: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: None,
            api_id: None,
            name: name.into(),
            config,
            enabled: true,
            created_at: None,
        }
    }
}

/// List envelope returned by Kong 0.x collection endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KongList<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

pub type PluginList = KongList<Plugin>;
pub type TargetList = KongList<Target>;

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn enabled_by_default() -> bool {
    true
}
