//! kong-sync CRD Definitions
//!
//! Kubernetes Custom Resource Definitions watched by the kong-sync controllers.

pub mod api_plugin;
pub mod gateway_api;

pub use api_plugin::*;
pub use gateway_api::*;
