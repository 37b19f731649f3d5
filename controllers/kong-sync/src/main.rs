//! kong-sync controller
//!
//! Keeps a Kong gateway in sync with the cluster:
//! - GatewayApi: one Kong API object per backing Service
//! - ApiPlugin: Kong plugins attached to those API objects
//!
//! Reconciliation is event driven; a failed reconciliation is logged and
//! retried only when the next event for the same resource arrives.

mod config;
mod controller;
mod error;
mod reconciler;
mod selector;
mod store;
mod watcher;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod test_utils;

use crate::config::Args;
use crate::controller::Controller;
use crate::error::ControllerError;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Both kube and reqwest pull in rustls; pin the provider before either builds a TLS config.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting kong-sync");

    let config = Args::parse().into_config()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    info!("  Kong admin API: {}", config.kong_url);
    info!("  API label: {}", config.api_label);
    info!("  Service selector label: {}", config.service_selector_label);
    info!("  Plugin service selector label: {}", config.plugin_service_selector_label);

    let controller = Controller::new(config).await?;
    controller.run(shutdown_signal()).await?;

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
