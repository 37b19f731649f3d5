//! Kong admin API client
//!
//! A Rust client for the Kong 0.x admin API, covering the API objects,
//! plugins, upstreams and targets that the kong-sync controllers manage.
//!
//! # Example
//!
//! ```no_run
//! use kong_client::{Api, KongClient, KongClientTrait};
//!
//! # async fn example() -> Result<(), kong_client::KongError> {
//! let client = KongClient::new("http://kong:8001".to_string(), None)?;
//! client.status().await?;
//!
//! let api = Api {
//!     name: "myapp-auth".to_string(),
//!     uris: vec!["/oauth".to_string()],
//!     upstream_url: "10.0.0.5:3000".to_string(),
//!     strip_uri: Some(true),
//!     ..Default::default()
//! };
//! client.create_api(&api).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod kong_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KongClient;
pub use common::HttpClient;
pub use error::KongError;
pub use models::*;
pub use kong_trait::KongClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockKongClient;
