//! # gconnector-client
//!
//! Facade over credential resolution and the retrying invoker.
//!
//! ```ignore
//! use google_connector_auth::config::PersistedConfig;
//! use gconnector_client::client::{Client, ClientConfig};
//!
//! async fn run(persisted: &PersistedConfig) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
//!     let client = Client::from_persisted(persisted, None, ClientConfig::default())?;
//!     let datasets = client
//!         .get_json("https://bigquery.googleapis.com/bigquery/v2/projects/my-project/datasets")
//!         .await?;
//!     Ok(datasets)
//! }
//! ```
pub mod client;
pub mod error;
pub mod http;

pub use client::{Client, ClientConfig};
