//! Credential resolution for Google API connectors.
//!
//! A [`CredentialResolver`](resolver::CredentialResolver) walks an ordered list of
//! [`TokenSource`](token_source::TokenSource)s (a live credential owned by the host, a service
//! account key, a stored user credential) and falls back to settings saved by older versions.
//!
//! ```ignore
//! use gconnector_auth::config::PersistedConfig;
//!
//! let config = PersistedConfig::from_file("connector.json").await?;
//! let token = gconnector_auth::resolve_token(&config).await?;
//! let header = token.value();
//! ```
pub mod config;
pub mod credentials;
pub mod error;
pub mod key;
mod misc;
pub mod provider;
pub mod resolver;
pub mod scope;
pub mod token;
pub mod token_source;

pub use provider::{candidates, create_resolver, resolve_token};
