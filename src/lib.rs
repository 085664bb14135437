//! Shopwire - resilient storefront API client
//!
//! This library provides the request-coordination layer for a consumer
//! storefront backend: response caching with expiry, in-flight request
//! coalescing, bounded retry with exponential backoff, and delegated
//! authentication recovery.
//!
//! # High-Level API
//!
//! The [`coordinator`] module provides the main entry point:
//!
//! ```ignore
//! use shopwire::auth::{MemoryTokenStore, SlotCredentials};
//! use shopwire::config::ClientConfig;
//! use shopwire::coordinator::{RequestCoordinator, RequestOptions};
//! use shopwire::interpret::StandardInterpreter;
//! use shopwire::transport::HttpTransport;
//!
//! let config = ClientConfig::new("https://api.example-shop.com");
//! let transport = HttpTransport::new()?;
//! let interpreter = StandardInterpreter::new(refresher);
//! let credentials = SlotCredentials::new(store, ["auth_token", "session_token"]);
//!
//! let client = RequestCoordinator::new(config, transport, interpreter, credentials);
//! let products = client.get("/products", RequestOptions::default()).await?;
//! ```

pub mod auth;
pub mod cache;
pub mod coalesce;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod interpret;
pub mod key;
pub mod transport;

/// Version of the shopwire library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
