//! Catalog Sync - bundle reconciliation against a BigCommerce catalog.
//!
//! # Modules
//!
//! - [`catalog`] - The [`CatalogClient`] seam and its BigCommerce REST implementation
//! - [`engine`] - The bundle orchestrator (sibling and variant modes)
//! - [`report`] - Result events and the sink they are written to
//! - [`error`] - Bundle-level and per-item failures
//! - [`config`] - Environment configuration and settings file loading
//!
//! # Example
//!
//! ```rust,ignore
//! let config = SyncConfig::from_env()?;
//! let client = BigCommerceClient::new(&config.bigcommerce)?;
//! let orchestrator = Orchestrator::new(client, config.settings)?;
//!
//! let mut events = Vec::new();
//! let summary = orchestrator.sync_bundle(&bundle, &mut events).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;

pub use catalog::{BigCommerceClient, CatalogClient, CatalogError};
pub use config::{BigCommerceConfig, ConfigError, LogFormat, SyncConfig};
pub use engine::Orchestrator;
pub use error::{FailureScope, ItemError, ItemFailure, SyncError};
pub use report::{BundleSummary, EventSink, ProductAction, SyncEvent};
