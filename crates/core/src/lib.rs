//! Catalog Sync Core - domain types and reconciliation algorithms.
//!
//! This crate provides everything the sync service needs that does not talk
//! to the network:
//! - `sync` - the orchestrator and BigCommerce client (depends on this crate)
//! - `cli` - command-line entry point
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks (the current time is passed in). Every function here
//! can be exercised in a plain unit test.
//!
//! # Modules
//!
//! - [`types`] - Source records, remote records, write payloads and typed IDs
//! - [`fields`] - Custom field / metafield diffing
//! - [`mapper`] - Source record to product payload mapping
//! - [`linker`] - Cross-reference fields between sibling products
//! - [`variants`] - Option value diffing and variant mapping
//! - [`settings`] - Sync behavior settings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fields;
pub mod linker;
pub mod mapper;
pub mod settings;
pub mod types;
pub mod variants;

pub use settings::{SettingsError, SyncMode, SyncSettings};
pub use types::*;
