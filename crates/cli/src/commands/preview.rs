//! Offline mapping preview.
//!
//! # Usage
//!
//! ```bash
//! catalog-sync preview --bundle bundle.json --settings sync.yaml
//! ```
//!
//! Prints the product payloads each bundle maps to as JSON lines. No
//! credentials are needed and the catalog is never called, so existing
//! remote state (visibility, field ids, variants) is not reflected.

use std::io;
use std::path::Path;

use catalog_sync::config::load_settings;
use catalog_sync::engine::preview;
use catalog_sync::{ConfigError, SyncConfig};
use catalog_sync_core::SyncSettings;
use chrono::Utc;

use super::{JsonLinesSink, read_bundles};

/// Settings for a preview.
///
/// An explicit file wins, then the loaded configuration. Without either the
/// defaults are used, since a preview does not need credentials.
///
/// # Errors
///
/// Returns an error if an explicit settings file cannot be loaded.
pub fn settings(
    path: Option<&Path>,
    config: Result<SyncConfig, ConfigError>,
) -> Result<SyncSettings, ConfigError> {
    if let Some(path) = path {
        return load_settings(path);
    }
    match config {
        Ok(config) => Ok(config.settings),
        Err(e) => {
            tracing::warn!("Using default settings: {e}");
            Ok(SyncSettings::default())
        }
    }
}

/// Map every bundle in the input and print the payloads.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the input cannot be read
/// or the output written.
pub fn run(settings: &SyncSettings, bundle: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    settings.validate()?;
    let bundles = read_bundles(bundle)?;
    let now = Utc::now();

    let mut out = JsonLinesSink::new(io::stdout().lock());
    for bundle in &bundles {
        for payload in preview(settings, bundle, now) {
            out.write_value(&payload)?;
        }
    }
    out.finish()?;

    Ok(())
}
