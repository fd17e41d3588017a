//! Bundle reconciliation command.
//!
//! # Usage
//!
//! ```bash
//! catalog-sync sync --bundle bundle.json > events.jsonl
//! ```
//!
//! One result event per source item is written to stdout as it happens. A
//! failed product lookup stops the run after its event has been written.

use std::io;
use std::path::Path;

use catalog_sync::{BigCommerceClient, Orchestrator, SyncConfig};

use super::{JsonLinesSink, display_path, read_bundles};

/// Reconcile every bundle in the input.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the client cannot be built,
/// a bundle lookup fails or the output cannot be written.
pub async fn run(config: &SyncConfig, bundle: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let bundles = read_bundles(bundle)?;
    let client = BigCommerceClient::new(&config.bigcommerce)?;
    let orchestrator = Orchestrator::new(client, config.settings.clone())?;

    tracing::info!(
        bundles = bundles.len(),
        mode = ?config.settings.mode,
        settings = %display_path(config.settings_path.as_ref()),
        "Starting sync"
    );

    let mut sink = JsonLinesSink::new(io::stdout().lock());
    let mut succeeded = 0;
    let mut failed = 0;

    for bundle in &bundles {
        let summary = match orchestrator.sync_bundle(bundle, &mut sink).await {
            Ok(summary) => summary,
            Err(e) => {
                sink.finish()?;
                return Err(e.into());
            }
        };
        succeeded += summary.succeeded;
        failed += summary.failed;
    }
    sink.finish()?;

    tracing::info!(bundles = bundles.len(), succeeded, failed, "Sync complete");
    Ok(())
}
