//! Subcommands and the input/output plumbing they share.

pub mod check;
pub mod preview;
pub mod sync;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use catalog_sync::config::load_settings;
use catalog_sync::{ConfigError, EventSink, SyncConfig, SyncEvent};
use catalog_sync_core::ProductBundle;
use thiserror::Error;

/// Errors reading bundles or writing results.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid bundle #{index} in {path}: {source}")]
    Bundle {
        path: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write output: {0}")]
    Write(#[from] io::Error),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Replace the configured settings with a file given on the command line.
pub fn with_settings(mut config: SyncConfig, path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    if let Some(path) = path {
        config.settings = load_settings(path)?;
        config.settings_path = Some(path.to_path_buf());
    }
    Ok(config)
}

/// Read bundles from a file, or stdin for `None` / `-`.
///
/// Accepts one JSON document or any number of whitespace-separated ones
/// (JSON lines).
pub fn read_bundles(path: Option<&Path>) -> Result<Vec<ProductBundle>, IoError> {
    let (label, input) = match path.filter(|p| p.as_os_str() != "-") {
        Some(path) => {
            let label = path.display().to_string();
            let input = fs::read_to_string(path).map_err(|source| IoError::Read {
                path: label.clone(),
                source,
            })?;
            (label, input)
        }
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .map_err(|source| IoError::Read {
                    path: "stdin".to_string(),
                    source,
                })?;
            ("stdin".to_string(), input)
        }
    };

    parse_bundles(&input, &label)
}

fn parse_bundles(input: &str, label: &str) -> Result<Vec<ProductBundle>, IoError> {
    serde_json::Deserializer::from_str(input)
        .into_iter::<ProductBundle>()
        .enumerate()
        .map(|(index, bundle)| {
            bundle.map_err(|source| IoError::Bundle {
                path: label.to_string(),
                index: index + 1,
                source,
            })
        })
        .collect()
}

/// Writes each event as one JSON line.
///
/// The first write error is kept and returned by [`Self::finish`]; later
/// events are dropped.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    error: Option<IoError>,
}

impl<W: Write> JsonLinesSink<W> {
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Write one value outside of the event stream.
    pub fn write_value<T: serde::Serialize>(&mut self, value: &T) -> Result<(), IoError> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, IoError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: SyncEvent) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_value(&event) {
            tracing::error!(error = %e, "dropping result events");
            self.error = Some(e);
        }
    }
}

/// Settings path for display.
fn display_path(path: Option<&PathBuf>) -> String {
    path.map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalog_sync::catalog::CatalogError;
    use catalog_sync::{FailureScope, ItemFailure};

    #[test]
    fn test_parse_single_bundle() {
        let input = r#"{"products": [{"sku": "A"}, {"sku": "B"}]}"#;
        let bundles = parse_bundles(input, "test").unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles.first().unwrap().skus(), vec!["A", "B"]);
    }

    #[test]
    fn test_parse_json_lines() {
        let input = "{\"products\": [{\"sku\": \"A\"}]}\n{\"products\": [{\"sku\": \"B\"}]}\n";
        let bundles = parse_bundles(input, "test").unwrap();
        assert_eq!(bundles.len(), 2);
    }

    #[test]
    fn test_parse_reports_bad_bundle_index() {
        let input = "{\"products\": []}\n{\"products\": 5}\n";
        let err = parse_bundles(input, "bundles.jsonl").unwrap_err();
        assert!(matches!(err, IoError::Bundle { index: 2, .. }));
        assert!(err.to_string().contains("bundles.jsonl"));
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_event() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(
            ItemFailure::new(FailureScope::CreateProduct, "A", CatalogError::Unauthorized).into(),
        );
        sink.emit(
            ItemFailure::new(FailureScope::DeleteProduct, "B", CatalogError::Unauthorized).into(),
        );

        let output = String::from_utf8(sink.finish().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines.first().unwrap()).unwrap();
        assert_eq!(first["scope"], "create_product");
        assert_eq!(first["status"], 401);
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(None), "(defaults)");
        assert_eq!(
            display_path(Some(&PathBuf::from("/etc/sync.yaml"))),
            "/etc/sync.yaml"
        );
    }
}
