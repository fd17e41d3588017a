//! Catalog Sync CLI - reconcile product bundles against a BigCommerce catalog.
//!
//! # Usage
//!
//! ```bash
//! # Reconcile one bundle file, events go to stdout as JSON lines
//! catalog-sync sync --bundle bundle.json
//!
//! # Reconcile bundles streamed as JSON lines on stdin
//! cat bundles.jsonl | catalog-sync sync
//!
//! # Show the payloads a bundle maps to, without touching the catalog
//! catalog-sync preview --bundle bundle.json --settings sync.yaml
//!
//! # Validate configuration
//! catalog-sync check-config
//! ```
//!
//! # Commands
//!
//! - `sync` - Reconcile bundles and emit one result event per item
//! - `preview` - Map bundles to product payloads offline
//! - `check-config` - Load configuration and print a redacted summary

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use catalog_sync::{LogFormat, SyncConfig};
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(author, version, about = "Reconcile product bundles against a BigCommerce catalog")]
struct Cli {
    /// Sync settings YAML, overrides `CATALOG_SYNC_SETTINGS`
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile bundles against the catalog
    Sync {
        /// Bundle JSON or JSON lines file, `-` or omitted for stdin
        #[arg(short, long)]
        bundle: Option<PathBuf>,
    },
    /// Print the product payloads bundles map to, without remote calls
    Preview {
        /// Bundle JSON or JSON lines file, `-` or omitted for stdin
        #[arg(short, long)]
        bundle: Option<PathBuf>,
    },
    /// Load and validate configuration
    CheckConfig,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Logs go to stderr so stdout carries only result events.
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "catalog_sync=info,catalog_sync_cli=info".into());

    let is_json = format == LogFormat::Json;
    let json_layer = is_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!is_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Preview runs without credentials, so a config error is only fatal to
    // the commands that need one.
    let config = SyncConfig::from_env();

    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing(
        config
            .as_ref()
            .map_or_else(|_| LogFormat::default(), |c| c.log_format),
    );

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: Result<SyncConfig, catalog_sync::ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sync { bundle } => {
            let config = commands::with_settings(config?, cli.settings.as_deref())?;
            commands::sync::run(&config, bundle.as_deref()).await?;
        }
        Commands::Preview { bundle } => {
            let settings = commands::preview::settings(cli.settings.as_deref(), config)?;
            commands::preview::run(&settings, bundle.as_deref())?;
        }
        Commands::CheckConfig => {
            let config = commands::with_settings(config?, cli.settings.as_deref())?;
            commands::check::run(&config)?;
        }
    }
    Ok(())
}
