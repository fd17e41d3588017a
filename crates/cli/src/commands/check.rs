//! Configuration check.
//!
//! # Usage
//!
//! ```bash
//! catalog-sync check-config
//! catalog-sync check-config --settings sync.yaml
//! ```

use std::io::{self, Write};

use catalog_sync::{BigCommerceClient, SyncConfig};

use super::display_path;

/// Validate configuration and print a redacted summary.
///
/// # Errors
///
/// Returns an error if the settings are invalid, the client cannot be built
/// or the summary cannot be written.
pub fn run(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.settings.validate()?;
    BigCommerceClient::new(&config.bigcommerce)?;

    let mut out = io::stdout().lock();
    write_summary(&mut out, config)?;
    out.flush()?;

    tracing::info!("Configuration OK");
    Ok(())
}

fn write_summary(out: &mut impl Write, config: &SyncConfig) -> io::Result<()> {
    let bc = &config.bigcommerce;
    let settings = &config.settings;

    writeln!(out, "BigCommerce")?;
    writeln!(out, "  store hash:    {}", bc.store_hash)?;
    writeln!(out, "  client id:     {}", bc.client_id)?;
    writeln!(out, "  access token:  [REDACTED]")?;
    writeln!(out, "  api:           {} ({})", bc.api_url, bc.api_version)?;
    writeln!(out, "Settings {}", display_path(config.settings_path.as_ref()))?;
    writeln!(out, "  mode:          {:?}", settings.mode)?;
    writeln!(out, "  custom fields: {}", settings.custom_fields.len())?;
    writeln!(
        out,
        "  meta fields:   {} (namespace: {})",
        settings.meta_fields.len(),
        settings.meta_namespace().unwrap_or("none")
    )?;
    writeln!(out, "  disambiguate:  {}", settings.disambiguate)?;
    writeln!(out, "  track stock:   {}", settings.track_inventory)?;
    writeln!(
        out,
        "  unpurchasable: {}",
        settings.not_purchasable_formats.join(", ")
    )?;
    writeln!(
        out,
        "Sentry          {}",
        if config.sentry_dsn.is_some() { "enabled" } else { "disabled" }
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalog_sync::{BigCommerceConfig, LogFormat};
    use catalog_sync_core::SyncSettings;

    #[test]
    fn test_summary_redacts_token() {
        let config = SyncConfig {
            bigcommerce: BigCommerceConfig {
                store_hash: "abc123".to_string(),
                client_id: "client-1".to_string(),
                access_token: "k7d2m9qx4vt8bn3wz6ph1rj5cf0ys".to_string().into(),
                api_url: "https://api.bigcommerce.com".parse().unwrap(),
                api_version: "v3".to_string(),
            },
            settings: SyncSettings::default(),
            settings_path: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            log_format: LogFormat::Text,
        };

        let mut out = Vec::new();
        write_summary(&mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("abc123"));
        assert!(text.contains("[REDACTED]"));
        assert!(!text.contains("k7d2m9qx4vt8bn3wz6ph1rj5cf0ys"));
        assert!(text.contains("(defaults)"));
    }
}
