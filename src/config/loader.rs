//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `canary-metrics.toml`, validating provider and check
//! definitions, and resolving provider credentials from the environment.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use super::{AppConfig, ProviderEntry};
use crate::domain::interval::MetricInterval;
use crate::domain::provider::Credentials;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "CANARY_METRICS_CONFIG";

/// Config file used when `CANARY_METRICS_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "canary-metrics.toml";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse configuration")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate provider and check definitions.
///
/// Checks for:
/// - At least one provider, with unique non-empty names
/// - Every check referencing a known provider with a non-empty query
/// - A parseable metric interval
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.providers.is_empty(),
    "At least one provider must be configured"
  );

  let mut names = HashSet::new();
  for (i, provider) in config.providers.iter().enumerate() {
    anyhow::ensure!(!provider.name.is_empty(), "Provider {} has an empty name", i);
    anyhow::ensure!(
      names.insert(provider.name.as_str()),
      "Provider name '{}' is defined more than once",
      provider.name
    );
  }

  for (i, check) in config.checks.iter().enumerate() {
    anyhow::ensure!(
      names.contains(check.provider.as_str()),
      "Check {} ({}) references unknown provider '{}'",
      i,
      check.name,
      check.provider
    );
    anyhow::ensure!(
      !check.query.trim().is_empty(),
      "Check {} ({}) has an empty query",
      i,
      check.name
    );
  }

  MetricInterval::parse(&config.probe.interval)
    .with_context(|| format!("Invalid probe interval '{}'", config.probe.interval))?;

  anyhow::ensure!(
    !config.metrics.enabled || !config.metrics.bind_address.is_empty(),
    "Metrics bind_address must not be empty when metrics are enabled"
  );

  Ok(())
}

/// Read a provider's credentials from the environment.
///
/// # Errors
/// Names the first environment variable that is not set.
pub fn resolve_credentials(entry: &ProviderEntry) -> Result<Credentials> {
  resolve_credentials_with(entry, |var| std::env::var(var).ok())
}

/// Resolve credentials through `lookup` (the environment in production).
pub fn resolve_credentials_with(
  entry: &ProviderEntry,
  lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
  let mut credentials = Credentials::new();
  for (key, var) in &entry.credentials_env {
    let secret = lookup(var).with_context(|| {
      format!("{var} not set (credential '{key}' of provider '{}')", entry.name)
    })?;
    credentials.insert(key.clone(), secret.into_bytes());
  }
  Ok(credentials)
}

#[cfg(test)]
mod tests {
  use super::*;

  const EXAMPLE: &str = r#"
[probe]
name = "checkout-canary"
interval = "30s"

[[providers]]
name = "dd"
type = "datadog"

[providers.credentials_env]
datadog_api_key = "DD_API_KEY"
datadog_application_key = "DD_APP_KEY"

[[providers]]
name = "prom"
address = "http://prometheus.monitoring:9090"

[[checks]]
name = "error-rate"
provider = "dd"
query = "sum:trace.http.request.errors{service:checkout}.as_count()"

[[checks]]
name = "p99"
provider = "prom"
query = "histogram_quantile(0.99, sum(rate(http_request_duration_seconds_bucket[1m])) by (le))"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_example() {
    let config = parse_config(EXAMPLE).unwrap();
    assert_eq!(config.probe.log_level, "info");
    assert!(!config.probe.run_once);
    assert_eq!(config.providers.len(), 2);
    assert_eq!(config.providers[0].provider_config().provider_type, "datadog");
    assert_eq!(config.providers[1].provider_type, "");
    assert_eq!(config.checks.len(), 2);
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.bind_address, "0.0.0.0:9090");
  }

  #[test]
  fn test_rejects_unknown_provider_reference() {
    let bad = EXAMPLE.replace("provider = \"prom\"", "provider = \"graphite\"");
    let err = parse_config(&bad).unwrap_err();
    assert!(err.to_string().contains("unknown provider 'graphite'"), "{err}");
  }

  #[test]
  fn test_rejects_duplicate_provider_names() {
    let bad = EXAMPLE.replace("name = \"prom\"", "name = \"dd\"");
    assert!(parse_config(&bad).is_err());
  }

  #[test]
  fn test_rejects_bad_interval() {
    let bad = EXAMPLE.replace("interval = \"30s\"", "interval = \"half a minute\"");
    assert!(parse_config(&bad).is_err());
  }

  #[test]
  fn test_resolve_credentials() {
    let config = parse_config(EXAMPLE).unwrap();
    let creds = resolve_credentials_with(&config.providers[0], |var| match var {
      "DD_API_KEY" => Some("api".to_string()),
      "DD_APP_KEY" => Some("app".to_string()),
      _ => None,
    })
    .unwrap();
    assert_eq!(creds["datadog_api_key"], b"api".to_vec());
    assert_eq!(creds["datadog_application_key"], b"app".to_vec());

    let err = resolve_credentials_with(&config.providers[0], |_| None).unwrap_err();
    assert!(err.to_string().contains("DD_API_KEY"), "{err}");
  }

  #[test]
  fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/", "canary-metrics.toml");
    let config = load_config(path).unwrap();
    assert_eq!(config.providers.len(), 3);

    let cw = config.checks.iter().find(|c| c.provider == "cw").unwrap();
    let queries = crate::adapters::cloudwatch::query::decode_queries(&cw.query).unwrap();
    assert_eq!(queries[0].id, "errors");
  }
}
