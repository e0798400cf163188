//! Provider configuration model.
//!
//! A provider is described by its backend type, an optional address and
//! a bag of named secrets. The model is immutable once built: it is
//! consumed by the factory at client construction and never mutated.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Named secret values. Keys are backend-specific
/// (`datadog_api_key`, `username`, ...).
pub type Credentials = HashMap<String, Vec<u8>>;

/// Metrics backend kinds known to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderType {
    /// Prometheus-compatible HTTP API. Also the fallback for unknown types.
    #[default]
    Prometheus,
    /// Datadog metrics query API.
    Datadog,
    /// AWS CloudWatch `GetMetricData`.
    CloudWatch,
}

impl ProviderType {
    /// Resolve a declared type string. Unknown or empty strings resolve
    /// to Prometheus so configs written before the type field existed
    /// keep working.
    pub fn from_declared(declared: &str) -> Self {
        match declared {
            "datadog" => Self::Datadog,
            "cloudwatch" => Self::CloudWatch,
            _ => Self::Prometheus,
        }
    }

    /// Lowercase backend name, as written in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prometheus => "prometheus",
            Self::Datadog => "datadog",
            Self::CloudWatch => "cloudwatch",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Declared backend type; anything unrecognized means Prometheus.
    #[serde(rename = "type", default)]
    pub provider_type: String,
    /// Backend base URL or CloudWatch monitoring host. Empty means default.
    #[serde(default)]
    pub address: String,
}

impl ProviderConfig {
    /// Build a config from a type string and address.
    pub fn new(provider_type: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            address: address.into(),
        }
    }

    /// The backend this config dispatches to.
    pub fn kind(&self) -> ProviderType {
        ProviderType::from_declared(&self.provider_type)
    }

    /// The configured address, or `default` when none was given.
    pub fn address_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.address.is_empty() {
            default
        } else {
            &self.address
        }
    }
}

/// Look up a credential and decode it as UTF-8 text.
///
/// Returns `None` when the key is absent. Invalid UTF-8 is replaced
/// lossily; secrets are opaque tokens and are passed through as-is.
pub fn credential_text(credentials: &Credentials, key: &str) -> Option<String> {
    credentials
        .get(key)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
