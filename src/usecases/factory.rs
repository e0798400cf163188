//! Provider Factory - Backend Client Construction
//!
//! Maps a declarative provider config to a ready-to-use backend
//! client. Construction is a single attempt with no retries and no
//! network round trip; each constructor's error is returned unchanged.
//!
//! Unknown or empty provider types resolve to Prometheus so configs
//! written before the type field existed keep working.

use tracing::{debug, warn};

use crate::adapters::cloudwatch::CloudWatchProvider;
use crate::adapters::datadog::DatadogProvider;
use crate::adapters::prometheus::PrometheusProvider;
use crate::domain::error::ProviderResult;
use crate::domain::provider::{Credentials, ProviderConfig, ProviderType};
use crate::ports::metrics_provider::MetricsProvider;

/// Builds backend clients from provider configs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderFactory;

impl ProviderFactory {
  /// Create a factory.
  pub const fn new() -> Self {
    Self
  }

  /// Construct the client for `config`.
  ///
  /// `metric_interval` sizes the Datadog lookback window and is ignored
  /// by the other backends. The call is `async` only because the AWS
  /// SDK loads its configuration asynchronously.
  ///
  /// # Errors
  /// Whatever the selected backend's constructor reports: missing
  /// credentials, an unparseable interval, an unusable address.
  pub async fn provider(
    &self,
    metric_interval: &str,
    config: &ProviderConfig,
    credentials: &Credentials,
  ) -> ProviderResult<Box<dyn MetricsProvider>> {
    let kind = config.kind();

    if kind == ProviderType::Prometheus && config.provider_type != "prometheus" {
      if config.provider_type.is_empty() {
        debug!("No provider type declared, using prometheus");
      } else {
        warn!(
          declared = %config.provider_type,
          "Unknown provider type, falling back to prometheus"
        );
      }
    }

    debug!(provider = %kind, address = %config.address, "Constructing metrics provider");

    let provider: Box<dyn MetricsProvider> = match kind {
      ProviderType::Prometheus => Box::new(PrometheusProvider::new(config, credentials)?),
      ProviderType::Datadog => {
        Box::new(DatadogProvider::new(metric_interval, config, credentials)?)
      }
      ProviderType::CloudWatch => Box::new(CloudWatchProvider::new(config).await?),
    };

    Ok(provider)
  }
}
