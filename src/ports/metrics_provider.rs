//! Metrics Provider Port - Backend-agnostic Query Interface
//!
//! Defines the contract every metrics backend client satisfies.
//! The canary controller only ever talks to this trait; the factory
//! decides which concrete client sits behind it.
//!
//! Contract:
//! - `run_query` issues exactly one outbound call with a bounded
//!   timeout and returns the most recent datapoint's value
//! - `is_online` is a lightweight reachability/credential check
//! - neither method panics; every failure is a `ProviderError`

use async_trait::async_trait;

use crate::domain::error::ProviderResult;
use crate::domain::provider::ProviderType;

/// A configured client bound to one metrics backend.
///
/// Implementations hold only immutable configuration and a reusable
/// HTTP/SDK client, so a single instance may serve concurrent calls.
#[async_trait]
pub trait MetricsProvider: Send + Sync + 'static {
  /// Execute `query` over the most recent window and return the last
  /// datapoint's value.
  ///
  /// Fails on transport errors, non-success status, malformed bodies
  /// and empty result sets (`ProviderError::NoValues`).
  async fn run_query(&self, query: &str) -> ProviderResult<f64>;

  /// Check that the backend is reachable and the credentials are valid.
  async fn is_online(&self) -> ProviderResult<bool>;

  /// Which backend this client talks to.
  fn kind(&self) -> ProviderType;
}

#[async_trait]
impl<P: MetricsProvider + ?Sized> MetricsProvider for Box<P> {
  async fn run_query(&self, query: &str) -> ProviderResult<f64> {
    (**self).run_query(query).await
  }

  async fn is_online(&self) -> ProviderResult<bool> {
    (**self).is_online().await
  }

  fn kind(&self) -> ProviderType {
    (**self).kind()
  }
}
