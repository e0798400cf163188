//! Backend HTTP Client - Timeout-bounded GET Requests
//!
//! Wraps reqwest for the HTTP-based metrics backends (Datadog,
//! Prometheus). Each backend client owns one of these; nothing is
//! shared process-wide, so timeouts and transports stay local and a
//! test can inject a client pointed at a fake server.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, warn};

use crate::domain::error::{ProviderError, ProviderResult};

/// Request timeout used by the HTTP backends.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct RawResponse {
  /// HTTP status returned by the backend.
  pub status: StatusCode,
  /// Full response body as text.
  pub body: String,
}

impl RawResponse {
  /// Return the body if the status is exactly 200, otherwise an
  /// `ErrorResponse` that carries the body for diagnosis.
  pub fn ensure_ok(self) -> ProviderResult<String> {
    if self.status == StatusCode::OK {
      Ok(self.body)
    } else {
      Err(ProviderError::ErrorResponse {
        status: self.status.as_u16(),
        body: self.body,
      })
    }
  }
}

/// Timeout-bounded HTTP client owned by a single backend client.
#[derive(Debug, Clone)]
pub struct BackendHttpClient {
  /// Underlying HTTP client.
  http: Client,
  /// Per-request timeout.
  timeout: Duration,
}

impl BackendHttpClient {
  /// Build a new client with its own connection pool.
  ///
  /// # Errors
  /// Returns `ProviderError::ClientBuild` if the TLS backend fails to
  /// initialize.
  pub fn new(timeout: Duration) -> ProviderResult<Self> {
    let http = Client::builder()
      .timeout(timeout)
      .pool_max_idle_per_host(5)
      .build()
      .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;

    Ok(Self { http, timeout })
  }

  /// Wrap an existing reqwest client. The timeout is still applied to
  /// every request, whatever the injected client was configured with.
  pub const fn with_client(http: Client, timeout: Duration) -> Self {
    Self { http, timeout }
  }

  /// The per-request timeout.
  pub const fn timeout(&self) -> Duration {
    self.timeout
  }

  /// Start a GET request against `url`.
  pub fn get(&self, url: &str) -> RequestBuilder {
    self.http.get(url).timeout(self.timeout)
  }

  /// Send a request and read the whole body.
  ///
  /// Exactly one attempt is made; connection failures and timeouts
  /// surface as `ProviderError::Transport`.
  pub async fn execute(&self, request: RequestBuilder) -> ProviderResult<RawResponse> {
    let response = request.send().await.map_err(|e| {
      warn!(error = %e, "Backend request failed");
      ProviderError::Transport(e)
    })?;

    let status = response.status();
    let body = response.text().await?;

    debug!(status = %status, bytes = body.len(), "Backend responded");

    Ok(RawResponse { status, body })
  }
}
