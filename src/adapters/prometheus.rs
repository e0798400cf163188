//! Prometheus Provider - Instant Query API Client
//!
//! Runs PromQL instant queries against `/api/v1/query` on any
//! Prometheus-compatible server (Prometheus, Thanos, VictoriaMetrics,
//! Cortex). Optional basic auth comes from the `username` and
//! `password` credentials.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::http::{BackendHttpClient, DEFAULT_TIMEOUT};
use crate::domain::error::{ProviderError, ProviderResult};
use crate::domain::provider::{credential_text, Credentials, ProviderConfig, ProviderType};
use crate::ports::metrics_provider::MetricsProvider;

/// Server address used when the provider has none configured.
pub const DEFAULT_ADDRESS: &str = "http://prometheus:9090";

const QUERY_PATH: &str = "/api/v1/query";

/// Credential key for the basic auth user.
pub const USERNAME_SECRET_KEY: &str = "username";
/// Credential key for the basic auth password.
pub const PASSWORD_SECRET_KEY: &str = "password";

/// Query used by the health check; a healthy server answers 1.
const ONLINE_QUERY: &str = "vector(1)";

#[derive(Debug, Deserialize)]
struct PrometheusResponse {
    data: PrometheusData,
}

#[derive(Debug, Deserialize)]
struct PrometheusData {
    result: PrometheusResult,
}

/// Instant queries return either a vector of samples or a bare scalar.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrometheusResult {
    Vector(Vec<PrometheusSample>),
    Scalar((f64, String)),
}

#[derive(Debug, Deserialize)]
struct PrometheusSample {
    /// `[unix_seconds, "value"]`
    value: (f64, String),
}

#[derive(Clone)]
struct BasicAuth {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Prometheus metrics client.
#[derive(Debug, Clone)]
pub struct PrometheusProvider {
    http: BackendHttpClient,
    query_endpoint: String,
    auth: Option<BasicAuth>,
}

impl PrometheusProvider {
    /// Build a client from the provider config and credentials.
    ///
    /// Basic auth is enabled when either `username` or `password` is
    /// present, and then both are required.
    ///
    /// # Errors
    /// - `MissingCredential` when only one half of basic auth is given
    /// - `ClientBuild` if the HTTP client cannot be created
    pub fn new(config: &ProviderConfig, credentials: &Credentials) -> ProviderResult<Self> {
        let address = config.address_or(DEFAULT_ADDRESS).trim_end_matches('/');

        let username = credential_text(credentials, USERNAME_SECRET_KEY);
        let password = credential_text(credentials, PASSWORD_SECRET_KEY);
        let auth = match (username, password) {
            (None, None) => None,
            (Some(username), Some(password)) => Some(BasicAuth { username, password }),
            (None, Some(_)) => {
                return Err(ProviderError::MissingCredential {
                    provider: "prometheus",
                    key: USERNAME_SECRET_KEY.to_string(),
                });
            }
            (Some(_), None) => {
                return Err(ProviderError::MissingCredential {
                    provider: "prometheus",
                    key: PASSWORD_SECRET_KEY.to_string(),
                });
            }
        };

        info!(address, basic_auth = auth.is_some(), "Prometheus provider configured");

        Ok(Self {
            http: BackendHttpClient::new(DEFAULT_TIMEOUT)?,
            query_endpoint: format!("{address}{QUERY_PATH}"),
            auth,
        })
    }

    /// Replace the HTTP client, e.g. to point at a fake transport.
    #[must_use]
    pub fn with_http_client(mut self, http: BackendHttpClient) -> Self {
        self.http = http;
        self
    }

    /// Full URL of the instant query endpoint.
    pub fn query_endpoint(&self) -> &str {
        &self.query_endpoint
    }
}

#[async_trait]
impl MetricsProvider for PrometheusProvider {
    #[instrument(skip(self), fields(provider = "prometheus"))]
    async fn run_query(&self, query: &str) -> ProviderResult<f64> {
        let promql = normalize_query(query);
        debug!(promql = %promql, "Querying Prometheus");

        let mut request = self.http.get(&self.query_endpoint).query(&[("query", promql.as_str())]);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let body = self.http.execute(request).await?.ensure_ok().inspect_err(|e| {
            warn!(error = %e, "Prometheus query rejected");
        })?;

        parse_query_response(&body)
    }

    #[instrument(skip(self), fields(provider = "prometheus"))]
    async fn is_online(&self) -> ProviderResult<bool> {
        let value = self.run_query(ONLINE_QUERY).await?;
        #[allow(clippy::float_cmp)]
        let online = value == 1.0;
        Ok(online)
    }

    fn kind(&self) -> ProviderType {
        ProviderType::Prometheus
    }
}

/// Collapse multi-line queries from manifests into a single line.
fn normalize_query(query: &str) -> String {
    query
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the value of the last sample of an instant query result.
///
/// # Errors
/// `Decode` for malformed bodies or unparseable sample values,
/// `NoValues` for an empty vector or a NaN result.
pub fn parse_query_response(body: &str) -> ProviderResult<f64> {
    let decode = |reason: String| ProviderError::Decode {
        reason,
        body: body.to_string(),
    };
    let no_values = || ProviderError::NoValues {
        response: body.to_string(),
    };

    let response: PrometheusResponse =
        serde_json::from_str(body).map_err(|e| decode(e.to_string()))?;

    let raw = match &response.data.result {
        PrometheusResult::Vector(samples) => {
            &samples.last().ok_or_else(no_values)?.value.1
        }
        PrometheusResult::Scalar((_, value)) => value,
    };

    let value: f64 = raw
        .parse()
        .map_err(|e| decode(format!("invalid sample value '{raw}': {e}")))?;

    if value.is_nan() {
        return Err(no_values());
    }

    Ok(value)
}
