//! Datadog Provider - Metrics Query API Client
//!
//! Executes Datadog metric queries against `/api/v1/query` and checks
//! API/application keys against `/api/v1/validate`.
//! See <https://docs.datadoghq.com/api/>.
//!
//! The lookback window is ten metric intervals wide: Datadog ingests
//! with a delay and sparse series may not have a point in every
//! interval.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::http::{BackendHttpClient, DEFAULT_TIMEOUT};
use crate::domain::error::{ProviderError, ProviderResult};
use crate::domain::interval::MetricInterval;
use crate::domain::provider::{credential_text, Credentials, ProviderConfig, ProviderType};
use crate::ports::metrics_provider::MetricsProvider;

/// Default API host when the provider has no address.
pub const DEFAULT_HOST: &str = "https://api.datadoghq.com";

const METRICS_QUERY_PATH: &str = "/api/v1/query";
const API_KEY_VALIDATION_PATH: &str = "/api/v1/validate";

/// Credential key holding the API key.
pub const API_KEY_SECRET_KEY: &str = "datadog_api_key";
const API_KEY_HEADER: &str = "DD-API-KEY";

/// Credential key holding the application key.
pub const APPLICATION_KEY_SECRET_KEY: &str = "datadog_application_key";
const APPLICATION_KEY_HEADER: &str = "DD-APPLICATION-KEY";

/// Lookback window size, in metric intervals.
pub const FROM_DELTA_MULTIPLIER: u32 = 10;

/// Query response body. Only the fields we read are modelled.
#[derive(Debug, Deserialize)]
struct DatadogResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    series: Vec<DatadogSeries>,
}

#[derive(Debug, Deserialize)]
struct DatadogSeries {
    /// `[timestamp_ms, value]` pairs; values may be null.
    #[serde(default, deserialize_with = "null_as_empty")]
    pointlist: Vec<Vec<Option<f64>>>,
}

/// Datadog sends `null` for empty lists in some responses.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Datadog metrics client.
#[derive(Clone)]
pub struct DatadogProvider {
    http: BackendHttpClient,
    metrics_query_endpoint: String,
    api_key_validation_endpoint: String,
    api_key: String,
    application_key: String,
    /// Lookback window in seconds.
    from_delta: i64,
}

impl std::fmt::Debug for DatadogProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogProvider")
            .field("metrics_query_endpoint", &self.metrics_query_endpoint)
            .field("api_key_validation_endpoint", &self.api_key_validation_endpoint)
            .field("from_delta", &self.from_delta)
            .finish_non_exhaustive()
    }
}

impl DatadogProvider {
    /// Build a client from the metric interval, provider config and
    /// credentials.
    ///
    /// # Errors
    /// - `MissingCredential` naming `datadog_api_key` or
    ///   `datadog_application_key` (checked in that order)
    /// - `InvalidInterval` if the metric interval does not parse
    /// - `ClientBuild` if the HTTP client cannot be created
    pub fn new(
        metric_interval: &str,
        config: &ProviderConfig,
        credentials: &Credentials,
    ) -> ProviderResult<Self> {
        let address = config.address_or(DEFAULT_HOST).trim_end_matches('/');

        let api_key = credential_text(credentials, API_KEY_SECRET_KEY).ok_or_else(|| {
            ProviderError::MissingCredential {
                provider: "datadog",
                key: API_KEY_SECRET_KEY.to_string(),
            }
        })?;

        let application_key = credential_text(credentials, APPLICATION_KEY_SECRET_KEY)
            .ok_or_else(|| ProviderError::MissingCredential {
                provider: "datadog",
                key: APPLICATION_KEY_SECRET_KEY.to_string(),
            })?;

        let interval = MetricInterval::parse(metric_interval)?;
        let from_delta = interval.lookback_seconds(FROM_DELTA_MULTIPLIER);

        info!(address, interval = %interval, from_delta, "Datadog provider configured");

        Ok(Self {
            http: BackendHttpClient::new(DEFAULT_TIMEOUT)?,
            metrics_query_endpoint: format!("{address}{METRICS_QUERY_PATH}"),
            api_key_validation_endpoint: format!("{address}{API_KEY_VALIDATION_PATH}"),
            api_key,
            application_key,
            from_delta,
        })
    }

    /// Replace the HTTP client, e.g. to point at a fake transport.
    #[must_use]
    pub fn with_http_client(mut self, http: BackendHttpClient) -> Self {
        self.http = http;
        self
    }

    /// Lookback window in seconds (`10 × metric interval`).
    pub const fn from_delta(&self) -> i64 {
        self.from_delta
    }

    /// Full URL of the metrics query endpoint.
    pub fn metrics_query_endpoint(&self) -> &str {
        &self.metrics_query_endpoint
    }

    /// Full URL of the key validation endpoint.
    pub fn api_key_validation_endpoint(&self) -> &str {
        &self.api_key_validation_endpoint
    }

    fn authorized_get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(APPLICATION_KEY_HEADER, &self.application_key)
    }
}

#[async_trait]
impl MetricsProvider for DatadogProvider {
    #[instrument(skip(self), fields(provider = "datadog"))]
    async fn run_query(&self, query: &str) -> ProviderResult<f64> {
        let now = Utc::now().timestamp();
        let from = (now - self.from_delta).to_string();
        let to = now.to_string();

        debug!(from = %from, to = %to, "Querying Datadog");

        let request = self
            .authorized_get(&self.metrics_query_endpoint)
            .query(&[("query", query), ("from", from.as_str()), ("to", to.as_str())]);

        let body = self.http.execute(request).await?.ensure_ok().inspect_err(|e| {
            warn!(error = %e, "Datadog query rejected");
        })?;

        parse_query_response(&body)
    }

    #[instrument(skip(self), fields(provider = "datadog"))]
    async fn is_online(&self) -> ProviderResult<bool> {
        let request = self.authorized_get(&self.api_key_validation_endpoint);
        self.http.execute(request).await?.ensure_ok()?;
        Ok(true)
    }

    fn kind(&self) -> ProviderType {
        ProviderType::Datadog
    }
}

/// Extract the value of the last point of the first series.
///
/// # Errors
/// `Decode` for malformed JSON, `NoValues` when there is no series, the
/// first series has no points, or the last point has no value.
pub fn parse_query_response(body: &str) -> ProviderResult<f64> {
    let response: DatadogResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode {
            reason: e.to_string(),
            body: body.to_string(),
        })?;

    let no_values = || ProviderError::NoValues {
        response: body.to_string(),
    };

    let series = response.series.first().ok_or_else(no_values)?;
    let point = series.pointlist.last().ok_or_else(no_values)?;
    if point.len() < 2 {
        return Err(no_values());
    }

    point[1].ok_or_else(no_values)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;

    use super::*;
    use crate::adapters::test_support::spawn_backend;

    fn credentials() -> Credentials {
        let mut creds = Credentials::new();
        creds.insert(API_KEY_SECRET_KEY.to_string(), b"api-key".to_vec());
        creds.insert(APPLICATION_KEY_SECRET_KEY.to_string(), b"app-key".to_vec());
        creds
    }

    fn provider_at(address: &str) -> DatadogProvider {
        DatadogProvider::new("1m", &ProviderConfig::new("datadog", address), &credentials())
            .unwrap()
    }

    fn has_keys(headers: &HeaderMap) -> bool {
        headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) == Some("api-key")
            && headers.get(APPLICATION_KEY_HEADER).and_then(|v| v.to_str().ok())
                == Some("app-key")
    }

    #[test]
    fn test_new_builds_endpoints_and_lookback() {
        let dd = DatadogProvider::new("1m", &ProviderConfig::new("datadog", ""), &credentials())
            .unwrap();
        assert_eq!(dd.metrics_query_endpoint(), "https://api.datadoghq.com/api/v1/query");
        assert_eq!(
            dd.api_key_validation_endpoint(),
            "https://api.datadoghq.com/api/v1/validate"
        );
        assert_eq!(dd.from_delta(), 600);
        assert_eq!(dd.kind(), ProviderType::Datadog);
    }

    #[test]
    fn test_new_requires_api_key() {
        let mut creds = credentials();
        creds.remove(API_KEY_SECRET_KEY);
        let err = DatadogProvider::new("1m", &ProviderConfig::default(), &creds).unwrap_err();
        assert!(err.to_string().contains("datadog_api_key"), "{err}");
    }

    #[test]
    fn test_new_requires_application_key() {
        let mut creds = credentials();
        creds.remove(APPLICATION_KEY_SECRET_KEY);
        let err = DatadogProvider::new("1m", &ProviderConfig::default(), &creds).unwrap_err();
        assert!(err.to_string().contains("datadog_application_key"), "{err}");
    }

    #[test]
    fn test_new_rejects_bad_interval() {
        let err =
            DatadogProvider::new("every minute", &ProviderConfig::default(), &credentials())
                .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInterval { .. }));
    }

    #[test]
    fn test_parse_last_point_of_first_series() {
        let body = r#"{"series":[{"pointlist":[[1000,1.0],[2000,42.5]]},{"pointlist":[[1000,7.0]]}]}"#;
        assert!((parse_query_response(body).unwrap() - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_empty_series() {
        let err = parse_query_response(r#"{"series":[]}"#).unwrap_err();
        assert!(err.is_no_data());
        assert!(err.to_string().contains("no values found"));
    }

    #[test]
    fn test_parse_null_or_missing_lists_are_no_data() {
        for body in [
            r#"{"series":null}"#,
            r#"{"status":"ok"}"#,
            r#"{"series":[{"pointlist":null}]}"#,
            r#"{"series":[{"metric":"system.cpu.user"}]}"#,
        ] {
            let err = parse_query_response(body).unwrap_err();
            assert!(err.is_no_data(), "{body}: {err}");
        }
    }

    #[test]
    fn test_parse_degenerate_points() {
        assert!(parse_query_response(r#"{"series":[{"pointlist":[]}]}"#)
            .unwrap_err()
            .is_no_data());
        assert!(parse_query_response(r#"{"series":[{"pointlist":[[1000]]}]}"#)
            .unwrap_err()
            .is_no_data());
        assert!(parse_query_response(r#"{"series":[{"pointlist":[[1000,null]]}]}"#)
            .unwrap_err()
            .is_no_data());
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_query_response("<html>oops</html>").unwrap_err();
        match err {
            ProviderError::Decode { body, .. } => assert_eq!(body, "<html>oops</html>"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_query_sends_keys_and_window() {
        let app = Router::new().route(
            METRICS_QUERY_PATH,
            get(
                |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    let from: i64 = params["from"].parse().unwrap();
                    let to: i64 = params["to"].parse().unwrap();
                    if !has_keys(&headers) || to - from != 600 || params["query"] != "avg:latency{*}" {
                        return (StatusCode::BAD_REQUEST, "bad request".to_string());
                    }
                    (
                        StatusCode::OK,
                        r#"{"series":[{"pointlist":[[1000,1.0],[2000,42.5]]}]}"#.to_string(),
                    )
                },
            ),
        );
        let base = spawn_backend(app).await;

        let value = provider_at(&base).run_query("avg:latency{*}").await.unwrap();
        assert!((value - 42.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_run_query_error_status_includes_body() {
        let app = Router::new().route(
            METRICS_QUERY_PATH,
            get(|| async { (StatusCode::FORBIDDEN, "invalid application key") }),
        );
        let base = spawn_backend(app).await;

        let err = provider_at(&base).run_query("avg:latency{*}").await.unwrap_err();
        assert!(err.to_string().contains("invalid application key"), "{err}");
    }

    #[tokio::test]
    async fn test_is_online() {
        let app = Router::new().route(
            API_KEY_VALIDATION_PATH,
            get(|headers: HeaderMap| async move {
                if has_keys(&headers) {
                    (StatusCode::OK, r#"{"valid":true}"#)
                } else {
                    (StatusCode::FORBIDDEN, r#"{"errors":["Forbidden"]}"#)
                }
            }),
        );
        let base = spawn_backend(app).await;

        assert!(provider_at(&base).is_online().await.unwrap());

        let mut creds = credentials();
        creds.insert(API_KEY_SECRET_KEY.to_string(), b"wrong".to_vec());
        let rejected =
            DatadogProvider::new("1m", &ProviderConfig::new("datadog", base.as_str()), &creds)
                .unwrap();
        let err = rejected.is_online().await.unwrap_err();
        assert!(err.to_string().contains("Forbidden"), "{err}");
    }

    #[tokio::test]
    async fn test_injected_client_timeout_bounds_slow_backend() {
        let app = Router::new().route(
            METRICS_QUERY_PATH,
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                r#"{"series":[]}"#
            }),
        );
        let base = spawn_backend(app).await;

        let http = BackendHttpClient::with_client(
            reqwest::Client::new(),
            std::time::Duration::from_millis(100),
        );
        let dd = provider_at(&base).with_http_client(http);
        assert!(matches!(
            dd.run_query("avg:system.cpu.user{*}").await.unwrap_err(),
            ProviderError::Transport(e) if e.is_timeout()
        ));
    }

    #[tokio::test]
    async fn test_is_online_unreachable() {
        let dd = provider_at("http://127.0.0.1:1");
        assert!(matches!(
            dd.is_online().await.unwrap_err(),
            ProviderError::Transport(_)
        ));
    }
}
