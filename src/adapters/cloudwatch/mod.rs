//! CloudWatch Provider - `GetMetricData` Client
//!
//! Queries are JSON arrays of metric-data-query objects. The provider
//! requests a single datapoint and returns the first value of the
//! first result.
//!
//! Sub-modules:
//! - `query`: JSON query payload types
//! - `sdk`: `MetricDataApi` implementation over `aws-sdk-cloudwatch`

pub mod query;
pub mod sdk;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use self::query::{decode_queries, MetricDataQuery};
use self::sdk::SdkMetricDataClient;
use crate::domain::error::{ProviderError, ProviderResult};
use crate::domain::provider::{ProviderConfig, ProviderType};
use crate::ports::metrics_provider::MetricsProvider;

const ADDRESS_PREFIX: &str = "monitoring.";
const ADDRESS_SUFFIXES: &[&str] = &[".amazonaws.com", ".amazonaws.com.cn"];

/// `0001-01-01T00:00:00Z` in Unix seconds, the zero timestamp used by
/// the health probe.
pub const ZERO_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// HTTP status the health probe treats as proof of reachability.
const BAD_REQUEST: u16 = 400;

/// A single `GetMetricData` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricDataRequest {
    pub queries: Vec<MetricDataQuery>,
    pub max_datapoints: Option<i32>,
    /// Unix seconds; `None` leaves the bound to the backend.
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

/// One entry of `MetricDataResults`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDataResult {
    pub id: Option<String>,
    pub values: Vec<f64>,
}

/// Failure of a `GetMetricData` call.
#[derive(Debug, Clone, Error)]
pub enum MetricDataError {
    /// The backend answered with an HTTP error status.
    #[error("request failed with status {status}: {message}")]
    RequestFailure { status: u16, message: String },
    /// Anything that never produced an HTTP response.
    #[error("{0}")]
    Other(String),
}

/// The slice of the CloudWatch API this provider uses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricDataApi: Send + Sync + 'static {
    async fn get_metric_data(
        &self,
        request: MetricDataRequest,
    ) -> Result<Vec<MetricDataResult>, MetricDataError>;
}

/// CloudWatch metrics client.
#[derive(Clone)]
pub struct CloudWatchProvider {
    client: Arc<dyn MetricDataApi>,
}

impl std::fmt::Debug for CloudWatchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudWatchProvider").finish_non_exhaustive()
    }
}

impl CloudWatchProvider {
    /// Build a client for the region encoded in the provider address
    /// (`monitoring.<region>.amazonaws.com`). With no address, the SDK's
    /// default region chain and endpoint apply.
    ///
    /// # Errors
    /// `InvalidAddress` when the address does not name a region.
    pub async fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let (region, endpoint) = if config.address.is_empty() {
            (None, None)
        } else {
            (
                Some(region_from_address(&config.address)?),
                Some(endpoint_url(&config.address)),
            )
        };

        info!(
            region = region.as_deref().unwrap_or("default"),
            endpoint = endpoint.as_deref().unwrap_or("default"),
            max_attempts = sdk::MAX_ATTEMPTS,
            "CloudWatch provider configured"
        );

        Ok(Self::with_client(
            SdkMetricDataClient::connect(region, endpoint).await,
        ))
    }

    /// Build a provider over any `MetricDataApi` implementation.
    pub fn with_client(client: impl MetricDataApi) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl MetricsProvider for CloudWatchProvider {
    #[instrument(skip(self), fields(provider = "cloudwatch"))]
    async fn run_query(&self, query: &str) -> ProviderResult<f64> {
        let queries = decode_queries(query)?;
        debug!(queries = queries.len(), "Querying CloudWatch");

        let request = MetricDataRequest {
            queries,
            max_datapoints: Some(1),
            start_time: None,
            end_time: None,
        };

        let results = self
            .client
            .get_metric_data(request)
            .await
            .map_err(|e| {
                warn!(error = %e, "CloudWatch request failed");
                match e {
                    MetricDataError::RequestFailure { status, message } => {
                        ProviderError::ErrorResponse {
                            status,
                            body: message,
                        }
                    }
                    MetricDataError::Other(reason) => {
                        ProviderError::Unexpected(format!("error requesting cloudwatch: {reason}"))
                    }
                }
            })?;

        results
            .first()
            .and_then(|r| r.values.first().copied())
            .ok_or_else(|| ProviderError::NoValues {
                response: format!("{results:?}"),
            })
    }

    /// Probe with an empty query list and zero timestamps. CloudWatch
    /// only reaches input validation (400) after authentication and
    /// routing succeeded, so a 400 counts as online. This depends on
    /// CloudWatch keeping that status for validation failures.
    #[instrument(skip(self), fields(provider = "cloudwatch"))]
    async fn is_online(&self) -> ProviderResult<bool> {
        let probe = MetricDataRequest {
            queries: Vec::new(),
            max_datapoints: None,
            start_time: Some(ZERO_TIMESTAMP_SECS),
            end_time: Some(ZERO_TIMESTAMP_SECS),
        };

        match self.client.get_metric_data(probe).await {
            Ok(_) => Ok(true),
            Err(MetricDataError::RequestFailure { status, .. }) if status == BAD_REQUEST => {
                Ok(true)
            }
            Err(MetricDataError::RequestFailure { status, message }) => {
                Err(ProviderError::UnexpectedStatus { status, message })
            }
            Err(other) => Err(ProviderError::Unexpected(other.to_string())),
        }
    }

    fn kind(&self) -> ProviderType {
        ProviderType::CloudWatch
    }
}

/// Extract the region from `monitoring.<region>.amazonaws.com`,
/// tolerating a scheme and a trailing slash.
///
/// # Errors
/// `InvalidAddress` if the host does not have that shape.
pub fn region_from_address(address: &str) -> ProviderResult<String> {
    let host = strip_scheme(address).trim_end_matches('/');

    let region = host.strip_prefix(ADDRESS_PREFIX).and_then(|rest| {
        ADDRESS_SUFFIXES
            .iter()
            .find_map(|suffix| rest.strip_suffix(suffix))
    });

    match region {
        Some(region) if !region.is_empty() && !region.contains('.') => Ok(region.to_string()),
        _ => Err(ProviderError::InvalidAddress {
            address: address.to_string(),
            reason: "expected monitoring.<region>.amazonaws.com".to_string(),
        }),
    }
}

/// The SDK wants a full URL; bare hosts get `https://`.
fn endpoint_url(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{address}")
    }
}

fn strip_scheme(address: &str) -> &str {
    address
        .split_once("://")
        .map_or(address, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    const CPU_QUERY: &str = r#"[{"Id":"m1","MetricStat":{"Metric":{"Namespace":"AWS/EC2","MetricName":"CPUUtilization"},"Period":60,"Stat":"Average"}}]"#;

    fn probe_request() -> MetricDataRequest {
        MetricDataRequest {
            queries: Vec::new(),
            max_datapoints: None,
            start_time: Some(ZERO_TIMESTAMP_SECS),
            end_time: Some(ZERO_TIMESTAMP_SECS),
        }
    }

    #[test]
    fn test_region_from_address() {
        assert_eq!(
            region_from_address("monitoring.us-east-1.amazonaws.com").unwrap(),
            "us-east-1"
        );
        assert_eq!(
            region_from_address("https://monitoring.eu-west-2.amazonaws.com/").unwrap(),
            "eu-west-2"
        );
        assert_eq!(
            region_from_address("monitoring.cn-north-1.amazonaws.com.cn").unwrap(),
            "cn-north-1"
        );
        assert_eq!(
            region_from_address("monitoring.ca-central-1.amazonaws.com").unwrap(),
            "ca-central-1"
        );
    }

    #[test]
    fn test_region_from_bad_address() {
        for bad in ["localhost:4566", "monitoring.amazonaws.com", "cloudwatch.us-east-1.amazonaws.com"] {
            assert!(matches!(
                region_from_address(bad).unwrap_err(),
                ProviderError::InvalidAddress { .. }
            ));
        }
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("monitoring.us-east-1.amazonaws.com"),
            "https://monitoring.us-east-1.amazonaws.com"
        );
        assert_eq!(endpoint_url("http://localhost:4566/"), "http://localhost:4566");
    }

    #[tokio::test]
    async fn test_run_query_returns_first_value() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data()
            .withf(|req| {
                req.max_datapoints == Some(1)
                    && req.start_time.is_none()
                    && req.end_time.is_none()
                    && req.queries.len() == 1
                    && req.queries[0].id == "m1"
            })
            .times(1)
            .returning(|_| {
                Ok(vec![
                    MetricDataResult {
                        id: Some("m1".to_string()),
                        values: vec![73.5, 12.0],
                    },
                    MetricDataResult {
                        id: Some("m2".to_string()),
                        values: vec![1.0],
                    },
                ])
            });

        let provider = CloudWatchProvider::with_client(api);
        let value = provider.run_query(CPU_QUERY).await.unwrap();
        assert!((value - 73.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_run_query_rejects_bad_json_without_calling_backend() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data().times(0);

        let provider = CloudWatchProvider::with_client(api);
        let err = provider.run_query("avg(cpu)").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidQuery { .. }));
        assert!(err.to_string().contains("error unmarshaling query"));
    }

    #[tokio::test]
    async fn test_run_query_no_values() {
        let mut api = MockMetricDataApi::new();
        let mut responses = vec![
            Ok(Vec::new()),
            Ok(vec![MetricDataResult {
                id: Some("m1".to_string()),
                values: Vec::new(),
            }]),
        ]
        .into_iter();
        api.expect_get_metric_data()
            .times(2)
            .returning(move |_| responses.next().unwrap());

        let provider = CloudWatchProvider::with_client(api);
        assert!(provider.run_query(CPU_QUERY).await.unwrap_err().is_no_data());
        assert!(provider.run_query(CPU_QUERY).await.unwrap_err().is_no_data());
    }

    #[tokio::test]
    async fn test_run_query_backend_failure() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data().returning(|_| {
            Err(MetricDataError::RequestFailure {
                status: 403,
                message: "AccessDenied".to_string(),
            })
        });

        let provider = CloudWatchProvider::with_client(api);
        let err = provider.run_query(CPU_QUERY).await.unwrap_err();
        assert!(err.to_string().contains("AccessDenied"), "{err}");
        assert_eq!(err.kind(), "backend");
        assert!(matches!(err, ProviderError::ErrorResponse { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_run_query_without_response_is_transport() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data()
            .returning(|_| Err(MetricDataError::Other("dispatch failure".to_string())));

        let provider = CloudWatchProvider::with_client(api);
        let err = provider.run_query(CPU_QUERY).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("error requesting cloudwatch"), "{err}");
    }

    #[tokio::test]
    async fn test_is_online_success() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data()
            .with(eq(probe_request()))
            .returning(|_| Ok(Vec::new()));

        assert!(CloudWatchProvider::with_client(api).is_online().await.unwrap());
    }

    // Relies on CloudWatch answering 400 for the empty probe request.
    // If AWS ever changes that status, this policy needs revisiting.
    #[tokio::test]
    async fn test_is_online_bad_request_counts_as_online() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data().returning(|_| {
            Err(MetricDataError::RequestFailure {
                status: 400,
                message: "ValidationError: The parameter MetricDataQueries is required".to_string(),
            })
        });

        assert!(CloudWatchProvider::with_client(api).is_online().await.unwrap());
    }

    #[tokio::test]
    async fn test_is_online_other_status_fails() {
        for status in [401, 403, 500, 503] {
            let mut api = MockMetricDataApi::new();
            api.expect_get_metric_data().returning(move |_| {
                Err(MetricDataError::RequestFailure {
                    status,
                    message: "denied".to_string(),
                })
            });

            let err = CloudWatchProvider::with_client(api).is_online().await.unwrap_err();
            match err {
                ProviderError::UnexpectedStatus { status: got, .. } => assert_eq!(got, status),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_is_online_non_request_failure() {
        let mut api = MockMetricDataApi::new();
        api.expect_get_metric_data()
            .returning(|_| Err(MetricDataError::Other("dispatch failure: timeout".to_string())));

        let err = CloudWatchProvider::with_client(api).is_online().await.unwrap_err();
        assert!(matches!(err, ProviderError::Unexpected(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
