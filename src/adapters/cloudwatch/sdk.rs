//! `GetMetricData` over the AWS SDK.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region};
use aws_sdk_cloudwatch::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudwatch::operation::get_metric_data::GetMetricDataError;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::Client;
use tracing::debug;

use super::{MetricDataApi, MetricDataError, MetricDataRequest, MetricDataResult};

/// SDK-level attempt budget. These are the only retries in the crate.
pub const MAX_ATTEMPTS: u32 = 3;

/// CloudWatch client backed by `aws-sdk-cloudwatch`.
#[derive(Debug, Clone)]
pub struct SdkMetricDataClient {
    client: Client,
}

impl SdkMetricDataClient {
    /// Load AWS configuration (credentials come from the default chain)
    /// scoped to `region` and `endpoint` when given.
    pub async fn connect(region: Option<String>, endpoint: Option<String>) -> Self {
        Self::from_loader(config_loader(region, endpoint)).await
    }

    async fn from_loader(loader: ConfigLoader) -> Self {
        let sdk_config = loader.load().await;
        Self {
            client: Client::new(&sdk_config),
        }
    }
}

fn config_loader(region: Option<String>, endpoint: Option<String>) -> ConfigLoader {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS));

    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    if let Some(endpoint) = endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    loader
}

/// `Code: message` from the service error, without the raw response dump.
fn service_message(err: &GetMetricDataError) -> String {
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => "unrecognized error response".to_string(),
    }
}

#[async_trait]
impl MetricDataApi for SdkMetricDataClient {
    async fn get_metric_data(
        &self,
        request: MetricDataRequest,
    ) -> Result<Vec<MetricDataResult>, MetricDataError> {
        let queries = request
            .queries
            .iter()
            .map(super::query::MetricDataQuery::to_sdk)
            .collect();

        let mut call = self
            .client
            .get_metric_data()
            .set_metric_data_queries(Some(queries))
            .set_max_datapoints(request.max_datapoints);

        if let Some(secs) = request.start_time {
            call = call.start_time(DateTime::from_secs(secs));
        }
        if let Some(secs) = request.end_time {
            call = call.end_time(DateTime::from_secs(secs));
        }

        let output = call.send().await.map_err(|err| {
            let status = err.raw_response().map(|raw| raw.status().as_u16());
            match status {
                Some(status) => MetricDataError::RequestFailure {
                    status,
                    message: service_message(&err.into_service_error()),
                },
                None => MetricDataError::Other(DisplayErrorContext(&err).to_string()),
            }
        })?;

        let results: Vec<MetricDataResult> = output
            .metric_data_results()
            .iter()
            .map(|r| MetricDataResult {
                id: r.id().map(str::to_string),
                values: r.values().to_vec(),
            })
            .collect();

        debug!(results = results.len(), "GetMetricData returned");
        Ok(results)
    }
}
