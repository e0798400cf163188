//! CloudWatch query payloads.
//!
//! A CloudWatch check's query is a JSON array of `MetricDataQuery`
//! objects, written with the same PascalCase keys as the
//! `GetMetricData` API. camelCase keys are accepted as well.
//!
//! ```json
//! [{
//!   "Id": "e1",
//!   "Expression": "m1 / m2 * 100",
//!   "Label": "error rate"
//! }, {
//!   "Id": "m1",
//!   "ReturnData": false,
//!   "MetricStat": {
//!     "Metric": {
//!       "Namespace": "AWS/ApplicationELB",
//!       "MetricName": "HTTPCode_Target_5XX_Count",
//!       "Dimensions": [{"Name": "LoadBalancer", "Value": "app/web/1234"}]
//!     },
//!     "Period": 60,
//!     "Stat": "Sum"
//!   }
//! }]
//! ```

use aws_sdk_cloudwatch::types;
use serde::Deserialize;

use crate::domain::error::{ProviderError, ProviderResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDataQuery {
    #[serde(alias = "id")]
    pub id: String,
    #[serde(default, alias = "expression")]
    pub expression: Option<String>,
    #[serde(default, alias = "label")]
    pub label: Option<String>,
    #[serde(default, alias = "metricStat")]
    pub metric_stat: Option<MetricStat>,
    #[serde(default, alias = "period")]
    pub period: Option<i32>,
    #[serde(default, alias = "returnData")]
    pub return_data: Option<bool>,
    #[serde(default, alias = "accountId")]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricStat {
    #[serde(alias = "metric")]
    pub metric: Metric,
    #[serde(alias = "period")]
    pub period: i32,
    #[serde(alias = "stat")]
    pub stat: String,
    #[serde(default, alias = "unit")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metric {
    #[serde(default, alias = "namespace")]
    pub namespace: Option<String>,
    #[serde(default, alias = "metricName")]
    pub metric_name: Option<String>,
    #[serde(default, alias = "dimensions")]
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    #[serde(alias = "name")]
    pub name: String,
    #[serde(alias = "value")]
    pub value: String,
}

/// Decode a query string into metric data queries.
///
/// # Errors
/// `ProviderError::InvalidQuery` with the JSON error text.
pub fn decode_queries(query: &str) -> ProviderResult<Vec<MetricDataQuery>> {
    serde_json::from_str(query).map_err(|e| ProviderError::InvalidQuery {
        reason: e.to_string(),
    })
}

impl MetricDataQuery {
    /// Convert to the SDK representation. Required members are already
    /// enforced when the JSON is decoded.
    pub fn to_sdk(&self) -> types::MetricDataQuery {
        types::MetricDataQuery::builder()
            .id(&self.id)
            .set_expression(self.expression.clone())
            .set_label(self.label.clone())
            .set_metric_stat(self.metric_stat.as_ref().map(MetricStat::to_sdk))
            .set_period(self.period)
            .set_return_data(self.return_data)
            .set_account_id(self.account_id.clone())
            .build()
    }
}

impl MetricStat {
    fn to_sdk(&self) -> types::MetricStat {
        let dimensions = self
            .metric
            .dimensions
            .iter()
            .map(|d| types::Dimension::builder().name(&d.name).value(&d.value).build())
            .collect();

        let metric = types::Metric::builder()
            .set_namespace(self.metric.namespace.clone())
            .set_metric_name(self.metric.metric_name.clone())
            .set_dimensions(Some(dimensions))
            .build();

        types::MetricStat::builder()
            .metric(metric)
            .period(self.period)
            .stat(&self.stat)
            .set_unit(self.unit.as_deref().map(types::StandardUnit::from))
            .build()
    }
}
