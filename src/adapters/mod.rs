//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the `MetricsProvider` port for each metrics backend and
//! groups the supporting infrastructure.
//!
//! Adapter categories:
//! - `datadog`: Datadog metrics query API
//! - `prometheus`: Prometheus-compatible instant query API
//! - `cloudwatch`: AWS CloudWatch `GetMetricData`
//! - `http`: timeout-bounded HTTP client shared by the HTTP backends
//! - `telemetry`: Prometheus exposition of provider calls

pub mod cloudwatch;
pub mod datadog;
pub mod http;
pub mod prometheus;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use cloudwatch::CloudWatchProvider;
pub use datadog::DatadogProvider;
pub use prometheus::PrometheusProvider;
