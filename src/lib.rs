//! Canary Metrics - Library Root
//!
//! Metrics provider layer for canary analysis: one query, one scalar,
//! against Prometheus, Datadog or CloudWatch.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;

pub use domain::{ProviderConfig, ProviderError, ProviderType};
pub use ports::MetricsProvider;
pub use usecases::ProviderFactory;
