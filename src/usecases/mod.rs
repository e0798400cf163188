//! Use Cases Layer - Application Workflows
//!
//! Orchestrates port implementations into the operations the canary
//! controller and the probe binary need.
//!
//! Use cases:
//! - `ProviderFactory`: build a backend client from declarative config
//! - `MetricsProbe`: run health checks and queries for configured checks

pub mod factory;
pub mod probe;

pub use factory::ProviderFactory;
pub use probe::{Check, CheckOutcome, CheckReport, MetricsProbe};
