//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the canary controller requires from
//! metrics backends. Adapters implement these traits.
//!
//! Port categories:
//! - `MetricsProvider`: single-scalar queries and health checks

pub mod metrics_provider;

pub use metrics_provider::MetricsProvider;
