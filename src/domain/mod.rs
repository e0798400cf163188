//! Domain layer - Provider model, intervals and error taxonomy.
//!
//! Pure types shared by every backend client. Nothing here performs
//! I/O; adapters translate these types to backend wire formats.

pub mod error;
pub mod interval;
pub mod provider;

// Re-export core types for convenience
pub use error::{ProviderError, ProviderResult};
pub use interval::MetricInterval;
pub use provider::{Credentials, ProviderConfig, ProviderType};
