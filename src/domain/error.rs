//! Provider error taxonomy.
//!
//! Every failure a backend client can report is a variant here.
//! Configuration problems, transport failures, backend-reported
//! failures and "no datapoint yet" are kept distinct so the caller
//! can decide whether a canary gate failed or simply has no data.

use thiserror::Error;

/// Errors returned by provider construction, queries and health checks.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A credential key the backend requires is absent.
    #[error("{provider} credentials does not contain {key}")]
    MissingCredential {
        /// Backend name (`datadog`, `prometheus`).
        provider: &'static str,
        /// The missing credential key.
        key: String,
    },

    /// The metric interval could not be parsed as a duration.
    #[error("error parsing metric interval '{interval}': {reason}")]
    InvalidInterval { interval: String, reason: String },

    /// The configured backend address is unusable.
    #[error("invalid provider address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The query payload is malformed for this backend.
    #[error("error unmarshaling query: {reason}")]
    InvalidQuery { reason: String },

    /// The underlying HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    ClientBuild(String),

    /// Connection failure, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("error response ({status}): {body}")]
    ErrorResponse { status: u16, body: String },

    /// The backend answered but the body could not be decoded.
    #[error("error unmarshaling result: {reason}, '{body}'")]
    Decode { reason: String, body: String },

    /// The backend answered successfully without a usable datapoint.
    #[error("no values found in response: {response}")]
    NoValues { response: String },

    /// A request failure carrying a status the health policy rejects.
    #[error("unexpected status code {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// A failure that never produced a backend response.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Whether this error means "the backend is fine but has no data yet".
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoValues { .. })
    }

    /// Whether this error was caused by configuration rather than the backend.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::InvalidInterval { .. }
                | Self::InvalidAddress { .. }
                | Self::InvalidQuery { .. }
                | Self::ClientBuild(_)
        )
    }

    /// Short label used for log fields and metric labels.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. }
            | Self::InvalidInterval { .. }
            | Self::InvalidAddress { .. }
            | Self::InvalidQuery { .. }
            | Self::ClientBuild(_) => "config",
            Self::Transport(_) | Self::Unexpected(_) => "transport",
            Self::ErrorResponse { .. } | Self::UnexpectedStatus { .. } | Self::Decode { .. } => {
                "backend"
            }
            Self::NoValues { .. } => "no_data",
        }
    }
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
