//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Quarry.
//! All errors are structured and map to stable error codes and status codes for JSON output.
//!
//! # Error Categories
//! - `MissingRequiredArgument`: Argument validation failed before any remote call
//! - `ResourceNotFound`: Named cluster absent from the subscription directory
//! - `ResolutionFailed`: Directory record carried no usable endpoint
//! - `InvalidEndpoint`: Endpoint failed to parse or had no host
//! - `UnsupportedAuthMethod`: Key authentication requested
//! - `MissingArgument`: Connection string authentication requested without a connection string
//! - `Upstream`: Failure surfaced by the identity provider, directory, or query execution
//! - `InvalidInput`: Malformed input that is not an addressing problem
//! - `ConfigError`: Configuration file or profile errors

use thiserror::Error;

/// Boxed cause carried by upstream failures
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for Quarry operations
#[derive(Error, Debug)]
pub enum QuarryError {
    /// Argument validation failed before any remote call was made
    #[error("Missing required argument: {0}")]
    MissingRequiredArgument(String),

    /// Named resource was not found after a full directory enumeration
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Directory record was found but did not yield an endpoint
    #[error("Resolution failed: {0}")]
    ResolutionFailed(String),

    /// Endpoint is not a well-formed URI with a host
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Requested auth method is not supported by the data plane
    #[error("Unsupported auth method: {0}")]
    UnsupportedAuthMethod(String),

    /// Argument required by the selected auth method is missing
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Failure reported by a remote collaborator, wrapped with context
    #[error("{context}: {message}")]
    Upstream {
        context: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// Invalid input (not an addressing problem)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (file not found, invalid JSON, unknown profile, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl QuarryError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling by agents.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRequiredArgument(_) => "MISSING_REQUIRED_ARGUMENT",
            Self::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            Self::ResolutionFailed(_) => "RESOLUTION_FAILED",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::UnsupportedAuthMethod(_) => "UNSUPPORTED_AUTH_METHOD",
            Self::MissingArgument(_) => "MISSING_ARGUMENT",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// HTTP-style status code for the structured response
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingRequiredArgument(_)
            | Self::InvalidEndpoint(_)
            | Self::UnsupportedAuthMethod(_)
            | Self::MissingArgument(_)
            | Self::InvalidInput(_) => 400,
            Self::ResourceNotFound(_) => 404,
            Self::ResolutionFailed(_) | Self::Upstream { .. } | Self::ConfigError(_) => 500,
        }
    }

    /// Get human-readable error message (agent-appropriate, no credentials)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// True for failures detected locally, before any remote call
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::MissingRequiredArgument(_) | Self::InvalidInput(_))
    }

    pub fn missing_required_argument(message: impl Into<String>) -> Self {
        Self::MissingRequiredArgument(message.into())
    }

    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::ResourceNotFound(message.into())
    }

    pub fn resolution_failed(message: impl Into<String>) -> Self {
        Self::ResolutionFailed(message.into())
    }

    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::InvalidEndpoint(message.into())
    }

    pub fn unsupported_auth_method(message: impl Into<String>) -> Self {
        Self::UnsupportedAuthMethod(message.into())
    }

    pub fn missing_argument(message: impl Into<String>) -> Self {
        Self::MissingArgument(message.into())
    }

    /// Create an upstream error with no underlying cause
    pub fn upstream(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream { context: context.into(), message: message.into(), source: None }
    }

    /// Wrap an underlying cause, keeping its message
    pub fn upstream_from<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxedCause>,
    {
        let cause = cause.into();
        Self::Upstream { context: context.into(), message: cause.to_string(), source: Some(cause) }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;
