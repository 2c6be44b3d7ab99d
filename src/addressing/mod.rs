//! Cluster Addressing Validation
//!
//! Every operation names its target cluster in exactly one of two ways:
//! - by endpoint (`--cluster-uri`), or
//! - by coordinates (`--subscription` plus `--cluster-name`), resolved through the directory.
//!
//! Validation is a pure function of the bound argument values and runs before any network
//! access. When an endpoint is present the subscription requirement is relaxed.

use serde::{Deserialize, Serialize};

use crate::engine::{AuthMethod, RetryPolicy};
use crate::error::{QuarryError, Result};
use crate::resolver::ClusterEndpoint;

/// Default row count for table samples
pub const DEFAULT_SAMPLE_LIMIT: u32 = 10;

/// Which addressing scheme a target uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    ByEndpoint,
    ByCoordinates,
}

/// Validated cluster target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterTarget {
    /// Endpoint supplied directly
    ByEndpoint(ClusterEndpoint),
    /// Subscription and cluster name, to be resolved through the directory
    ByCoordinates { subscription: String, cluster: String },
}

impl ClusterTarget {
    #[must_use]
    pub const fn mode(&self) -> AddressingMode {
        match self {
            Self::ByEndpoint(_) => AddressingMode::ByEndpoint,
            Self::ByCoordinates { .. } => AddressingMode::ByCoordinates,
        }
    }

    /// Short label for logs and error context
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ByEndpoint(endpoint) => endpoint.to_string(),
            Self::ByCoordinates { subscription, cluster } => {
                format!("cluster '{cluster}' in subscription '{subscription}'")
            }
        }
    }
}

/// Non-empty, trimmed value of an optional argument
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decide the addressing mode from raw argument presence
///
/// Rules, in order:
/// 1. Non-empty endpoint wins, whatever else is set.
/// 2. Otherwise subscription and cluster name must both be non-empty.
pub fn validate_addressing(
    cluster_uri: Option<&str>,
    subscription: Option<&str>,
    cluster_name: Option<&str>,
) -> Result<ClusterTarget> {
    if let Some(uri) = present(cluster_uri) {
        return Ok(ClusterTarget::ByEndpoint(ClusterEndpoint::parse(uri)?));
    }

    match (present(subscription), present(cluster_name)) {
        (Some(subscription), Some(cluster)) => Ok(ClusterTarget::ByCoordinates {
            subscription: subscription.to_string(),
            cluster: cluster.to_string(),
        }),
        _ => Err(QuarryError::missing_required_argument(
            "Either --cluster-uri must be provided, or both --subscription and --cluster-name must be provided.",
        )),
    }
}

/// Per-request options that travel with every operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub tenant: Option<String>,
    pub auth_method: AuthMethod,
    pub retry_policy: Option<RetryPolicy>,
    /// Only consulted for [`AuthMethod::ConnectionString`]
    pub connection_string: Option<String>,
}

impl RequestOptions {
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        present(self.tenant.as_deref())
    }
}

/// Flat argument set shared by every operation
///
/// Each operation reads the subset it needs; `require_*` accessors report what is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationArgs {
    pub cluster_uri: Option<String>,
    pub subscription: Option<String>,
    pub cluster_name: Option<String>,
    pub database: Option<String>,
    pub table: Option<String>,
    pub query: Option<String>,
    pub limit: Option<u32>,
    pub options: RequestOptions,
}

impl OperationArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cluster_uri(mut self, value: impl Into<String>) -> Self {
        self.cluster_uri = Some(value.into());
        self
    }

    #[must_use]
    pub fn subscription(mut self, value: impl Into<String>) -> Self {
        self.subscription = Some(value.into());
        self
    }

    #[must_use]
    pub fn cluster_name(mut self, value: impl Into<String>) -> Self {
        self.cluster_name = Some(value.into());
        self
    }

    #[must_use]
    pub fn database(mut self, value: impl Into<String>) -> Self {
        self.database = Some(value.into());
        self
    }

    #[must_use]
    pub fn table(mut self, value: impl Into<String>) -> Self {
        self.table = Some(value.into());
        self
    }

    #[must_use]
    pub fn query(mut self, value: impl Into<String>) -> Self {
        self.query = Some(value.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, value: u32) -> Self {
        self.limit = Some(value);
        self
    }

    #[must_use]
    pub fn tenant(mut self, value: impl Into<String>) -> Self {
        self.options.tenant = Some(value.into());
        self
    }

    #[must_use]
    pub const fn auth_method(mut self, value: AuthMethod) -> Self {
        self.options.auth_method = value;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, value: RetryPolicy) -> Self {
        self.options.retry_policy = Some(value);
        self
    }

    #[must_use]
    pub fn connection_string(mut self, value: impl Into<String>) -> Self {
        self.options.connection_string = Some(value.into());
        self
    }

    /// Validate the addressing arguments
    pub fn target(&self) -> Result<ClusterTarget> {
        validate_addressing(
            self.cluster_uri.as_deref(),
            self.subscription.as_deref(),
            self.cluster_name.as_deref(),
        )
    }

    /// Subscription, for operations that always need one (cluster list/get)
    pub fn require_subscription(&self) -> Result<&str> {
        require(self.subscription.as_deref(), "subscription")
    }

    pub fn require_cluster_name(&self) -> Result<&str> {
        require(self.cluster_name.as_deref(), "cluster-name")
    }

    pub fn require_database(&self) -> Result<&str> {
        require(self.database.as_deref(), "database")
    }

    pub fn require_table(&self) -> Result<&str> {
        require(self.table.as_deref(), "table")
    }

    pub fn require_query(&self) -> Result<&str> {
        require(self.query.as_deref(), "query")
    }

    /// Sample size, defaulting to [`DEFAULT_SAMPLE_LIMIT`]; zero is rejected
    pub fn sample_limit(&self) -> Result<u32> {
        match self.limit {
            None => Ok(DEFAULT_SAMPLE_LIMIT),
            Some(0) => Err(QuarryError::invalid_input("--limit must be greater than zero")),
            Some(limit) => Ok(limit),
        }
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    present(value)
        .ok_or_else(|| QuarryError::missing_required_argument(format!("Missing required option --{name}")))
}
