//! Collaborator Traits and Core Types
//!
//! This module defines the contracts Quarry consumes from the outside world and the value
//! types that flow through them:
//! - [`IdentityProvider`] resolves a caller credential for an optional tenant
//! - [`ManagementDirectory`] enumerates the clusters visible under a subscription
//! - [`QueryExecutor`] runs control commands and queries against a cluster endpoint
//! - [`TabularReader`] is the forward-only, row-at-a-time result cursor both return
//!
//! # Stateless Design
//! Collaborators receive everything they need per call. A [`SessionDescriptor`] is built
//! fresh for every operation; pooling, if any, is the executor's own business.
//!
//! # Engine Isolation
//! Each engine implementation (currently only the offline catalog) is independent of the
//! dispatch layer and only talks to it through these traits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

use crate::error::Result;
use crate::resolver::ClusterEndpoint;

#[cfg(feature = "catalog")]
pub mod catalog;
pub mod identity;

/// Application name attached to every request
pub const APPLICATION_NAME: &str = "quarry";

/// Authentication method used to build a session
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Token from the identity provider (default)
    #[default]
    Credential,
    /// Caller-supplied connection string, bypasses the identity provider
    ConnectionString,
    /// Access key; never accepted by the data plane
    Key,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::ConnectionString => "connection_string",
            Self::Key => "key",
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Retry back-off mode
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    Fixed,
    #[default]
    Exponential,
}

/// Retry policy forwarded unchanged to the remote-call layer
///
/// Quarry never retries on its own; this value only travels with the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay between retries, in seconds
    pub delay_seconds: f64,

    /// Upper bound on the back-off delay, in seconds
    pub max_delay_seconds: f64,

    /// Maximum number of retries
    pub max_retries: u32,

    /// Back-off mode
    pub mode: RetryMode,

    /// Network timeout for a single attempt, in seconds
    pub network_timeout_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay_seconds: 0.8,
            max_delay_seconds: 60.0,
            max_retries: 3,
            mode: RetryMode::Exponential,
            network_timeout_seconds: 100.0,
        }
    }
}

/// Credential object handed out by the identity provider
///
/// WARNING: the token is sensitive. `Debug` redacts it and it is never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    tenant: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, tenant: Option<String>) -> Self {
        Self { token: token.into(), tenant }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// How a session authenticates against the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAuth {
    /// Identity-provider credential, with an explicit authority when a tenant was given
    Credential { credential: Credential, authority: Option<String> },
    /// Raw connection string
    ConnectionString(String),
}

/// Connection descriptor built before every control command or query
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    /// Resolved cluster endpoint
    pub endpoint: ClusterEndpoint,

    /// Cluster short name (leftmost host label of the endpoint)
    pub cluster_name: String,

    /// Authentication material
    pub auth: SessionAuth,

    /// Retry policy, forwarded as-is
    pub retry_policy: Option<RetryPolicy>,
}

/// Per-request metadata attached to control commands and queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestProperties {
    pub client_request_id: String,
    pub application: String,
}

impl RequestProperties {
    /// Fresh properties with a unique client request id
    #[must_use]
    pub fn new() -> Self {
        Self {
            client_request_id: format!("{APPLICATION_NAME};{}", uuid::Uuid::new_v4()),
            application: APPLICATION_NAME.to_string(),
        }
    }
}

impl Default for RequestProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Cluster record returned by the management directory
///
/// `clusterUri` is the single canonical location of the endpoint in a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    /// Cluster name, unique within the subscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Cluster endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    /// Any other properties the directory reports
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl ClusterRecord {
    /// Create a record with a name and endpoint
    pub fn new(name: impl Into<String>, cluster_uri: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            cluster_uri: Some(cluster_uri.into()),
            ..Default::default()
        }
    }

    /// Name, if present and non-empty
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Forward-only, row-at-a-time result cursor
///
/// The cursor starts before the first row; call [`TabularReader::advance`] before reading.
pub trait TabularReader: Send {
    /// Number of columns
    fn field_count(&self) -> usize;

    /// Column name by index (`index < field_count()`)
    fn field_name(&self, index: usize) -> &str;

    /// Value of the current row at `index`; `Null` when there is no current row
    fn value(&self, index: usize) -> Value;

    /// Move to the next row, returning false once the rows are exhausted
    fn advance(&mut self) -> Result<bool>;

    /// Index of a column by name
    fn column_index(&self, name: &str) -> Option<usize> {
        (0..self.field_count()).find(|&i| self.field_name(i) == name)
    }
}

/// Identity provider contract
pub trait IdentityProvider: Send + Sync {
    /// Resolve a credential, scoped to `tenant` when present
    fn get_credential(
        &self,
        tenant: Option<&str>,
    ) -> impl Future<Output = Result<Credential>> + Send;
}

/// Management-plane directory contract
pub trait ManagementDirectory: Send + Sync {
    /// Enumerate every cluster record visible under the subscription
    fn enumerate_clusters(
        &self,
        subscription: &str,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> impl Future<Output = Result<Vec<ClusterRecord>>> + Send;
}

/// Remote execution contract
///
/// Both methods return a reader positioned before the first row.
pub trait QueryExecutor: Send + Sync {
    type Reader: TabularReader;

    /// Run a control command scoped to a database or to the cluster (by short name)
    fn execute_control_command(
        &self,
        session: &SessionDescriptor,
        scope: &str,
        command: &str,
        properties: Option<&RequestProperties>,
    ) -> impl Future<Output = Result<Self::Reader>> + Send;

    /// Run a query against a database
    fn execute_query(
        &self,
        session: &SessionDescriptor,
        database: &str,
        query: &str,
        properties: Option<&RequestProperties>,
    ) -> impl Future<Output = Result<Self::Reader>> + Send;
}

/// Materialized tabular result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names in result order
    pub columns: Vec<String>,

    /// Rows, each aligned with `columns`
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Single-column result
    pub fn single_column(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self { columns: vec![column.into()], rows: values.into_iter().map(|v| vec![v]).collect() }
    }

    /// Cursor over the rows
    #[must_use]
    pub fn into_reader(self) -> RowSetReader {
        RowSetReader { set: self, position: None }
    }
}

/// [`TabularReader`] over an in-memory [`RowSet`]
#[derive(Debug, Clone)]
pub struct RowSetReader {
    set: RowSet,
    position: Option<usize>,
}

impl TabularReader for RowSetReader {
    fn field_count(&self) -> usize {
        self.set.columns.len()
    }

    fn field_name(&self, index: usize) -> &str {
        &self.set.columns[index]
    }

    fn value(&self, index: usize) -> Value {
        self.position
            .and_then(|row| self.set.rows.get(row))
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.set.rows.len()));
        Ok(next < self.set.rows.len())
    }
}
