//! Command Surface Operations
//!
//! The CLI and the MCP server are thin wrappers over this module: both name an [`Operation`],
//! collect an [`OperationArgs`], and get back one JSON envelope.
//!
//! Validation happens here, in the order the arguments are read, so a missing argument is
//! reported before any directory or executor call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::addressing::OperationArgs;
use crate::dispatch::Dispatcher;
use crate::engine::{IdentityProvider, ManagementDirectory, QueryExecutor};
use crate::error::{QuarryError, Result};
use crate::output::{ErrorEnvelope, SuccessEnvelope};

/// Operations exposed by the command surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ClusterList,
    ClusterGet,
    DatabaseList,
    TableList,
    TableSchema,
    TableSample,
    Query,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::ClusterList,
        Self::ClusterGet,
        Self::DatabaseList,
        Self::TableList,
        Self::TableSchema,
        Self::TableSample,
        Self::Query,
    ];

    /// Command name as typed on the command line
    #[must_use]
    pub const fn command(&self) -> &'static str {
        match self {
            Self::ClusterList => "cluster list",
            Self::ClusterGet => "cluster get",
            Self::DatabaseList => "database list",
            Self::TableList => "table list",
            Self::TableSchema => "table schema",
            Self::TableSample => "table sample",
            Self::Query => "query",
        }
    }

    /// MCP tool name
    #[must_use]
    pub const fn tool_name(&self) -> &'static str {
        match self {
            Self::ClusterList => "cluster_list",
            Self::ClusterGet => "cluster_get",
            Self::DatabaseList => "database_list",
            Self::TableList => "table_list",
            Self::TableSchema => "table_schema",
            Self::TableSample => "table_sample",
            Self::Query => "query",
        }
    }

    #[must_use]
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.tool_name() == name)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// Run one operation and return its results as JSON
pub async fn run<I, D, Q>(
    dispatcher: &Dispatcher<I, D, Q>,
    operation: Operation,
    args: &OperationArgs,
) -> Result<Value>
where
    I: IdentityProvider,
    D: ManagementDirectory,
    Q: QueryExecutor,
{
    let options = &args.options;
    match operation {
        Operation::ClusterList => {
            let subscription = args.require_subscription()?;
            to_json(dispatcher.list_clusters(subscription, options).await?)
        }
        Operation::ClusterGet => {
            let subscription = args.require_subscription()?;
            let cluster = args.require_cluster_name()?;
            to_json(dispatcher.get_cluster(subscription, cluster, options).await?)
        }
        Operation::DatabaseList => {
            let target = args.target()?;
            to_json(dispatcher.list_databases(&target, options).await?)
        }
        Operation::TableList => {
            let target = args.target()?;
            let database = args.require_database()?;
            to_json(dispatcher.list_tables(&target, database, options).await?)
        }
        Operation::TableSchema => {
            let target = args.target()?;
            let database = args.require_database()?;
            let table = args.require_table()?;
            to_json(dispatcher.get_table_schema(&target, database, table, options).await?)
        }
        Operation::TableSample => {
            let target = args.target()?;
            let database = args.require_database()?;
            let table = args.require_table()?;
            let limit = args.sample_limit()?;
            to_json(dispatcher.sample_table(&target, database, table, limit, options).await?)
        }
        Operation::Query => {
            let target = args.target()?;
            let database = args.require_database()?;
            let query = args.require_query()?;
            to_json(dispatcher.query_items(&target, database, query, options).await?)
        }
    }
}

/// Run one operation and wrap the outcome in an envelope
pub async fn execute<I, D, Q>(
    dispatcher: &Dispatcher<I, D, Q>,
    operation: Operation,
    args: &OperationArgs,
) -> std::result::Result<SuccessEnvelope<Value>, ErrorEnvelope>
where
    I: IdentityProvider,
    D: ManagementDirectory,
    Q: QueryExecutor,
{
    let start = Instant::now();
    match run(dispatcher, operation, args).await {
        Ok(results) => {
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            Ok(SuccessEnvelope::new(operation.command(), results, elapsed))
        }
        Err(e) => {
            tracing::debug!(command = operation.command(), code = e.error_code(), "operation failed");
            Err(ErrorEnvelope::from_error(operation.command(), &e))
        }
    }
}

fn to_json(value: impl Serialize) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| QuarryError::upstream_from("Could not encode results", e))
}

#[cfg(feature = "catalog")]
pub use catalog_runtime::{open_catalog, CatalogDispatcher, CATALOG_ENV};

#[cfg(feature = "catalog")]
mod catalog_runtime {
    use std::path::{Path, PathBuf};

    use crate::config::Settings;
    use crate::dispatch::Dispatcher;
    use crate::engine::catalog::CatalogEngine;
    use crate::engine::identity::EnvironmentIdentity;
    use crate::error::{QuarryError, Result};

    /// Environment variable naming the catalog file
    pub const CATALOG_ENV: &str = "QUARRY_CATALOG";

    /// Dispatcher wired to the offline catalog
    pub type CatalogDispatcher = Dispatcher<EnvironmentIdentity, CatalogEngine, CatalogEngine>;

    /// Build a catalog dispatcher
    ///
    /// The catalog path comes from `explicit`, then the settings, then `QUARRY_CATALOG`.
    pub fn open_catalog(settings: &Settings, explicit: Option<&Path>) -> Result<CatalogDispatcher> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| settings.catalog.clone())
            .or_else(|| std::env::var_os(CATALOG_ENV).map(PathBuf::from))
            .ok_or_else(|| {
                QuarryError::config_error(format!(
                    "No catalog configured. Pass --catalog, set \"catalog\" in the config file, or set {CATALOG_ENV}"
                ))
            })?;

        tracing::debug!(path = %path.display(), "loading catalog");
        let engine = CatalogEngine::load(&path)?;
        Ok(Dispatcher::new(EnvironmentIdentity::default(), engine.clone(), engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_tool_name(op.tool_name()), Some(op));
        }
        assert_eq!(Operation::from_tool_name("connect"), None);
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Operation::TableSample.to_string(), "table sample");
        assert_eq!(Operation::Query.command(), "query");
    }
}
