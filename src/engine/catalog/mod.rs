//! Offline Catalog Engine
//!
//! This module implements the [`ManagementDirectory`] and [`QueryExecutor`] contracts over a
//! JSON catalog file, so the CLI and MCP server can run without a live service.
//!
//! # Catalog Format
//! ```json
//! {
//!   "subscriptions": {
//!     "sub1": {
//!       "tenant": "tenant-a",
//!       "clusters": [
//!         { "name": "mycluster", "clusterUri": "https://mycluster.kusto.example.net" }
//!       ]
//!     }
//!   },
//!   "clusters": {
//!     "mycluster.kusto.example.net": {
//!       "databases": {
//!         "db1": {
//!           "tables": { "StormEvents": { "schema": { "Name": "StormEvents" } } },
//!           "queries": {
//!             "StormEvents | count": { "columns": ["Count"], "rows": [[42]] }
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! # Implementation Notes
//! - Clusters are keyed by endpoint host (case-insensitive)
//! - Only the control commands Quarry issues are understood
//! - Queries are answered from canned results keyed by their exact (trimmed) text
//! - Failures are reported the way a remote service would, as upstream errors

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::dispatch::{SHOW_DATABASES, SHOW_TABLES};
use crate::engine::{
    ClusterRecord, ManagementDirectory, QueryExecutor, RequestProperties, RetryPolicy, RowSet,
    RowSetReader, SessionDescriptor,
};
use crate::error::{QuarryError, Result};

const ENGINE: &str = "catalog";

/// Subscription entry in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    /// Tenant owning the subscription; requests scoped to another tenant are refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    #[serde(default)]
    pub clusters: Vec<ClusterRecord>,
}

/// Table entry in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableEntry {
    /// Schema document returned by `.show table <name> schema as json`
    #[serde(default)]
    pub schema: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

/// Database entry in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseEntry {
    #[serde(default)]
    pub tables: BTreeMap<String, TableEntry>,

    /// Canned query results keyed by query text
    #[serde(default)]
    pub queries: BTreeMap<String, RowSet>,
}

/// Cluster entry in the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterEntry {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,
}

/// Whole catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub subscriptions: BTreeMap<String, SubscriptionEntry>,

    /// Clusters keyed by endpoint host
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterEntry>,
}

impl Catalog {
    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            QuarryError::config_error(format!(
                "Could not read catalog file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }

    /// Parse a catalog document
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| QuarryError::config_error(format!("Invalid catalog file format: {e}")))
    }

    fn cluster(&self, session: &SessionDescriptor) -> Result<&ClusterEntry> {
        let host = session.endpoint.host();
        self.clusters
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(host))
            .map(|(_, entry)| entry)
            .ok_or_else(|| {
                QuarryError::upstream(ENGINE, format!("Cluster '{}' is unreachable", session.endpoint))
            })
    }

    fn database<'a>(&'a self, session: &SessionDescriptor, name: &str) -> Result<&'a DatabaseEntry> {
        self.cluster(session)?.databases.get(name).ok_or_else(|| {
            QuarryError::upstream(
                ENGINE,
                format!("Database '{name}' was not found on cluster '{}'", session.cluster_name),
            )
        })
    }
}

/// Catalog-backed directory and executor
///
/// Cheap to clone; clones share the loaded catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogEngine {
    catalog: Arc<Catalog>,
}

impl CatalogEngine {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog: Arc::new(catalog) }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Catalog::load(path)?))
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn control(&self, session: &SessionDescriptor, scope: &str, command: &str) -> Result<RowSet> {
        let command = command.trim();

        if command == SHOW_DATABASES {
            if !scope.eq_ignore_ascii_case(&session.cluster_name) {
                return Err(QuarryError::upstream(
                    ENGINE,
                    format!("'{SHOW_DATABASES}' must be scoped to the cluster, got '{scope}'"),
                ));
            }
            let names =
                self.catalog.cluster(session)?.databases.keys().cloned().map(Value::String);
            return Ok(RowSet::single_column("DatabaseName", names.collect()));
        }

        let database = self.catalog.database(session, scope)?;

        if command == SHOW_TABLES {
            let names = database.tables.keys().cloned().map(Value::String);
            return Ok(RowSet::single_column("TableName", names.collect()));
        }

        if let Some(table) = parse_show_schema(command) {
            let entry = database.tables.get(table).ok_or_else(|| {
                QuarryError::upstream(
                    ENGINE,
                    format!("Table '{table}' was not found in database '{scope}'"),
                )
            })?;
            let schema = serde_json::to_string(&entry.schema)
                .map_err(|e| QuarryError::upstream_from(ENGINE, e))?;
            return Ok(RowSet::new(
                vec![
                    "TableName".to_string(),
                    "Schema".to_string(),
                    "DatabaseName".to_string(),
                    "Folder".to_string(),
                ],
                vec![vec![
                    Value::String(table.to_string()),
                    Value::String(schema),
                    Value::String(scope.to_string()),
                    entry.folder.clone().map_or(Value::Null, Value::String),
                ]],
            ));
        }

        Err(QuarryError::upstream(ENGINE, format!("Unsupported control command: {command}")))
    }
}

/// Table name from `.show table <name> schema as json`
fn parse_show_schema(command: &str) -> Option<&str> {
    let table = command.strip_prefix(".show table ")?.strip_suffix(" schema as json")?.trim();
    (!table.is_empty()).then_some(table)
}

impl ManagementDirectory for CatalogEngine {
    async fn enumerate_clusters(
        &self,
        subscription: &str,
        tenant: Option<&str>,
        _retry_policy: Option<&RetryPolicy>,
    ) -> Result<Vec<ClusterRecord>> {
        let entry = self.catalog.subscriptions.get(subscription).ok_or_else(|| {
            QuarryError::upstream(ENGINE, format!("Subscription '{subscription}' was not found"))
        })?;

        if let (Some(owner), Some(requested)) = (entry.tenant.as_deref(), tenant) {
            if !owner.eq_ignore_ascii_case(requested) {
                return Err(QuarryError::upstream(
                    ENGINE,
                    format!("Subscription '{subscription}' is not visible in tenant '{requested}'"),
                ));
            }
        }

        Ok(entry.clusters.clone())
    }
}

impl QueryExecutor for CatalogEngine {
    type Reader = RowSetReader;

    async fn execute_control_command(
        &self,
        session: &SessionDescriptor,
        scope: &str,
        command: &str,
        _properties: Option<&RequestProperties>,
    ) -> Result<RowSetReader> {
        Ok(self.control(session, scope, command)?.into_reader())
    }

    async fn execute_query(
        &self,
        session: &SessionDescriptor,
        database: &str,
        query: &str,
        _properties: Option<&RequestProperties>,
    ) -> Result<RowSetReader> {
        let entry = self.catalog.database(session, database)?;
        entry
            .queries
            .get(query.trim())
            .cloned()
            .map(RowSet::into_reader)
            .ok_or_else(|| {
                QuarryError::upstream(
                    ENGINE,
                    format!("No result recorded for query in database '{database}': {query}"),
                )
            })
    }
}
