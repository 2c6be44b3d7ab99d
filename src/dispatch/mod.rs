//! Operation Dispatch
//!
//! Every cluster-scoped operation follows the same shape:
//! 1. resolve the [`ClusterTarget`] to an endpoint (once, at the boundary)
//! 2. build a [`SessionDescriptor`] from the endpoint, auth method, and tenant
//! 3. run a control command or query through the [`QueryExecutor`]
//! 4. normalize the tabular result into structured records
//!
//! Operations either fully succeed or fail; no partial results are returned. Executor and
//! reader failures are wrapped as upstream errors with the endpoint/database/table context.
//! Identity provider failures are passed through unchanged.

use serde_json::{Map, Value};
use std::time::Duration;

use crate::addressing::{ClusterTarget, RequestOptions};
use crate::cache::DEFAULT_TTL;
use crate::engine::{
    AuthMethod, ClusterRecord, IdentityProvider, ManagementDirectory, QueryExecutor,
    RequestProperties, SessionAuth, SessionDescriptor, TabularReader,
};
use crate::error::{QuarryError, Result};
use crate::resolver::{ClusterEndpoint, EndpointResolver};

/// Control command listing the databases of a cluster
pub const SHOW_DATABASES: &str = ".show databases";

/// Control command listing the tables of a database
pub const SHOW_TABLES: &str = ".show tables";

const DATABASE_NAME_COLUMN: &str = "DatabaseName";
const TABLE_NAME_COLUMN: &str = "TableName";
const SCHEMA_COLUMN: &str = "Schema";

/// Control command describing a table's schema as JSON
#[must_use]
pub fn show_table_schema(table: &str) -> String {
    format!(".show table {table} schema as json")
}

/// Query returning a random sample of a table's rows
#[must_use]
pub fn sample_query(table: &str, limit: u32) -> String {
    format!("{table} | sample {limit}")
}

/// Authority used for tenant-scoped credentials
#[must_use]
pub fn tenant_authority(tenant: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant}")
}

/// Structured record produced from one result row (keys in column order)
pub type Record = Map<String, Value>;

/// Operation dispatcher over the three remote collaborators
#[derive(Debug)]
pub struct Dispatcher<I, D, Q> {
    identity: I,
    resolver: EndpointResolver<D>,
    executor: Q,
}

impl<I, D, Q> Dispatcher<I, D, Q>
where
    I: IdentityProvider,
    D: ManagementDirectory,
    Q: QueryExecutor,
{
    pub fn new(identity: I, directory: D, executor: Q) -> Self {
        Self::with_cache_ttl(identity, directory, executor, DEFAULT_TTL)
    }

    pub fn with_cache_ttl(identity: I, directory: D, executor: Q, ttl: Duration) -> Self {
        Self { identity, resolver: EndpointResolver::with_ttl(directory, ttl), executor }
    }

    pub const fn resolver(&self) -> &EndpointResolver<D> {
        &self.resolver
    }

    pub const fn executor(&self) -> &Q {
        &self.executor
    }

    pub const fn identity(&self) -> &I {
        &self.identity
    }

    /// Names of the clusters under a subscription
    pub async fn list_clusters(
        &self,
        subscription: &str,
        options: &RequestOptions,
    ) -> Result<Vec<String>> {
        reject_key(options)?;
        self.resolver
            .directory()
            .list_clusters(subscription, options.tenant(), options.retry_policy.as_ref())
            .await
    }

    /// Directory record of a named cluster
    pub async fn get_cluster(
        &self,
        subscription: &str,
        cluster: &str,
        options: &RequestOptions,
    ) -> Result<ClusterRecord> {
        reject_key(options)?;
        self.resolver
            .directory()
            .get_cluster(subscription, cluster, options.tenant(), options.retry_policy.as_ref())
            .await
    }

    /// Canonical endpoint for a target
    pub async fn resolve(
        &self,
        target: &ClusterTarget,
        options: &RequestOptions,
    ) -> Result<ClusterEndpoint> {
        self.resolver.resolve(target, options.tenant(), options.retry_policy.as_ref()).await
    }

    /// Databases on the cluster
    pub async fn list_databases(
        &self,
        target: &ClusterTarget,
        options: &RequestOptions,
    ) -> Result<Vec<String>> {
        let session = self.open(target, options).await?;
        let scope = session.cluster_name.clone();
        let context = format!("Error listing databases on {}", session.endpoint);

        let reader = self.control_command(&session, &scope, SHOW_DATABASES, &context).await?;
        read_column(reader, DATABASE_NAME_COLUMN, &context)
    }

    /// Tables in a database
    pub async fn list_tables(
        &self,
        target: &ClusterTarget,
        database: &str,
        options: &RequestOptions,
    ) -> Result<Vec<String>> {
        let database = non_empty(database, "database")?;
        let session = self.open(target, options).await?;
        let context =
            format!("Error listing tables in database '{database}' on {}", session.endpoint);

        let reader = self.control_command(&session, database, SHOW_TABLES, &context).await?;
        read_column(reader, TABLE_NAME_COLUMN, &context)
    }

    /// Schema fragments describing a table, one per result row
    pub async fn get_table_schema(
        &self,
        target: &ClusterTarget,
        database: &str,
        table: &str,
        options: &RequestOptions,
    ) -> Result<Vec<Value>> {
        let database = non_empty(database, "database")?;
        let table = non_empty(table, "table")?;
        let session = self.open(target, options).await?;
        let context = format!(
            "Error retrieving schema of table '{table}' in database '{database}' on {}",
            session.endpoint
        );

        let command = show_table_schema(table);
        let reader = self.control_command(&session, database, &command, &context).await?;
        read_column(reader, SCHEMA_COLUMN, &context)?
            .into_iter()
            .map(|text| {
                serde_json::from_str(&text).map_err(|e| QuarryError::upstream_from(&*context, e))
            })
            .collect()
    }

    /// Run a query verbatim and return one record per row
    pub async fn query_items(
        &self,
        target: &ClusterTarget,
        database: &str,
        query: &str,
        options: &RequestOptions,
    ) -> Result<Vec<Record>> {
        let database = non_empty(database, "database")?;
        if query.trim().is_empty() {
            return Err(missing("query"));
        }
        let session = self.open(target, options).await?;
        let context =
            format!("Error executing query on database '{database}' at {}", session.endpoint);

        let properties = RequestProperties::new();
        tracing::debug!(
            endpoint = %session.endpoint,
            database,
            request_id = %properties.client_request_id,
            "executing query"
        );
        let reader = self
            .executor
            .execute_query(&session, database, query, Some(&properties))
            .await
            .map_err(|e| upstream(&context, e))?;
        read_records(reader, &context)
    }

    /// Random sample of a table's rows
    pub async fn sample_table(
        &self,
        target: &ClusterTarget,
        database: &str,
        table: &str,
        limit: u32,
        options: &RequestOptions,
    ) -> Result<Vec<Record>> {
        let table = non_empty(table, "table")?;
        if limit == 0 {
            return Err(QuarryError::invalid_input("Sample limit must be greater than zero"));
        }
        self.query_items(target, database, &sample_query(table, limit), options).await
    }

    /// Resolve the target and build the session for one operation
    async fn open(
        &self,
        target: &ClusterTarget,
        options: &RequestOptions,
    ) -> Result<SessionDescriptor> {
        reject_key(options)?;
        let endpoint = self.resolve(target, options).await?;
        self.session(endpoint, options).await
    }

    /// Build a session descriptor for an already-resolved endpoint
    pub async fn session(
        &self,
        endpoint: ClusterEndpoint,
        options: &RequestOptions,
    ) -> Result<SessionDescriptor> {
        let auth = match options.auth_method {
            AuthMethod::Key => return Err(unsupported_key()),
            AuthMethod::ConnectionString => {
                let connection_string = options
                    .connection_string
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        QuarryError::missing_argument(
                            "Connection string authentication requires a connection string",
                        )
                    })?;
                SessionAuth::ConnectionString(connection_string.to_string())
            }
            AuthMethod::Credential => {
                let tenant = options.tenant();
                let credential = self.identity.get_credential(tenant).await?;
                SessionAuth::Credential { credential, authority: tenant.map(tenant_authority) }
            }
        };

        Ok(SessionDescriptor {
            cluster_name: endpoint.short_name().to_string(),
            endpoint,
            auth,
            retry_policy: options.retry_policy.clone(),
        })
    }

    async fn control_command(
        &self,
        session: &SessionDescriptor,
        scope: &str,
        command: &str,
        context: &str,
    ) -> Result<Q::Reader> {
        let properties = RequestProperties::new();
        tracing::debug!(
            endpoint = %session.endpoint,
            scope,
            command,
            request_id = %properties.client_request_id,
            "executing control command"
        );
        self.executor
            .execute_control_command(session, scope, command, Some(&properties))
            .await
            .map_err(|e| upstream(context, e))
    }
}

/// String values of one named column, row by row
fn read_column<R: TabularReader>(mut reader: R, column: &str, context: &str) -> Result<Vec<String>> {
    let index = reader.column_index(column).ok_or_else(|| {
        QuarryError::upstream(context, format!("result is missing the '{column}' column"))
    })?;

    let mut values = Vec::new();
    while reader.advance().map_err(|e| upstream(context, e))? {
        values.push(match reader.value(index) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        });
    }
    Ok(values)
}

/// One ordered record per row, keyed by column name
fn read_records<R: TabularReader>(mut reader: R, context: &str) -> Result<Vec<Record>> {
    let columns: Vec<String> =
        (0..reader.field_count()).map(|i| reader.field_name(i).to_string()).collect();

    let mut records = Vec::new();
    while reader.advance().map_err(|e| upstream(context, e))? {
        let record = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), reader.value(i)))
            .collect::<Record>();
        records.push(record);
    }
    Ok(records)
}

fn upstream(context: &str, err: QuarryError) -> QuarryError {
    tracing::warn!(error = %err, "{context}");
    QuarryError::upstream_from(context, err)
}

/// Key auth is refused up front, before any remote call
fn reject_key(options: &RequestOptions) -> Result<()> {
    if options.auth_method == AuthMethod::Key {
        return Err(unsupported_key());
    }
    Ok(())
}

fn unsupported_key() -> QuarryError {
    QuarryError::unsupported_auth_method(
        "The data plane does not support key-based authentication. Use credential or connection string authentication.",
    )
}

fn missing(name: &str) -> QuarryError {
    QuarryError::missing_required_argument(format!("Missing required option --{name}"))
}

fn non_empty<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(missing(name));
    }
    Ok(value)
}
