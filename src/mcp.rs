//! MCP (Model Context Protocol) Server
//!
//! This module implements an MCP server using manual JSON-RPC 2.0 over stdio.
//!
//! # Architecture
//!
//! - **Transport**: JSON-RPC 2.0 over stdio (line-based)
//! - **Dependencies**: Only `serde_json` and anyhow (no MCP-specific crates)
//! - **Session**: One dispatcher, and so one resolution cache, for the whole server session
//!
//! # MCP Tools
//!
//! - `cluster_list` / `cluster_get` - Clusters under a subscription
//! - `database_list` - Databases on a cluster
//! - `table_list` / `table_schema` / `table_sample` - Tables in a database
//! - `query` - Run a query verbatim
//!
//! Operation failures are reported as tool results with `isError: true` carrying the same
//! error envelope the CLI prints. Protocol failures are JSON-RPC errors.
//!
//! # Usage
//!
//! Start the MCP server with: `quarry mcp`
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "quarry": {
//!       "command": "quarry",
//!       "args": ["mcp"]
//!     }
//!   }
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

use crate::addressing::OperationArgs;
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::engine::{AuthMethod, IdentityProvider, ManagementDirectory, QueryExecutor};
use crate::operations::{self, Operation};

// ============================================================================
// JSON-RPC 2.0 Structures
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn failure(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message, data: None }),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

const PARSE_ERROR: i32 = -32700;
const INTERNAL_ERROR: i32 = -32603;

// ============================================================================
// MCP Tool Result Structures
// ============================================================================

/// Text content block for MCP tool results
#[derive(Debug, Serialize)]
struct TextContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

/// MCP tool call result
#[derive(Debug, Serialize)]
struct CallToolResult {
    content: Vec<TextContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl CallToolResult {
    fn new(data: &impl Serialize, is_error: bool) -> Result<Value> {
        let text = serde_json::to_string_pretty(data)?;
        let result =
            Self { content: vec![TextContent { content_type: "text".to_string(), text }], is_error };
        Ok(serde_json::to_value(result)?)
    }
}

// ============================================================================
// MCP Server
// ============================================================================

/// MCP session state
pub struct McpServer<I, D, Q> {
    dispatcher: Dispatcher<I, D, Q>,
    settings: Settings,
}

impl<I, D, Q> McpServer<I, D, Q>
where
    I: IdentityProvider,
    D: ManagementDirectory,
    Q: QueryExecutor,
{
    pub const fn new(dispatcher: Dispatcher<I, D, Q>, settings: Settings) -> Self {
        Self { dispatcher, settings }
    }

    pub const fn dispatcher(&self) -> &Dispatcher<I, D, Q> {
        &self.dispatcher
    }

    /// Handle one line of input, returning the response line
    ///
    /// Notifications get no response.
    pub async fn handle_line(&self, line: &str) -> Result<Option<String>> {
        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::failure(None, PARSE_ERROR, format!("Parse error: {e}"))),
        };
        Ok(response.map(|r| serde_json::to_string(&r)).transpose()?)
    }

    /// Route a request to its handler; `None` for notifications
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.id.is_none() && request.method.starts_with("notifications/") {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(handle_initialize()),
            "tools/list" => Ok(handle_list_tools()),
            "tools/call" => self.handle_call_tool(request.params).await,
            _ => Err(anyhow!("Unknown method: {}", request.method)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::failure(request.id, INTERNAL_ERROR, e.to_string()),
        })
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params = params.ok_or_else(|| anyhow!("Missing params"))?;
        let name = params["name"].as_str().ok_or_else(|| anyhow!("Missing tool name"))?;
        let operation =
            Operation::from_tool_name(name).ok_or_else(|| anyhow!("Unknown tool: {name}"))?;

        let mut args = parse_arguments(&params["arguments"], &self.settings)?;
        let profile = params["arguments"].get("profile").and_then(Value::as_str);

        if let Err(e) = self.settings.apply(&mut args, profile) {
            let envelope = crate::output::ErrorEnvelope::from_error(operation.command(), &e);
            return CallToolResult::new(&envelope, true);
        }

        match operations::execute(&self.dispatcher, operation, &args).await {
            Ok(envelope) => CallToolResult::new(&envelope, false),
            Err(envelope) => CallToolResult::new(&envelope, true),
        }
    }
}

/// Start the MCP server over stdio
///
/// Each request is a single line of JSON; each response is a single line of JSON.
#[allow(clippy::future_not_send)]
pub async fn serve<I, D, Q>(server: McpServer<I, D, Q>) -> Result<()>
where
    I: IdentityProvider,
    D: ManagementDirectory,
    Q: QueryExecutor,
{
    let stdin = io::stdin();
    let reader = stdin.lock();
    let mut stdout = io::stdout();

    tracing::info!("mcp server started");
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = server.handle_line(&line).await? {
            writeln!(stdout, "{response}")?;
            stdout.flush()?;
        }
    }

    Ok(())
}

// ============================================================================
// MCP Protocol Handlers
// ============================================================================

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": "quarry",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Arguments shared by every cluster-scoped tool
fn addressing_properties() -> serde_json::Map<String, Value> {
    let properties = json!({
        "cluster_uri": {
            "type": "string",
            "description": "Cluster endpoint, e.g. https://mycluster.westeurope.kusto.windows.net. When given, subscription and cluster_name are ignored."
        },
        "subscription": {
            "type": "string",
            "description": "Subscription containing the cluster. Required with cluster_name when cluster_uri is omitted."
        },
        "cluster_name": {
            "type": "string",
            "description": "Cluster name within the subscription. Resolved to an endpoint and cached for an hour."
        },
        "tenant": {
            "type": "string",
            "description": "Optional tenant to authenticate against."
        },
        "auth_method": {
            "type": "string",
            "enum": ["credential", "connection_string", "key"],
            "description": "Authentication method. Defaults to credential. 'key' is not supported by the data plane."
        },
        "profile": {
            "type": "string",
            "description": "Name of a saved cluster profile. Fills in whatever addressing, tenant and database arguments are omitted."
        }
    });
    match properties {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn tool(name: &str, description: &str, extra: Value, required: &[&str]) -> Value {
    let mut properties = addressing_properties();
    if let Value::Object(extra) = extra {
        properties.extend(extra);
    }
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required
        }
    })
}

fn handle_list_tools() -> Value {
    let database = json!({ "database": { "type": "string", "description": "Database name" } });
    let table = json!({
        "database": { "type": "string", "description": "Database name" },
        "table": { "type": "string", "description": "Table name" }
    });

    let tools = vec![
        tool(
            Operation::ClusterList.tool_name(),
            "List the names of the clusters in a subscription.",
            json!({}),
            &["subscription"],
        ),
        tool(
            Operation::ClusterGet.tool_name(),
            "Get the directory record of one cluster, including its clusterUri.",
            json!({}),
            &["subscription", "cluster_name"],
        ),
        tool(
            Operation::DatabaseList.tool_name(),
            "List the databases on a cluster. Name the cluster by cluster_uri, or by subscription and cluster_name.",
            json!({}),
            &[],
        ),
        tool(
            Operation::TableList.tool_name(),
            "List the tables in a database.",
            database,
            &["database"],
        ),
        tool(
            Operation::TableSchema.tool_name(),
            "Get the JSON schema of a table.",
            table.clone(),
            &["database", "table"],
        ),
        tool(
            Operation::TableSample.tool_name(),
            "Return a random sample of a table's rows. Defaults to 10 rows.",
            {
                let mut sample = table;
                sample["limit"] =
                    json!({ "type": "number", "description": "Number of rows to sample (default 10)" });
                sample
            },
            &["database", "table"],
        ),
        tool(
            Operation::Query.tool_name(),
            "Run a query against a database and return one record per row. The query is sent verbatim. Empty results omit the 'results' field.",
            json!({
                "database": { "type": "string", "description": "Database name" },
                "query": { "type": "string", "description": "Query text" }
            }),
            &["database", "query"],
        ),
    ];

    json!({ "tools": tools })
}

/// Build operation arguments from a tool call's `arguments` object
fn parse_arguments(args: &Value, settings: &Settings) -> Result<OperationArgs> {
    let text = |key: &str| args.get(key).and_then(Value::as_str).map(str::to_string);

    let auth_method = match args.get("auth_method") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<AuthMethod>(value.clone()).map_err(|_| {
                anyhow!("Invalid auth_method. Must be credential, connection_string or key")
            })?,
        ),
    };

    let limit = match args.get("limit") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| anyhow!("Invalid limit. Must be a non-negative integer"))?,
        ),
    };

    let mut parsed = OperationArgs {
        cluster_uri: text("cluster_uri"),
        subscription: text("subscription"),
        cluster_name: text("cluster_name"),
        database: text("database"),
        table: text("table"),
        query: text("query"),
        limit,
        ..Default::default()
    };
    parsed.options.tenant = text("tenant");
    parsed.options.auth_method = settings.auth_method(auth_method);
    Ok(parsed)
}
