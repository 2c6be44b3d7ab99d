//! Output Validation Tests
//!
//! Validates that every Quarry output has the documented JSON shape:
//! - Success envelopes carry `ok`, `command`, `status`, `meta` and, when non-empty, `results`
//! - Error envelopes carry `ok`, `command`, `status` and `error.code` / `error.message`
//! - MCP tool results wrap the same envelopes

mod common;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{
    dispatcher, strings, CountingDirectory, RecordingExecutor, StaticIdentity, CLUSTER, CLUSTER_URI,
    SUBSCRIPTION,
};
use quarry::mcp::McpServer;
use quarry::operations::{self, Operation};
use quarry::{AuthMethod, ErrorEnvelope, OperationArgs, QuarryError, RowSet, Settings};

fn executor() -> RecordingExecutor {
    RecordingExecutor::new()
        .respond(".show databases", RowSet::single_column("DatabaseName", strings(&["db1"])))
        .respond(
            "Events | take 2",
            RowSet::new(
                vec!["Id".into(), "Name".into()],
                vec![vec![json!(1), json!("a")], vec![json!(2), Value::Null]],
            ),
        )
}

fn to_value(envelope: &impl serde::Serialize) -> Value {
    serde_json::to_value(envelope).expect("Should serialize")
}

// ============================================================================
// Success Envelopes
// ============================================================================

#[tokio::test]
async fn test_success_envelope_structure() {
    let dispatcher = dispatcher(executor());
    let args = OperationArgs::new().subscription(SUBSCRIPTION).cluster_name(CLUSTER);

    let envelope = operations::execute(&dispatcher, Operation::DatabaseList, &args).await.unwrap();
    let value = to_value(&envelope);

    assert_eq!(value["ok"], json!(true));
    assert_eq!(value["command"], json!("database list"));
    assert_eq!(value["status"], json!(200));
    assert_eq!(value["results"], json!(["db1"]));
    assert_eq!(value["meta"]["count"], json!(1));
    assert!(value["meta"]["execution_ms"].is_u64());
}

#[tokio::test]
async fn test_query_results_are_records_in_column_order() {
    let dispatcher = dispatcher(executor());
    let args = OperationArgs::new().cluster_uri(CLUSTER_URI).database("db1").query("Events | take 2");

    let envelope = operations::execute(&dispatcher, Operation::Query, &args).await.unwrap();
    let json = serde_json::to_string(&envelope).unwrap();

    assert!(json.contains(r#"{"Id":1,"Name":"a"}"#));
    assert!(json.contains(r#"{"Id":2,"Name":null}"#));
    assert_eq!(envelope.meta.count, 2);
}

#[tokio::test]
async fn test_empty_results_omit_results_field() {
    let executor = RecordingExecutor::new()
        .respond(".show tables", RowSet::new(vec!["TableName".into()], vec![]));
    let dispatcher = dispatcher(executor);
    let args = OperationArgs::new().cluster_uri(CLUSTER_URI).database("db1");

    let envelope = operations::execute(&dispatcher, Operation::TableList, &args).await.unwrap();
    let value = to_value(&envelope);

    assert_eq!(value.get("results"), None);
    assert_eq!(value["ok"], json!(true));
    assert_eq!(value["meta"]["count"], json!(0));
}

#[tokio::test]
async fn test_cluster_get_returns_canonical_record() {
    let dispatcher = dispatcher(RecordingExecutor::new());
    let args = OperationArgs::new().subscription(SUBSCRIPTION).cluster_name("MYCLUSTER");

    let envelope = operations::execute(&dispatcher, Operation::ClusterGet, &args).await.unwrap();
    assert_eq!(
        envelope.results,
        Some(json!({ "name": CLUSTER, "clusterUri": CLUSTER_URI }))
    );
}

// ============================================================================
// Error Envelopes
// ============================================================================

#[tokio::test]
async fn test_error_envelope_structure() {
    let dispatcher = dispatcher(executor());
    let args = OperationArgs::new().subscription(SUBSCRIPTION);

    let envelope = operations::execute(&dispatcher, Operation::DatabaseList, &args).await.unwrap_err();
    let value = to_value(&envelope);

    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["command"], json!("database list"));
    assert_eq!(value["status"], json!(400));
    assert_eq!(value["error"]["code"], json!("MISSING_REQUIRED_ARGUMENT"));
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Either --cluster-uri must be provided, or both --subscription and --cluster-name must be provided."));
}

#[tokio::test]
async fn test_key_auth_error_envelope() {
    let dispatcher = dispatcher(executor());
    let args = OperationArgs::new().cluster_uri(CLUSTER_URI).auth_method(AuthMethod::Key);

    let envelope = operations::execute(&dispatcher, Operation::DatabaseList, &args).await.unwrap_err();
    assert_eq!(envelope.status, 400);
    assert_eq!(envelope.error.code, "UNSUPPORTED_AUTH_METHOD");
}

#[test]
fn test_all_error_codes_are_consistent() {
    let cases = [
        (QuarryError::missing_required_argument("x"), "MISSING_REQUIRED_ARGUMENT", 400),
        (QuarryError::resource_not_found("x"), "RESOURCE_NOT_FOUND", 404),
        (QuarryError::resolution_failed("x"), "RESOLUTION_FAILED", 500),
        (QuarryError::invalid_endpoint("x"), "INVALID_ENDPOINT", 400),
        (QuarryError::unsupported_auth_method("x"), "UNSUPPORTED_AUTH_METHOD", 400),
        (QuarryError::missing_argument("x"), "MISSING_ARGUMENT", 400),
        (QuarryError::upstream("ctx", "x"), "UPSTREAM_ERROR", 500),
        (QuarryError::invalid_input("x"), "INVALID_INPUT", 400),
        (QuarryError::config_error("x"), "CONFIG_ERROR", 500),
    ];

    for (err, code, status) in cases {
        let envelope = ErrorEnvelope::from_error("query", &err);
        assert_eq!(envelope.error.code, code);
        assert_eq!(envelope.status, status);
        assert!(!envelope.ok);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
    }
}

// ============================================================================
// MCP
// ============================================================================

type TestServer = McpServer<StaticIdentity, CountingDirectory, RecordingExecutor>;

fn server() -> TestServer {
    McpServer::new(dispatcher(executor()), Settings::default())
}

async fn call(server: &TestServer, line: &str) -> Value {
    let response = server.handle_line(line).await.unwrap().expect("Request should get a response");
    serde_json::from_str(&response).expect("Response should be JSON")
}

#[tokio::test]
async fn test_mcp_initialize_and_list_tools() {
    let server = server();

    let init = call(&server, r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;
    assert_eq!(init["id"], json!(1));
    assert_eq!(init["result"]["serverInfo"]["name"], json!("quarry"));

    let tools = call(&server, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
    let names: Vec<&str> =
        tools["result"]["tools"].as_array().unwrap().iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(
        names,
        ["cluster_list", "cluster_get", "database_list", "table_list", "table_schema", "table_sample", "query"]
    );
}

#[tokio::test]
async fn test_mcp_tool_call_wraps_success_envelope() {
    let server = server();
    let request = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {
            "name": "database_list",
            "arguments": { "subscription": SUBSCRIPTION, "cluster_name": CLUSTER }
        }
    });

    let response = call(&server, &request.to_string()).await;
    assert_eq!(response["result"]["isError"], json!(false));

    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let envelope: Value = serde_json::from_str(text).unwrap();
    assert_eq!(envelope["results"], json!(["db1"]));
}

#[tokio::test]
async fn test_mcp_session_shares_resolution_cache() {
    let server = server();
    let request = json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": {
            "name": "database_list",
            "arguments": { "subscription": SUBSCRIPTION, "cluster_name": CLUSTER }
        }
    })
    .to_string();

    call(&server, &request).await;
    call(&server, &request).await;
    assert_eq!(server.dispatcher().resolver().directory().backend().calls(), 1);
}

#[tokio::test]
async fn test_mcp_operation_failure_is_tool_error() {
    let server = server();
    let request = json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {
            "name": "table_list",
            "arguments": { "cluster_uri": CLUSTER_URI, "auth_method": "key", "database": "db1" }
        }
    });

    let response = call(&server, &request.to_string()).await;
    assert_eq!(response["result"]["isError"], json!(true));

    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let envelope: Value = serde_json::from_str(text).unwrap();
    assert_eq!(envelope["error"]["code"], json!("UNSUPPORTED_AUTH_METHOD"));
    assert_eq!(envelope["status"], json!(400));
}

#[tokio::test]
async fn test_mcp_protocol_errors() {
    let server = server();

    let parse = call(&server, "{not json").await;
    assert_eq!(parse["error"]["code"], json!(-32700));

    let unknown = call(&server, r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#).await;
    assert_eq!(unknown["error"]["code"], json!(-32603));
    assert_eq!(unknown["id"], json!(6));

    let tool = call(
        &server,
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"drop_database"}}"#,
    )
    .await;
    assert!(tool["error"]["message"].as_str().unwrap().contains("drop_database"));
}

#[tokio::test]
async fn test_mcp_notifications_get_no_response() {
    let server = server();

    let initialized = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
    assert_eq!(server.handle_line(initialized).await.unwrap(), None);

    let cancelled = r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":1}}"#;
    assert_eq!(server.handle_line(cancelled).await.unwrap(), None);

    // Requests with an id still get answered
    let init = call(&server, r#"{"jsonrpc":"2.0","id":8,"method":"initialize","params":{}}"#).await;
    assert_eq!(init["id"], json!(8));
}
