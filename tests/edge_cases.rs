//! Edge Case Testing
//!
//! Runs the full stack against the offline catalog engine and checks unusual inputs:
//! - Unicode names and values
//! - Empty strings vs NULL
//! - Large result sets
//! - Whitespace around arguments
//! - Directory records without an endpoint
//! - Catalog files that are missing or malformed

#![cfg(feature = "catalog")]

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;

use quarry::engine::identity::TOKEN_ENV;
use quarry::operations::{self, open_catalog, CatalogDispatcher, Operation};
use quarry::{OperationArgs, QuarryError, Settings};

// ============================================================================
// Test Helpers
// ============================================================================

fn catalog_document() -> Value {
    let many_rows: Vec<Value> = (0..1000).map(|i| json!([i, format!("row-{i}")])).collect();

    json!({
        "subscriptions": {
            "sub1": {
                "tenant": "tenant-a",
                "clusters": [
                    { "name": "mycluster", "clusterUri": "https://mycluster.westeurope.kusto.windows.net" },
                    { "name": "orphan" }
                ]
            }
        },
        "clusters": {
            "mycluster.westeurope.kusto.windows.net": {
                "databases": {
                    "db1": {
                        "tables": {
                            "StormEvents": {
                                "schema": {
                                    "Name": "StormEvents",
                                    "OrderedColumns": [
                                        { "Name": "State", "Type": "System.String", "CslType": "string" },
                                        { "Name": "Damage", "Type": "System.Int64", "CslType": "long" }
                                    ]
                                }
                            },
                            "Ünïcödé_表": { "schema": { "Name": "Ünïcödé_表" } }
                        },
                        "queries": {
                            "StormEvents | sample 10": {
                                "columns": ["State", "Note"],
                                "rows": [["TEXAS", ""], ["東京", null], ["ÎLE-DE-FRANCE 🌧", "rain"]]
                            },
                            "Big | take 1000": { "columns": ["Id", "Label"], "rows": many_rows }
                        }
                    },
                    "données": {}
                }
            }
        }
    })
}

fn write_catalog(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("quarry-edge-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("catalog.json");
    std::fs::write(&path, contents).unwrap();
    path
}

fn open(name: &str) -> CatalogDispatcher {
    std::env::set_var(TOKEN_ENV, "edge-case-token");
    let path = write_catalog(name, &catalog_document().to_string());
    open_catalog(&Settings::default(), Some(&path)).unwrap()
}

fn coordinates() -> OperationArgs {
    OperationArgs::new().subscription("sub1").cluster_name("mycluster")
}

async fn results(dispatcher: &CatalogDispatcher, operation: Operation, args: &OperationArgs) -> Value {
    operations::run(dispatcher, operation, args).await.unwrap()
}

// ============================================================================
// Catalog-Backed Operations
// ============================================================================

#[tokio::test]
async fn test_unicode_database_and_table_names() {
    let dispatcher = open("unicode");

    let databases = results(&dispatcher, Operation::DatabaseList, &coordinates()).await;
    assert_eq!(databases, json!(["db1", "données"]));

    let tables = results(&dispatcher, Operation::TableList, &coordinates().database("db1")).await;
    assert_eq!(tables, json!(["StormEvents", "Ünïcödé_表"]));

    let schema =
        results(&dispatcher, Operation::TableSchema, &coordinates().database("db1").table("Ünïcödé_表")).await;
    assert_eq!(schema, json!([{ "Name": "Ünïcödé_表" }]));
}

#[tokio::test]
async fn test_schema_keeps_column_details() {
    let dispatcher = open("schema");
    let args = coordinates().database("db1").table("StormEvents");

    let schema = results(&dispatcher, Operation::TableSchema, &args).await;
    assert_eq!(schema[0]["OrderedColumns"][1]["CslType"], json!("long"));
}

#[tokio::test]
async fn test_empty_string_vs_null() {
    let dispatcher = open("nulls");
    let args = coordinates().database("db1").table("StormEvents");

    let rows = results(&dispatcher, Operation::TableSample, &args).await;
    assert_eq!(rows[0]["Note"], json!(""));
    assert_eq!(rows[1]["Note"], Value::Null);
    assert_eq!(rows[1]["State"], json!("東京"));
    assert_eq!(rows[2]["State"], json!("ÎLE-DE-FRANCE 🌧"));
}

#[tokio::test]
async fn test_large_result_set() {
    let dispatcher = open("large");
    let args = OperationArgs::new()
        .cluster_uri("https://mycluster.westeurope.kusto.windows.net")
        .database("db1")
        .query("Big | take 1000");

    let envelope = operations::execute(&dispatcher, Operation::Query, &args).await.unwrap();
    assert_eq!(envelope.meta.count, 1000);
    let rows = envelope.results.unwrap();
    assert_eq!(rows[999], json!({ "Id": 999, "Label": "row-999" }));
}

#[tokio::test]
async fn test_whitespace_around_arguments() {
    let dispatcher = open("whitespace");
    let args = OperationArgs::new()
        .cluster_uri("  https://MyCluster.westeurope.kusto.windows.net  ")
        .database(" db1 ")
        .query("  Big | take 1000\n");

    let rows = results(&dispatcher, Operation::Query, &args).await;
    assert_eq!(rows.as_array().map(Vec::len), Some(1000));
}

#[tokio::test]
async fn test_record_without_endpoint_fails_resolution() {
    let dispatcher = open("orphan");
    let args = OperationArgs::new().subscription("sub1").cluster_name("orphan");

    let err = operations::run(&dispatcher, Operation::DatabaseList, &args).await.unwrap_err();
    assert!(matches!(err, QuarryError::ResolutionFailed(_)));
    assert!(err.message().contains("orphan"));

    // The record itself is still visible
    let record = results(&dispatcher, Operation::ClusterGet, &args).await;
    assert_eq!(record, json!({ "name": "orphan" }));
}

#[tokio::test]
async fn test_subscription_hidden_from_other_tenant() {
    let dispatcher = open("tenant");

    let err = operations::run(&dispatcher, Operation::ClusterList, &coordinates().tenant("tenant-b"))
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Upstream { .. }));
    assert!(err.message().contains("Error retrieving clusters for subscription 'sub1'"));

    let names = results(&dispatcher, Operation::ClusterList, &coordinates().tenant("tenant-a")).await;
    assert_eq!(names, json!(["mycluster", "orphan"]));
}

#[tokio::test]
async fn test_unknown_database_is_upstream_error() {
    let dispatcher = open("unknown-db");
    let err = operations::run(&dispatcher, Operation::TableList, &coordinates().database("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Upstream { .. }));
    assert!(err.message().contains("nope"));
}

// ============================================================================
// Catalog Loading
// ============================================================================

#[test]
fn test_missing_catalog_file() {
    let path = std::env::temp_dir().join("quarry-edge-does-not-exist").join("catalog.json");
    let err = open_catalog(&Settings::default(), Some(&path)).unwrap_err();
    assert!(matches!(err, QuarryError::ConfigError(_)));
}

#[test]
fn test_malformed_catalog_file() {
    let path = write_catalog("malformed", "{ \"subscriptions\": [");
    let err = open_catalog(&Settings::default(), Some(&path)).unwrap_err();
    assert!(matches!(err, QuarryError::ConfigError(_)));
    assert!(err.message().contains("Invalid catalog file format"));
}

#[test]
fn test_catalog_path_from_settings() {
    let path = write_catalog("settings", &catalog_document().to_string());
    let settings = Settings { catalog: Some(path), ..Default::default() };
    assert!(open_catalog(&settings, None).is_ok());
}
