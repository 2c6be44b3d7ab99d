//! Quarry CLI Entry Point
//!
//! Subcommands:
//! - `cluster list|get` - Clusters under a subscription
//! - `database list` - Databases on a cluster
//! - `table list|schema|sample` - Tables in a database
//! - `query` - Run a query verbatim
//! - `profile save` - Save a named cluster profile
//! - `mcp` - MCP server mode (hidden, for AI agent integration)
//!
//! All output to stdout is JSON-only. Logs go to stderr, filtered by `QUARRY_LOG`.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use quarry::config::{self, ClusterProfile, ConfigLocation, Settings};
use quarry::mcp::{self, McpServer};
use quarry::operations::{self, open_catalog, CatalogDispatcher, Operation};
use quarry::{AuthMethod, ErrorEnvelope, OperationArgs, QuarryError, RetryMode, RetryPolicy, SuccessEnvelope};

/// Quarry - Agent-First Cluster Exploration CLI
#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Agent-first exploration of analytics clusters, databases and tables")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options accepted by every subcommand
#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Subscription containing the cluster
    #[arg(long, global = true)]
    subscription: Option<String>,

    /// Cluster endpoint; takes precedence over --subscription/--cluster-name
    #[arg(long, global = true)]
    cluster_uri: Option<String>,

    /// Cluster name within the subscription
    #[arg(long, global = true)]
    cluster_name: Option<String>,

    /// Tenant to authenticate against
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Authentication method
    #[arg(long, global = true, value_enum)]
    auth_method: Option<AuthMethod>,

    /// Connection string (for --auth-method connection_string)
    #[arg(long, global = true, env = "QUARRY_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Saved cluster profile to fill in omitted arguments
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Offline catalog file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Delay between retries, in seconds
    #[arg(long, global = true)]
    retry_delay: Option<f64>,

    /// Maximum back-off delay, in seconds
    #[arg(long, global = true)]
    retry_max_delay: Option<f64>,

    /// Maximum number of retries
    #[arg(long, global = true)]
    retry_max_retries: Option<u32>,

    /// Back-off mode
    #[arg(long, global = true, value_enum)]
    retry_mode: Option<RetryMode>,

    /// Network timeout per attempt, in seconds
    #[arg(long, global = true)]
    retry_network_timeout: Option<f64>,
}

impl GlobalArgs {
    /// Retry policy overlaid with any retry flags; `None` when nothing is set anywhere
    fn retry_policy(&self, configured: Option<RetryPolicy>) -> Option<RetryPolicy> {
        let flagged = self.retry_delay.is_some()
            || self.retry_max_delay.is_some()
            || self.retry_max_retries.is_some()
            || self.retry_mode.is_some()
            || self.retry_network_timeout.is_some();
        if !flagged {
            return configured;
        }

        let mut policy = configured.unwrap_or_default();
        if let Some(v) = self.retry_delay {
            policy.delay_seconds = v;
        }
        if let Some(v) = self.retry_max_delay {
            policy.max_delay_seconds = v;
        }
        if let Some(v) = self.retry_max_retries {
            policy.max_retries = v;
        }
        if let Some(v) = self.retry_mode {
            policy.mode = v;
        }
        if let Some(v) = self.retry_network_timeout {
            policy.network_timeout_seconds = v;
        }
        Some(policy)
    }

    /// Explicit arguments first, then profile and settings for whatever is left
    fn operation_args(&self, settings: &Settings, args: OperationArgs) -> quarry::Result<OperationArgs> {
        let mut args = OperationArgs {
            cluster_uri: self.cluster_uri.clone(),
            subscription: self.subscription.clone(),
            cluster_name: self.cluster_name.clone(),
            ..args
        };
        args.options.tenant.clone_from(&self.tenant);
        args.options.auth_method = settings.auth_method(self.auth_method);
        args.options.connection_string.clone_from(&self.connection_string);
        args.options.retry_policy = self.retry_policy(settings.retry_policy.clone());

        settings.apply(&mut args, self.profile.as_deref())?;
        Ok(args)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Clusters under a subscription
    Cluster {
        #[command(subcommand)]
        command: ClusterCommand,
    },

    /// Databases on a cluster
    Database {
        #[command(subcommand)]
        command: DatabaseCommand,
    },

    /// Tables in a database
    Table {
        #[command(subcommand)]
        command: TableCommand,
    },

    /// Run a query against a database
    Query {
        #[arg(long)]
        database: Option<String>,

        /// Query text, sent verbatim
        #[arg(long)]
        query: Option<String>,
    },

    /// Saved cluster profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Start MCP server (hidden from help, for AI agent integration)
    #[command(hide = true)]
    Mcp,
}

#[derive(Subcommand)]
enum ClusterCommand {
    /// List cluster names
    List,
    /// Show one cluster's directory record
    Get,
}

#[derive(Subcommand)]
enum DatabaseCommand {
    /// List databases
    List,
}

#[derive(Subcommand)]
enum TableCommand {
    /// List tables
    List {
        #[arg(long)]
        database: Option<String>,
    },
    /// Show a table's schema
    Schema {
        #[arg(long)]
        database: Option<String>,
        #[arg(long)]
        table: Option<String>,
    },
    /// Return a random sample of a table's rows
    Sample {
        #[arg(long)]
        database: Option<String>,
        #[arg(long)]
        table: Option<String>,
        /// Number of rows (default 10)
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Save the current addressing arguments under a name
    Save {
        /// Profile name
        name: String,
        /// Default database for the profile
        #[arg(long)]
        database: Option<String>,
        /// Save to the global config instead of the local one
        #[arg(long)]
        global: bool,
        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("QUARRY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    let (operation, args) = match cli.command {
        Commands::Cluster { command: ClusterCommand::List } => {
            (Operation::ClusterList, OperationArgs::new())
        }
        Commands::Cluster { command: ClusterCommand::Get } => {
            (Operation::ClusterGet, OperationArgs::new())
        }
        Commands::Database { command: DatabaseCommand::List } => {
            (Operation::DatabaseList, OperationArgs::new())
        }
        Commands::Table { command: TableCommand::List { database } } => {
            (Operation::TableList, OperationArgs { database, ..Default::default() })
        }
        Commands::Table { command: TableCommand::Schema { database, table } } => {
            (Operation::TableSchema, OperationArgs { database, table, ..Default::default() })
        }
        Commands::Table { command: TableCommand::Sample { database, table, limit } } => (
            Operation::TableSample,
            OperationArgs { database, table, limit, ..Default::default() },
        ),
        Commands::Query { database, query } => {
            (Operation::Query, OperationArgs { database, query, ..Default::default() })
        }
        Commands::Profile { command: ProfileCommand::Save { name, database, global: to_global, default } } => {
            let location = if to_global { ConfigLocation::Global } else { ConfigLocation::Local };
            return save_profile(&global, &name, database, location, default);
        }
        Commands::Mcp => return run_mcp(&global).await,
    };

    run_operation(&global, operation, args).await
}

async fn run_operation(global: &GlobalArgs, operation: Operation, args: OperationArgs) -> ExitCode {
    let prepared = config::load_with_precedence().and_then(|settings| {
        let args = global.operation_args(&settings, args)?;
        let dispatcher = open_catalog(&settings, global.catalog.as_deref())?;
        Ok::<(OperationArgs, CatalogDispatcher), QuarryError>((args, dispatcher))
    });

    let (args, dispatcher) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => return emit(&ErrorEnvelope::from_error(operation.command(), &e), ExitCode::FAILURE),
    };

    match operations::execute(&dispatcher, operation, &args).await {
        Ok(envelope) => emit(&envelope, ExitCode::SUCCESS),
        Err(envelope) => emit(&envelope, ExitCode::FAILURE),
    }
}

fn save_profile(
    global: &GlobalArgs,
    name: &str,
    database: Option<String>,
    location: ConfigLocation,
    make_default: bool,
) -> ExitCode {
    const COMMAND: &str = "profile save";
    let start = Instant::now();

    let profile = ClusterProfile {
        cluster_uri: global.cluster_uri.clone(),
        subscription: global.subscription.clone(),
        cluster_name: global.cluster_name.clone(),
        tenant: global.tenant.clone(),
        database,
    };

    match config::save_profile(name, profile.clone(), location, make_default) {
        Ok(()) => {
            let results = json!({
                "name": name,
                "saved_to": match location {
                    ConfigLocation::Local => "local",
                    ConfigLocation::Global => "global",
                },
                "profile": profile,
            });
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            emit(&SuccessEnvelope::new(COMMAND, results, elapsed), ExitCode::SUCCESS)
        }
        Err(e) => emit(&ErrorEnvelope::from_error(COMMAND, &e), ExitCode::FAILURE),
    }
}

async fn run_mcp(global: &GlobalArgs) -> ExitCode {
    let prepared = config::load_with_precedence().and_then(|settings| {
        let dispatcher = open_catalog(&settings, global.catalog.as_deref())?;
        Ok((settings, dispatcher))
    });

    let (settings, dispatcher) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => return emit(&ErrorEnvelope::from_error("mcp", &e), ExitCode::FAILURE),
    };

    match mcp::serve(McpServer::new(dispatcher, settings)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mcp server stopped");
            ExitCode::FAILURE
        }
    }
}

/// Print one envelope to stdout
fn emit(envelope: &impl Serialize, code: ExitCode) -> ExitCode {
    match serde_json::to_string_pretty(envelope) {
        Ok(json) => {
            println!("{json}");
            code
        }
        Err(e) => {
            tracing::error!(error = %e, "could not encode output");
            ExitCode::FAILURE
        }
    }
}
