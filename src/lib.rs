//! Quarry - Agent-First Cluster Exploration CLI
//!
//! Quarry lists and queries the databases and tables of analytics clusters. A cluster is named
//! either by its endpoint or by subscription plus cluster name; the latter is resolved through a
//! management directory and cached.
//!
//! # Core Principles
//! - Agent-first, machine-only interface (JSON-only output)
//! - Exactly one addressing scheme per request, validated before any remote call
//! - Remote collaborators behind traits, so tests substitute counting mocks
//! - Stable error codes and status codes
//!
//! # Architecture
//! This library provides the core functionality for both CLI and MCP interfaces.
//! Both interfaces are thin wrappers over [`operations`].
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelope types
//! - [`engine`] - Collaborator traits, core types, and the offline catalog engine
//! - [`addressing`] - Addressing validation and operation arguments
//! - [`cache`] - Expiring resolution cache
//! - [`directory`] - Cluster directory lookup
//! - [`resolver`] - Endpoint resolution
//! - [`dispatch`] - Session construction and operation dispatch
//! - [`operations`] - Operation table shared by the CLI and MCP server
//! - [`config`] - Configuration management

pub mod addressing;
pub mod cache;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod operations;
pub mod output;
pub mod resolver;

pub use addressing::{validate_addressing, AddressingMode, ClusterTarget, OperationArgs, RequestOptions};
pub use cache::ResolutionCache;
pub use config::{load_with_precedence, save_profile, ClusterProfile, ConfigLocation, Settings};
pub use directory::{ClusterDirectory, DirectorySnapshot};
pub use dispatch::{Dispatcher, Record};
pub use engine::{
    AuthMethod, ClusterRecord, Credential, IdentityProvider, ManagementDirectory, QueryExecutor,
    RequestProperties, RetryMode, RetryPolicy, RowSet, RowSetReader, SessionAuth,
    SessionDescriptor, TabularReader,
};
pub use error::{QuarryError, Result};
pub use operations::Operation;
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use resolver::{short_name, ClusterEndpoint, EndpointResolver};
