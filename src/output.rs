//! JSON Output Envelope Types
//!
//! Every Quarry operation returns either a [`SuccessEnvelope`] or an [`ErrorEnvelope`].
//!
//! # Output Contract
//! - Success: `{"ok": true, "command": "...", "status": 200, "results": ..., "meta": {...}}`
//! - Error: `{"ok": false, "command": "...", "status": 400, "error": {"code": "...", "message": "..."}}`
//!
//! An empty result collection is reported by omitting `results` entirely.

use serde::{Deserialize, Serialize};

use crate::error::QuarryError;

/// Status reported by successful operations
pub const STATUS_OK: u16 = 200;

/// Result collections that can be empty
pub trait ResultSet {
    fn result_count(&self) -> usize;
}

impl<T> ResultSet for Vec<T> {
    fn result_count(&self) -> usize {
        self.len()
    }
}

impl ResultSet for serde_json::Value {
    fn result_count(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Array(items) => items.len(),
            Self::Object(map) => usize::from(!map.is_empty()),
            _ => 1,
        }
    }
}

/// Success envelope for operation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Command that was executed (e.g. `table list`)
    pub command: String,

    pub status: u16,

    /// Operation results; absent when there are none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<T>,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T: ResultSet> SuccessEnvelope<T> {
    /// Create a success envelope, dropping empty result collections
    pub fn new(command: impl Into<String>, results: T, execution_ms: u64) -> Self {
        let count = results.result_count();
        Self {
            ok: true,
            command: command.into(),
            status: STATUS_OK,
            results: (count > 0).then_some(results),
            meta: Metadata { execution_ms, count },
        }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Command that was attempted
    pub command: String,

    pub status: u16,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(command: impl Into<String>, status: u16, error: ErrorInfo) -> Self {
        Self { ok: false, command: command.into(), status, error }
    }

    /// Create error envelope from QuarryError
    pub fn from_error(command: impl Into<String>, err: &QuarryError) -> Self {
        Self::new(
            command,
            err.status_code(),
            ErrorInfo::new(err.error_code(), err.message()),
        )
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g. "RESOURCE_NOT_FOUND")
    pub code: String,

    /// Human-readable message, never carrying credentials
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of results returned
    pub count: usize,
}
