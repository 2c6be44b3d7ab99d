//! Recording collaborators shared by the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use quarry::{
    ClusterRecord, Credential, Dispatcher, IdentityProvider, ManagementDirectory, QuarryError,
    QueryExecutor, RequestProperties, Result, RetryPolicy, RowSet, RowSetReader, SessionAuth,
    SessionDescriptor, TabularReader,
};

pub const SUBSCRIPTION: &str = "sub1";
pub const CLUSTER: &str = "mycluster";
pub const CLUSTER_URI: &str = "https://mycluster.kusto.example.net";

// ============================================================================
// Identity
// ============================================================================

#[derive(Default)]
pub struct StaticIdentity {
    pub calls: AtomicUsize,
}

impl StaticIdentity {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for StaticIdentity {
    async fn get_credential(&self, tenant: Option<&str>) -> Result<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Credential::new("test-token", tenant.map(str::to_string)))
    }
}

pub struct FailingIdentity;

impl IdentityProvider for FailingIdentity {
    async fn get_credential(&self, _tenant: Option<&str>) -> Result<Credential> {
        Err(QuarryError::upstream("identity provider", "token expired"))
    }
}

// ============================================================================
// Directory
// ============================================================================

pub struct CountingDirectory {
    pub records: Vec<ClusterRecord>,
    pub calls: AtomicUsize,
    pub tenants: Mutex<Vec<Option<String>>>,
    pub fail: AtomicBool,
}

impl CountingDirectory {
    pub fn new(records: Vec<ClusterRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
            tenants: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Directory listing `mycluster` in `sub1`
    pub fn standard() -> Self {
        Self::new(vec![
            ClusterRecord::new("othercluster", "https://othercluster.kusto.example.net"),
            ClusterRecord::new(CLUSTER, CLUSTER_URI),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ManagementDirectory for CountingDirectory {
    async fn enumerate_clusters(
        &self,
        _subscription: &str,
        tenant: Option<&str>,
        _retry_policy: Option<&RetryPolicy>,
    ) -> Result<Vec<ClusterRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tenants.lock().push(tenant.map(str::to_string));
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuarryError::upstream("management", "service unavailable"));
        }
        Ok(self.records.clone())
    }
}

// ============================================================================
// Executor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Control,
    Query,
}

/// One recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub endpoint: String,
    pub cluster_name: String,
    pub scope: String,
    pub text: String,
    pub auth: String,
    pub has_properties: bool,
}

/// Reader that can fail partway through
pub struct ScriptedReader {
    inner: RowSetReader,
    fail_after: Option<usize>,
    advanced: usize,
}

impl TabularReader for ScriptedReader {
    fn field_count(&self) -> usize {
        self.inner.field_count()
    }

    fn field_name(&self, index: usize) -> &str {
        self.inner.field_name(index)
    }

    fn value(&self, index: usize) -> Value {
        self.inner.value(index)
    }

    fn advance(&mut self) -> Result<bool> {
        if self.fail_after == Some(self.advanced) {
            return Err(QuarryError::upstream("transport", "connection reset"));
        }
        self.advanced += 1;
        self.inner.advance()
    }
}

/// Executor answering from canned results and recording every call
#[derive(Default)]
pub struct RecordingExecutor {
    pub responses: HashMap<String, RowSet>,
    pub calls: Mutex<Vec<Call>>,
    pub fail: bool,
    pub fail_after_rows: Option<usize>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(mut self, text: &str, rows: RowSet) -> Self {
        self.responses.insert(text.to_string(), rows);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(
        &self,
        kind: CallKind,
        session: &SessionDescriptor,
        scope: &str,
        text: &str,
        properties: Option<&RequestProperties>,
    ) -> Result<ScriptedReader> {
        let auth = match &session.auth {
            SessionAuth::Credential { .. } => "credential",
            SessionAuth::ConnectionString(_) => "connection_string",
        };
        self.calls.lock().push(Call {
            kind,
            endpoint: session.endpoint.to_string(),
            cluster_name: session.cluster_name.clone(),
            scope: scope.to_string(),
            text: text.to_string(),
            auth: auth.to_string(),
            has_properties: properties.is_some(),
        });

        if self.fail {
            return Err(QuarryError::upstream("data plane", "request throttled"));
        }
        let rows = self.responses.get(text).cloned().unwrap_or_default();
        Ok(ScriptedReader { inner: rows.into_reader(), fail_after: self.fail_after_rows, advanced: 0 })
    }
}

impl QueryExecutor for RecordingExecutor {
    type Reader = ScriptedReader;

    async fn execute_control_command(
        &self,
        session: &SessionDescriptor,
        scope: &str,
        command: &str,
        properties: Option<&RequestProperties>,
    ) -> Result<ScriptedReader> {
        self.record(CallKind::Control, session, scope, command, properties)
    }

    async fn execute_query(
        &self,
        session: &SessionDescriptor,
        database: &str,
        query: &str,
        properties: Option<&RequestProperties>,
    ) -> Result<ScriptedReader> {
        self.record(CallKind::Query, session, database, query, properties)
    }
}

pub type TestDispatcher = Dispatcher<StaticIdentity, CountingDirectory, RecordingExecutor>;

pub fn dispatcher(executor: RecordingExecutor) -> TestDispatcher {
    Dispatcher::new(StaticIdentity::default(), CountingDirectory::standard(), executor)
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::String((*v).to_string())).collect()
}
