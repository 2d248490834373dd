//! Storage transport seam.
//! The lookup core is backend-agnostic: it hands a fully built query
//! string to a [`BackendSession`] and receives the complete result set
//! back as named-column [`SqlRow`]s (store-result semantics — the row set
//! is buffered client-side, so the tracked cursor never pins server
//! state). Transport failures stay `anyhow` here and are collapsed to the
//! lookup taxonomy at the session-manager boundary.

use anyhow::Result;

use crate::config::ConnectParams;

pub mod memory;
#[cfg(feature = "mysql-backend")]
pub mod mysql;

/// One column value as delivered by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// One result row with named column access. Column names come from the
/// result set itself, which is what makes the template/field-map contract
/// checkable instead of positional.
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    cols: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new() -> Self {
        SqlRow { cols: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.cols.push((name.into(), value));
    }

    /// Named column access; `None` when the column is absent from the
    /// result set (template drift, not a NULL value).
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.cols
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// First column of the row; single-column auxiliary queries
    /// (member lists, group-id lists) are read this way.
    pub fn first_value(&self) -> Option<&SqlValue> {
        self.cols.first().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cols.iter().map(|(n, _)| n.as_str())
    }
}

/// Factory for backend sessions.
pub trait Backend: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn BackendSession>>;
}

/// One logical connection to the store. Owned exclusively by the session
/// manager behind the engine lock; never shared.
pub trait BackendSession: Send {
    /// Identity of the underlying transport, captured at connect time.
    fn fingerprint(&self) -> u64;

    /// Whether the transport still matches the fingerprint. Host
    /// processes are known to close or reuse descriptors behind a
    /// long-lived plugin's back; a `false` here means the session must be
    /// re-established, not used.
    fn is_valid(&mut self) -> bool;

    /// Execute a query and buffer the full result set.
    fn execute(&mut self, sql: &str) -> Result<Vec<SqlRow>>;
}
