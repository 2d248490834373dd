//! Deterministic in-memory backend for tests and benches.
//! Executes the same query strings the engine builds for the real store:
//! a regex matcher accepts `SELECT cols FROM table [WHERE col='literal']`,
//! un-escapes the quoted literal and filters rows by *literal* column
//! equality. Escaping bugs therefore show up as wrong-row matches here,
//! exactly as they would against MySQL.
//!
//! Sessions carry a generation fingerprint; [`MemoryBackend::kill_sessions`]
//! bumps the generation so every live session reads as stale, which is how
//! the reconnect path is exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

use super::{Backend, BackendSession, SqlRow, SqlValue};
use crate::config::ConnectParams;
use crate::escape::unescape_literal;

static SELECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*select\s+(?P<cols>.+?)\s+from\s+(?P<table>\w+)(?:\s+where\s+(?P<col>\w+)\s*=\s*'(?P<lit>(?:[^'\\]|\\.)*)')?\s*;?\s*$",
    )
    .expect("select matcher")
});

#[derive(Default)]
struct Shared {
    tables: RwLock<HashMap<String, Vec<SqlRow>>>,
    generation: AtomicU64,
    next_session: AtomicU64,
    connects: AtomicU64,
}

/// Shared handle; clones refer to the same store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Create an empty table if it does not exist yet.
    pub fn create_table(&self, table: &str) {
        self.shared
            .tables
            .write()
            .entry(table.to_string())
            .or_default();
    }

    /// Append a row to `table`, creating the table on first use.
    pub fn insert(&self, table: &str, row: SqlRow) {
        self.shared
            .tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Invalidate every live session. The next validity check on any of
    /// them fails and forces a reconnect.
    pub fn kill_sessions(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of successful connects so far; lets tests assert that a
    /// reconnect actually happened (or did not).
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::SeqCst)
    }
}

impl Backend for MemoryBackend {
    fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn BackendSession>> {
        let id = self.shared.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            generation: self.shared.generation.load(Ordering::SeqCst),
            id,
        }))
    }
}

struct MemorySession {
    shared: Arc<Shared>,
    generation: u64,
    id: u64,
}

impl BackendSession for MemorySession {
    fn fingerprint(&self) -> u64 {
        self.id
    }

    fn is_valid(&mut self) -> bool {
        self.generation == self.shared.generation.load(Ordering::SeqCst)
    }

    fn execute(&mut self, sql: &str) -> Result<Vec<SqlRow>> {
        if !self.is_valid() {
            bail!("connection reset by peer");
        }
        let caps = match SELECT_RE.captures(sql) {
            Some(c) => c,
            None => bail!("unsupported query: {sql}"),
        };
        let table_name = caps.name("table").map(|m| m.as_str()).unwrap_or_default();
        let tables = self.shared.tables.read();
        let rows = match tables.get(table_name) {
            Some(rows) => rows,
            None => bail!("unknown table '{table_name}'"),
        };

        let filter = match (caps.name("col"), caps.name("lit")) {
            (Some(col), Some(lit)) => Some((col.as_str(), unescape_literal(lit.as_str()))),
            _ => None,
        };
        let cols_spec = caps.name("cols").map(|m| m.as_str()).unwrap_or("*").trim();

        let mut out = Vec::new();
        for row in rows {
            if let Some((col, ref literal)) = filter {
                match row.get(col) {
                    None => bail!("unknown column '{col}' in table '{table_name}'"),
                    Some(v) => {
                        if !literal_eq(v, literal) {
                            continue;
                        }
                    }
                }
            }
            out.push(project(row, cols_spec, table_name)?);
        }
        Ok(out)
    }
}

/// Literal equality the way the text protocol sees it: numeric columns
/// compare through their decimal rendering, NULL matches nothing.
fn literal_eq(value: &SqlValue, literal: &str) -> bool {
    match value {
        SqlValue::Null => false,
        SqlValue::Int(i) => i.to_string() == literal,
        SqlValue::Text(s) => s == literal,
    }
}

fn project(row: &SqlRow, cols_spec: &str, table: &str) -> Result<SqlRow> {
    if cols_spec == "*" {
        return Ok(row.clone());
    }
    let mut out = SqlRow::new();
    for col in cols_spec.split(',') {
        let col = col.trim();
        match row.get(col) {
            Some(v) => out.push(col, v.clone()),
            None => bail!("unknown column '{col}' in table '{table}'"),
        }
    }
    Ok(out)
}
