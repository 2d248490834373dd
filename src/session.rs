//! Backend session ownership and the tracked result cursor.
//! The session manager holds at most one live connection, validates it
//! before reuse (host processes close and reuse descriptors behind a
//! plugin's back, so liveness is checked against the fingerprint captured
//! at connect) and re-establishes it transparently — once per call, never
//! in a loop. All transport errors are logged here and collapse to
//! `Unavailable`; nothing transport-specific escapes upward.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::warn;

use crate::backend::{Backend, BackendSession, SqlRow};
use crate::config::ConnectParams;
use crate::diag::{self, Diag};
use crate::error::{LookupError, LookupResult};
use crate::query::QueryName;

pub struct SessionManager {
    backend: Arc<dyn Backend>,
    params: ConnectParams,
    diag: Diag,
    session: Option<Box<dyn BackendSession>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>, params: ConnectParams, diag: Diag) -> Self {
        SessionManager {
            backend,
            params,
            diag,
            session: None,
        }
    }

    /// Make sure a live session exists: reuse the current one if it still
    /// validates, otherwise drop it and connect fresh (the single
    /// transparent reconnect this layer ever performs per call).
    pub fn ensure_session(&mut self) -> LookupResult<()> {
        if let Some(session) = self.session.as_mut() {
            if session.is_valid() {
                return Ok(());
            }
            warn!(
                target: "sqlident",
                fingerprint = session.fingerprint(),
                "backend session went stale, reconnecting"
            );
            self.session = None;
        }
        match self.backend.connect(&self.params) {
            Ok(session) => {
                self.diag.debug(diag::CONNECT, || {
                    format!("session established, fingerprint {}", session.fingerprint())
                });
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(target: "sqlident", error = %e, "backend connect failed");
                Err(LookupError::unavailable("cannot establish backend session"))
            }
        }
    }

    /// Execute a built query on the live session and buffer its rows.
    pub fn run(&mut self, sql: &str) -> LookupResult<Vec<SqlRow>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| LookupError::unavailable("no live backend session"))?;
        self.diag.debug(diag::QUERY, || format!("running: {sql}"));
        match session.execute(sql) {
            Ok(rows) => {
                self.diag
                    .debug(diag::QUERY, || format!("query returned {} row(s)", rows.len()));
                Ok(rows)
            }
            Err(e) => {
                warn!(target: "sqlident", error = %e, "query execution failed");
                Err(LookupError::unavailable("query execution failed"))
            }
        }
    }

    /// Drop the connection, if any. Explicit teardown; the next
    /// `ensure_session` starts from scratch.
    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            self.diag.debug(diag::CONNECT, || "session closed".to_string());
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }
}

/// The one tracked result set. `Closed -> Open -> Closed`; opening
/// implicitly discards whatever was open before, and close/reset on a
/// closed cursor are no-ops. Fetching from a closed cursor is an
/// orchestration bug and reads as `Unavailable`.
#[derive(Default)]
pub struct ResultCursor {
    open: Option<OpenCursor>,
}

struct OpenCursor {
    tag: QueryName,
    rows: VecDeque<SqlRow>,
}

impl ResultCursor {
    /// Open over a buffered row set, tagged with the query that produced
    /// it. Any previously open result is discarded first.
    pub fn open(&mut self, tag: QueryName, rows: Vec<SqlRow>) {
        self.open = Some(OpenCursor {
            tag,
            rows: rows.into(),
        });
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// The query that opened the cursor, while open.
    pub fn tag(&self) -> Option<QueryName> {
        self.open.as_ref().map(|c| c.tag)
    }

    /// Next row, or `None` at end of results. End of results does not
    /// close the cursor; exhausted stays open (and keeps yielding `None`)
    /// until reset.
    pub fn fetch_row(&mut self) -> LookupResult<Option<SqlRow>> {
        match self.open.as_mut() {
            Some(cursor) => Ok(cursor.rows.pop_front()),
            None => Err(LookupError::unavailable("fetch on a closed result cursor")),
        }
    }

    /// Put a fetched row back at the front, so a retry of the same call
    /// (larger buffer) sees the same row again. No-op when closed.
    pub fn unfetch(&mut self, row: SqlRow) {
        if let Some(cursor) = self.open.as_mut() {
            cursor.rows.push_front(row);
        }
    }

    pub fn reset(&mut self) {
        self.open = None;
    }

    pub fn close(&mut self) {
        self.reset();
    }
}
