//! The lookup engine: orchestrates escaping, query building, the backend
//! session and row marshaling for the two request shapes — direct keyed
//! lookup and cursor-based enumeration.
//!
//! All shared mutable state (session handle, tracked cursor) lives behind
//! one process-wide `parking_lot::Mutex` held for the full duration of
//! every public operation; the guard's scope covers every early error
//! return. Blocking is limited to backend I/O and the lock wait itself —
//! there is deliberately no timeout layer, so a hung backend blocks the
//! holder and, transitively, other callers (documented limitation of a
//! synchronous lookup API).

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::backend::{Backend, SqlRow, SqlValue};
use crate::config::Config;
use crate::diag::{self, Diag};
use crate::error::{LookupError, LookupResult};
use crate::marshal::{self, Arena};
use crate::query::{self, QueryName};
use crate::records::Record;
use crate::session::{ResultCursor, SessionManager};

/// Process-scoped lookup context. Construct one per process (or per test)
/// and share it; every operation serializes on its internal lock.
pub struct LookupContext {
    config: Config,
    diag: Diag,
    privilege_probe: Box<dyn Fn() -> bool + Send + Sync>,
    shared: Mutex<Shared>,
}

struct Shared {
    sessions: SessionManager,
    cursor: ResultCursor,
}

impl LookupContext {
    /// Context with the default privilege probe, which denies. Privileged
    /// record kinds (shadow, by default) then always read as `NotFound`;
    /// the hosting glue installs a real probe via
    /// [`with_privilege_probe`](Self::with_privilege_probe).
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let diag = Diag::new(&config.log);
        let sessions = SessionManager::new(backend, config.server.clone(), diag);
        LookupContext {
            config,
            diag,
            privilege_probe: Box::new(|| false),
            shared: Mutex::new(Shared {
                sessions,
                cursor: ResultCursor::default(),
            }),
        }
    }

    /// Install the caller-identity probe consulted before privileged
    /// lookups (e.g. an effective-uid check in the hosting process).
    pub fn with_privilege_probe(
        mut self,
        probe: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.privilege_probe = Box::new(probe);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct lookup by name: zero or one row.
    pub fn find_by_name<R: Record>(
        &self,
        name: &str,
        rec: &mut R,
        buf: &mut [u8],
    ) -> LookupResult<()> {
        self.find(R::BY_NAME, name, rec, buf)
    }

    /// Direct lookup by numeric id, for record kinds that have one.
    pub fn find_by_id<R: Record>(&self, id: u32, rec: &mut R, buf: &mut [u8]) -> LookupResult<()> {
        let query_name = R::BY_ID.ok_or_else(|| {
            LookupError::unavailable(format!("{} records have no id lookup", R::KIND.as_str()))
        })?;
        self.find(query_name, &id.to_string(), rec, buf)
    }

    fn find<R: Record>(
        &self,
        query_name: QueryName,
        key: &str,
        rec: &mut R,
        buf: &mut [u8],
    ) -> LookupResult<()> {
        self.precheck::<R>()?;
        let mut shared = self.shared.lock();
        let sql = query::build(&self.config.queries, query_name, key)?;
        shared.sessions.ensure_session()?;
        // A keyed lookup owns the cursor for its whole extent; whatever an
        // enumeration left open is discarded.
        shared.cursor.reset();
        let rows = shared.sessions.run(&sql)?;
        shared.cursor.open(query_name, rows);

        let result = match shared.cursor.fetch_row()? {
            None => Err(LookupError::NotFound),
            Some(row) => {
                if shared.cursor.fetch_row()?.is_some() {
                    // More than one row for a unique key is a template
                    // authoring defect, not a failed lookup.
                    warn!(
                        target: "sqlident",
                        query = query_name.as_str(),
                        "key lookup returned more than one row; check the query template"
                    );
                }
                self.marshal_target::<R>(&mut shared, &row, rec, buf)
            }
        };
        shared.cursor.close();
        result
    }

    /// Begin (or restart) an enumeration. Idempotent; any open cursor is
    /// discarded.
    pub fn enum_begin<R: Record>(&self) -> LookupResult<()> {
        let mut shared = self.shared.lock();
        self.diag
            .debug(diag::ENUM, || format!("{} enumeration reset", R::KIND.as_str()));
        shared.cursor.reset();
        Ok(())
    }

    /// Next enumerated record. Opens this kind's select-all cursor when
    /// none is open (implicit begin) or when the open cursor belongs to a
    /// different query — foreign rows are never fed through this kind's
    /// field map. Exhaustion reads as `NotFound` and is sticky: the
    /// cursor stays open and empty until `enum_end`/`enum_begin`.
    pub fn enum_next<R: Record>(&self, rec: &mut R, buf: &mut [u8]) -> LookupResult<()> {
        self.precheck::<R>()?;
        let mut shared = self.shared.lock();
        shared.sessions.ensure_session()?;
        if shared.cursor.tag() != Some(R::ENUMERATE) {
            let sql = query::build_plain(&self.config.queries, R::ENUMERATE)?;
            let rows = shared.sessions.run(&sql)?;
            self.diag.debug(diag::ENUM, || {
                format!("{} enumeration opened, {} row(s)", R::KIND.as_str(), rows.len())
            });
            shared.cursor.open(R::ENUMERATE, rows);
        }
        match shared.cursor.fetch_row()? {
            None => Err(LookupError::NotFound),
            Some(row) => {
                let result = self.marshal_target::<R>(&mut shared, &row, rec, buf);
                if matches!(result, Err(LookupError::InsufficientBuffer { .. })) {
                    // The retry with a larger buffer must see this row
                    // again, not skip it.
                    shared.cursor.unfetch(row);
                }
                result
            }
        }
    }

    /// End an enumeration. Idempotent.
    pub fn enum_end<R: Record>(&self) -> LookupResult<()> {
        let mut shared = self.shared.lock();
        self.diag
            .debug(diag::ENUM, || format!("{} enumeration closed", R::KIND.as_str()));
        shared.cursor.close();
        Ok(())
    }

    /// All group ids whose member list contains `member_name`
    /// (initgroups-style). No marshal target involved.
    pub fn group_ids_by_member(&self, member_name: &str) -> LookupResult<Vec<u32>> {
        let mut shared = self.shared.lock();
        let sql = query::build(&self.config.queries, QueryName::GroupsByMember, member_name)?;
        shared.sessions.ensure_session()?;
        let rows = shared.sessions.run(&sql)?;
        let mut gids = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.first_value() {
                Some(SqlValue::Int(i)) if *i >= 0 => gids.push(*i as u32),
                Some(SqlValue::Text(s)) => {
                    if let Ok(gid) = s.trim().parse::<u32>() {
                        gids.push(gid);
                    }
                }
                _ => {}
            }
        }
        Ok(gids)
    }

    /// Explicit teardown: discard the cursor and drop the connection.
    pub fn disconnect(&self) {
        let mut shared = self.shared.lock();
        shared.cursor.close();
        shared.sessions.disconnect();
    }

    /// Privilege pre-check: a privileged kind requested without privilege
    /// reads as `NotFound`, deliberately indistinguishable from a miss so
    /// the existence of privileged records never leaks.
    fn precheck<R: Record>(&self) -> LookupResult<()> {
        if self.config.privileged.requires(R::KIND) && !(self.privilege_probe)() {
            return Err(LookupError::NotFound);
        }
        Ok(())
    }

    /// Marshal one fetched row (plus the auxiliary member list for kinds
    /// that declare one) into the caller's target, under a single
    /// all-or-nothing size check.
    fn marshal_target<R: Record>(
        &self,
        shared: &mut Shared,
        row: &SqlRow,
        rec: &mut R,
        buf: &mut [u8],
    ) -> LookupResult<()> {
        let members = self.load_members::<R>(shared, row)?;
        let required = marshal::required_bytes(row, R::FIELDS)? + marshal::str_list_required(&members);
        let mut arena = Arena::new(buf);
        if required > arena.remaining() {
            self.diag.debug(diag::MARSHAL, || {
                format!("buffer too small: need {required}, have {}", arena.remaining())
            });
            return Err(LookupError::InsufficientBuffer { needed: required });
        }
        let mut out = marshal::marshal_row::<R>(row, R::FIELDS, &mut arena)?;
        if R::MEMBER_QUERY.is_some() {
            out.set_members(marshal::marshal_str_list(&members, &mut arena)?);
        }
        *rec = out;
        Ok(())
    }

    /// Member names for a group row, through the auxiliary query keyed by
    /// the row's own key column. Runs one-shot against the session — the
    /// tracked cursor is client-buffered and unaffected. An unconfigured
    /// member template means member loading is disabled: empty list.
    fn load_members<R: Record>(
        &self,
        shared: &mut Shared,
        row: &SqlRow,
    ) -> LookupResult<Vec<String>> {
        let Some((query_name, key_column)) = R::MEMBER_QUERY else {
            return Ok(Vec::new());
        };
        if self.config.queries.get(query_name).is_none() {
            return Ok(Vec::new());
        }
        let key = match row.get(key_column) {
            Some(SqlValue::Int(i)) => i.to_string(),
            Some(SqlValue::Text(s)) => s.clone(),
            _ => return Ok(Vec::new()),
        };
        let sql = query::build(&self.config.queries, query_name, &key)?;
        let rows = shared.sessions.run(&sql)?;
        Ok(rows
            .iter()
            .filter_map(|r| match r.first_value() {
                Some(SqlValue::Text(s)) => Some(s.clone()),
                Some(SqlValue::Int(i)) => Some(i.to_string()),
                _ => None,
            })
            .collect())
    }
}
