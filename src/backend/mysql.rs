//! MySQL transport over rust-mysql-simple.
//! The session fingerprint is the server connection id; validity is a
//! cheap `DO 0` round trip plus an id check, which catches descriptors
//! silently closed or reused by the host process. Results are buffered in
//! full (store-result semantics) and converted to named-column rows.

use anyhow::{Context, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Value};
use tracing::debug;

use super::{Backend, BackendSession, SqlRow, SqlValue};
use crate::config::ConnectParams;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlBackend;

impl Backend for MySqlBackend {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn BackendSession>> {
        let mut opts = OptsBuilder::new()
            .ip_or_hostname(Some(params.host.clone()))
            .tcp_port(params.port)
            .db_name(Some(params.database.clone()))
            .user(params.user.clone())
            .pass(params.password.clone());
        if params.socket.is_some() {
            opts = opts.socket(params.socket.clone());
        }
        let conn = Conn::new(opts).context("connecting to mysql")?;
        let id = conn.connection_id();
        debug!(target: "sqlident", connection_id = id, "mysql session established");
        Ok(Box::new(MySqlSession { conn, id }))
    }
}

struct MySqlSession {
    conn: Conn,
    id: u32,
}

impl BackendSession for MySqlSession {
    fn fingerprint(&self) -> u64 {
        self.id as u64
    }

    fn is_valid(&mut self) -> bool {
        self.conn.query_drop("DO 0").is_ok() && self.conn.connection_id() == self.id
    }

    fn execute(&mut self, sql: &str) -> Result<Vec<SqlRow>> {
        let rows: Vec<mysql::Row> = self.conn.query(sql).context("executing query")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let names: Vec<String> = row
                .columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();
            let mut converted = SqlRow::new();
            for (name, value) in names.into_iter().zip(row.unwrap()) {
                converted.push(name, convert(value));
            }
            out.push(converted);
        }
        Ok(out)
    }
}

fn convert(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => SqlValue::Int(u as i64),
        Value::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        Value::Float(f) => SqlValue::Text(f.to_string()),
        Value::Double(d) => SqlValue::Text(d.to_string()),
        // Temporal values do not occur in identity tables; keep their SQL
        // rendering if they ever do.
        other => SqlValue::Text(other.as_sql(true).trim_matches('\'').to_string()),
    }
}
