//! Process configuration: connection parameters, per-operation query
//! templates, log gating and the per-record-type privilege flags.
//! Loaded once (from a JSON file or built in code), consumed read-only by
//! every operation, never mutated by the core.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::diag;
use crate::query::QuerySet;
use crate::records::RecordKind;

/// Default config path, overridable through `SQLIDENT_CONF`.
pub const DEFAULT_CONF_PATH: &str = "/etc/sqlident.conf";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ConnectParams,
    pub queries: QuerySet,
    pub log: LogSettings,
    pub privileged: PrivilegedKinds,
}

impl Config {
    /// Load and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg)
    }

    /// Load from the path named by `SQLIDENT_CONF`, falling back to
    /// [`DEFAULT_CONF_PATH`].
    pub fn from_env() -> Result<Config> {
        let path =
            std::env::var("SQLIDENT_CONF").unwrap_or_else(|_| DEFAULT_CONF_PATH.to_string());
        Config::load(path)
    }
}

/// Connection parameters for the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    /// Unix socket path; takes precedence over host/port when set.
    pub socket: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl Default for ConnectParams {
    fn default() -> Self {
        ConnectParams {
            host: "localhost".into(),
            port: 3306,
            socket: None,
            user: None,
            password: None,
            database: "auth".into(),
        }
    }
}

/// Debug-log gating. Warnings and errors are always emitted; the debug
/// categories in `debug_mask` (see [`crate::diag`]) only fire when
/// `debug` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub debug: bool,
    pub debug_mask: u32,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            debug: false,
            debug_mask: diag::ALL,
        }
    }
}

/// Which record kinds require a privileged caller. A privileged kind
/// requested without privilege reads as `NotFound`, indistinguishable
/// from a real miss.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegedKinds {
    pub user: bool,
    pub shadow: bool,
    pub group: bool,
}

impl Default for PrivilegedKinds {
    fn default() -> Self {
        PrivilegedKinds {
            user: false,
            shadow: true,
            group: false,
        }
    }
}

impl PrivilegedKinds {
    pub fn requires(&self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::User => self.user,
            RecordKind::Shadow => self.shadow,
            RecordKind::Group => self.group,
        }
    }
}
