//! Operator smoke tool: resolve one record or walk a full enumeration
//! against the configured store, printing the marshaled result. Think
//! `getent` pointed at the SQL backend.
//!
//!     sqlident user alice
//!     sqlident user 1000
//!     sqlident group staff
//!     sqlident shadow alice
//!     sqlident groups-of alice
//!     sqlident enum user|shadow|group

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sqlident::backend::mysql::MySqlBackend;
use sqlident::config::Config;
use sqlident::engine::LookupContext;
use sqlident::error::{LookupError, LookupResult};
use sqlident::records::{GroupRecord, Record, ShadowRecord, UserRecord};

/// Starting buffer size; doubled (or grown to the hint) on TryAgain.
const INITIAL_BUF: usize = 1024;
const MAX_BUF: usize = 1 << 20;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run() {
        Ok(found) => {
            if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            eprintln!("sqlident: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_env().context("loading configuration")?;
    info!(
        target: "sqlident",
        host = %config.server.host,
        database = %config.server.database,
        "connecting"
    );
    // The operator invoking the tool is trusted with privileged kinds.
    let ctx = LookupContext::new(config, Arc::new(MySqlBackend)).with_privilege_probe(|| true);

    match args.as_slice() {
        [kind, key] if kind == "user" => lookup::<UserRecord>(&ctx, key, print_user),
        [kind, key] if kind == "shadow" => lookup::<ShadowRecord>(&ctx, key, print_shadow),
        [kind, key] if kind == "group" => lookup::<GroupRecord>(&ctx, key, print_group),
        [cmd, member] if cmd == "groups-of" => {
            let gids = ctx.group_ids_by_member(member)?;
            println!(
                "{}",
                gids.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
            );
            Ok(!gids.is_empty())
        }
        [cmd, kind] if cmd == "enum" => match kind.as_str() {
            "user" => enumerate::<UserRecord>(&ctx, print_user),
            "shadow" => enumerate::<ShadowRecord>(&ctx, print_shadow),
            "group" => enumerate::<GroupRecord>(&ctx, print_group),
            other => bail!("unknown record kind '{other}'"),
        },
        _ => bail!("usage: sqlident <user|shadow|group> <key> | groups-of <name> | enum <kind>"),
    }
}

fn lookup<R: Record>(
    ctx: &LookupContext,
    key: &str,
    print: fn(&R, &[u8]),
) -> Result<bool> {
    let mut rec = R::default();
    let mut buf = vec![0u8; INITIAL_BUF];
    let res = with_retry(&mut buf, |buf| {
        let numeric = key.parse::<u32>().ok();
        match numeric {
            Some(id) if R::BY_ID.is_some() => ctx.find_by_id(id, &mut rec, buf),
            _ => ctx.find_by_name(key, &mut rec, buf),
        }
    });
    match res {
        Ok(()) => {
            print(&rec, &buf);
            Ok(true)
        }
        Err(LookupError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn enumerate<R: Record>(ctx: &LookupContext, print: fn(&R, &[u8])) -> Result<bool> {
    ctx.enum_begin::<R>()?;
    let mut any = false;
    loop {
        let mut rec = R::default();
        let mut buf = vec![0u8; INITIAL_BUF];
        match with_retry(&mut buf, |buf| ctx.enum_next(&mut rec, buf)) {
            Ok(()) => {
                print(&rec, &buf);
                any = true;
            }
            Err(LookupError::NotFound) => break,
            Err(e) => {
                ctx.enum_end::<R>()?;
                return Err(e.into());
            }
        }
    }
    ctx.enum_end::<R>()?;
    Ok(any)
}

/// Run `op`, growing the buffer on `InsufficientBuffer` the way a hosting
/// process would.
fn with_retry(
    buf: &mut Vec<u8>,
    mut op: impl FnMut(&mut [u8]) -> LookupResult<()>,
) -> LookupResult<()> {
    loop {
        match op(buf) {
            Err(LookupError::InsufficientBuffer { needed }) if needed <= MAX_BUF => {
                buf.resize(needed.max(buf.len() * 2), 0);
            }
            other => return other,
        }
    }
}

fn print_user(u: &UserRecord, buf: &[u8]) {
    println!(
        "{}:{}:{}:{}:{}:{}:{}",
        u.name.resolve(buf),
        u.passwd.resolve(buf),
        u.uid,
        u.gid,
        u.gecos.resolve(buf),
        u.homedir.resolve(buf),
        u.shell.resolve(buf)
    );
}

fn print_shadow(s: &ShadowRecord, buf: &[u8]) {
    println!(
        "{}:{}:{}:{}:{}:{}:{}:{}:{}",
        s.name.resolve(buf),
        s.passwd.resolve(buf),
        s.last_change,
        s.min_days,
        s.max_days,
        s.warn_days,
        s.inactive_days,
        s.expires,
        s.flag
    );
}

fn print_group(g: &GroupRecord, buf: &[u8]) {
    println!(
        "{}:{}:{}:{}",
        g.name.resolve(buf),
        g.passwd.resolve(buf),
        g.gid,
        g.members.resolve(buf).join(",")
    );
}
