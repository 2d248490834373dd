//! Shared fixtures: a seeded in-memory store wired to a context with the
//! sample query templates.
#![allow(dead_code)]

use std::sync::Arc;

use sqlident::backend::memory::MemoryBackend;
use sqlident::backend::{SqlRow, SqlValue};
use sqlident::config::Config;
use sqlident::engine::LookupContext;
use sqlident::query::QuerySet;

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.into())
}

pub fn user_row(
    name: &str,
    passwd: &str,
    uid: i64,
    gid: i64,
    gecos: &str,
    homedir: &str,
    shell: &str,
) -> SqlRow {
    let mut row = SqlRow::new();
    row.push("name", text(name));
    row.push("passwd", text(passwd));
    row.push("uid", SqlValue::Int(uid));
    row.push("gid", SqlValue::Int(gid));
    row.push("gecos", text(gecos));
    row.push("homedir", text(homedir));
    row.push("shell", text(shell));
    row
}

pub fn shadow_row(name: &str, passwd: &str, lstchg: SqlValue) -> SqlRow {
    let mut row = SqlRow::new();
    row.push("name", text(name));
    row.push("passwd", text(passwd));
    row.push("lstchg", lstchg);
    row.push("min", SqlValue::Int(0));
    row.push("max", SqlValue::Int(99999));
    row.push("warn", SqlValue::Int(7));
    row.push("inact", SqlValue::Null);
    row.push("expire", SqlValue::Null);
    row.push("flag", SqlValue::Null);
    row
}

pub fn group_row(name: &str, gid: i64) -> SqlRow {
    let mut row = SqlRow::new();
    row.push("name", text(name));
    row.push("passwd", text("x"));
    row.push("gid", SqlValue::Int(gid));
    row
}

pub fn membership(gid: i64, username: &str) -> SqlRow {
    let mut row = SqlRow::new();
    row.push("gid", SqlValue::Int(gid));
    row.push("username", text(username));
    row
}

/// Three users, two groups (staff has two members), shadow entries for
/// alice and bob.
pub fn seeded_backend() -> MemoryBackend {
    let be = MemoryBackend::new();
    be.insert(
        "passwd",
        user_row("alice", "x", 1000, 100, "Alice A.", "/home/alice", "/bin/sh"),
    );
    be.insert(
        "passwd",
        user_row("bob", "x", 1001, 100, "Bob B.", "/home/bob", "/bin/bash"),
    );
    be.insert(
        "passwd",
        user_row("carol", "x", 1002, 101, "Carol C.", "/home/carol", "/bin/zsh"),
    );
    be.insert("shadow", shadow_row("alice", "$6$salt$hash", SqlValue::Int(19000)));
    be.insert("shadow", shadow_row("bob", "$6$salt$hash2", SqlValue::Null));
    be.insert("groups", group_row("staff", 100));
    be.insert("groups", group_row("wheel", 101));
    be.insert("grouplist", membership(100, "alice"));
    be.insert("grouplist", membership(100, "bob"));
    be.insert("grouplist", membership(101, "carol"));
    be
}

pub fn sample_config() -> Config {
    Config {
        queries: QuerySet::sample(),
        ..Config::default()
    }
}

pub fn ctx(backend: &MemoryBackend) -> LookupContext {
    LookupContext::new(sample_config(), Arc::new(backend.clone()))
}

pub fn privileged_ctx(backend: &MemoryBackend) -> LookupContext {
    ctx(backend).with_privilege_probe(|| true)
}
