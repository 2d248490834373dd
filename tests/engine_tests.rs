//! End-to-end engine behavior over the in-memory backend: direct lookups,
//! buffer sizing, enumeration lifecycle, privilege masking and the
//! stale-session reconnect.

mod common;

use common::*;
use sqlident::config::Config;
use sqlident::engine::LookupContext;
use sqlident::error::{status_of, LookupError, Status};
use sqlident::query::QuerySet;
use sqlident::records::{GroupRecord, ShadowRecord, UserRecord};
use std::sync::Arc;

#[test]
fn find_by_name_returns_the_stored_row() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.find_by_name("bob", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.name.resolve(&buf), "bob");
    assert_eq!(rec.passwd.resolve(&buf), "x");
    assert_eq!(rec.uid, 1001);
    assert_eq!(rec.gid, 100);
    assert_eq!(rec.gecos.resolve(&buf), "Bob B.");
    assert_eq!(rec.homedir.resolve(&buf), "/home/bob");
    assert_eq!(rec.shell.resolve(&buf), "/bin/bash");
}

#[test]
fn find_by_id_matches_numeric_columns() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.find_by_id(1002, &mut rec, &mut buf).unwrap();
    assert_eq!(rec.name.resolve(&buf), "carol");
}

#[test]
fn absent_key_is_not_found() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    let res = ctx.find_by_name("mallory", &mut rec, &mut buf);
    assert!(matches!(res, Err(LookupError::NotFound)));
    assert_eq!(status_of(&res), Status::NotFound);
}

#[test]
fn small_buffer_fails_atomically_and_the_hint_is_exact() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let before = rec.clone();
    let mut buf = vec![0xEEu8; 8];
    let err = ctx.find_by_name("alice", &mut rec, &mut buf).unwrap_err();
    let LookupError::InsufficientBuffer { needed } = err else {
        panic!("expected InsufficientBuffer, got {err:?}");
    };
    // No partial writes to either half of the marshal target.
    assert_eq!(rec, before);
    assert_eq!(buf, vec![0xEE; 8]);

    // Retrying the identical call with the hinted size succeeds.
    let mut buf = vec![0u8; needed];
    ctx.find_by_name("alice", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.name.resolve(&buf), "alice");
}

#[test]
fn shadow_lookup_requires_privilege_and_denial_reads_as_not_found() {
    let be = seeded_backend();
    let mut rec = ShadowRecord::default();
    let mut buf = vec![0u8; 512];

    // Default probe denies: stored row is masked as NotFound.
    let unpriv = ctx(&be);
    assert!(matches!(
        unpriv.find_by_name("alice", &mut rec, &mut buf),
        Err(LookupError::NotFound)
    ));

    let priv_ctx = privileged_ctx(&be);
    priv_ctx.find_by_name("alice", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.passwd.resolve(&buf), "$6$salt$hash");
    assert_eq!(rec.last_change, 19000);
    assert_eq!(rec.min_days, 0);
    // NULL aging columns take the documented -1 default, flag takes 0.
    ctx_shadow_nulls(&priv_ctx, &mut buf);
}

fn ctx_shadow_nulls(ctx: &LookupContext, buf: &mut [u8]) {
    let mut rec = ShadowRecord::default();
    ctx.find_by_name("bob", &mut rec, buf).unwrap();
    assert_eq!(rec.last_change, -1);
    assert_eq!(rec.inactive_days, -1);
    assert_eq!(rec.expires, -1);
    assert_eq!(rec.flag, 0);
}

#[test]
fn group_lookup_loads_the_member_list() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = GroupRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.find_by_name("staff", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.gid, 100);
    assert_eq!(rec.members.resolve(&buf), vec!["alice", "bob"]);

    ctx.find_by_id(101, &mut rec, &mut buf).unwrap();
    assert_eq!(rec.name.resolve(&buf), "wheel");
    assert_eq!(rec.members.resolve(&buf), vec!["carol"]);
}

#[test]
fn member_list_counts_toward_the_single_size_check() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = GroupRecord::default();
    // Base row fits but members do not.
    let mut buf = vec![0xABu8; 14];
    let err = ctx.find_by_name("staff", &mut rec, &mut buf).unwrap_err();
    let LookupError::InsufficientBuffer { needed } = err else {
        panic!("expected InsufficientBuffer, got {err:?}");
    };
    assert_eq!(buf, vec![0xAB; 14]);
    let mut buf = vec![0u8; needed];
    ctx.find_by_name("staff", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.members.resolve(&buf).len(), 2);
}

#[test]
fn unconfigured_member_template_yields_an_empty_list() {
    let be = seeded_backend();
    let mut queries = QuerySet::sample();
    queries.members_by_gid = None;
    let ctx = LookupContext::new(
        Config {
            queries,
            ..Config::default()
        },
        Arc::new(be.clone()),
    );
    let mut rec = GroupRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.find_by_name("staff", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.members.resolve(&buf), Vec::<&str>::new());
}

#[test]
fn disabled_template_is_unavailable() {
    let be = seeded_backend();
    let mut queries = QuerySet::sample();
    queries.user_by_name = None;
    let ctx = LookupContext::new(
        Config {
            queries,
            ..Config::default()
        },
        Arc::new(be.clone()),
    );
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    assert!(matches!(
        ctx.find_by_name("alice", &mut rec, &mut buf),
        Err(LookupError::Unavailable(_))
    ));
}

#[test]
fn over_length_key_is_invalid_input() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    let key = "k".repeat(sqlident::query::MAX_KEY_LEN + 1);
    let res = ctx.find_by_name(&key, &mut rec, &mut buf);
    assert!(matches!(res, Err(LookupError::InvalidInput(_))));
    assert_eq!(status_of(&res), Status::Unavailable);
}

#[test]
fn shadow_has_no_id_lookup() {
    let be = seeded_backend();
    let ctx = privileged_ctx(&be);
    let mut rec = ShadowRecord::default();
    let mut buf = vec![0u8; 512];
    assert!(matches!(
        ctx.find_by_id(1000, &mut rec, &mut buf),
        Err(LookupError::Unavailable(_))
    ));
}

#[test]
fn enumeration_is_exhaustive_and_non_repeating() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    ctx.enum_begin::<UserRecord>().unwrap();
    let mut seen = Vec::new();
    loop {
        let mut rec = UserRecord::default();
        let mut buf = vec![0u8; 512];
        match ctx.enum_next(&mut rec, &mut buf) {
            Ok(()) => seen.push(rec.name.resolve(&buf).to_string()),
            Err(LookupError::NotFound) => break,
            Err(e) => panic!("unexpected: {e:?}"),
        }
    }
    seen.sort();
    assert_eq!(seen, ["alice", "bob", "carol"]);

    // Exhaustion is sticky until the next begin.
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    assert!(matches!(
        ctx.enum_next(&mut rec, &mut buf),
        Err(LookupError::NotFound)
    ));
    ctx.enum_end::<UserRecord>().unwrap();
    ctx.enum_end::<UserRecord>().unwrap(); // idempotent

    // A fresh begin replays the full set.
    ctx.enum_begin::<UserRecord>().unwrap();
    let mut count = 0;
    while ctx.enum_next(&mut rec, &mut buf).is_ok() {
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn enumerating_an_empty_store_returns_not_found_immediately() {
    let be = sqlident::backend::memory::MemoryBackend::new();
    be.create_table("passwd");
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 256];
    ctx.enum_begin::<UserRecord>().unwrap();
    assert!(matches!(
        ctx.enum_next(&mut rec, &mut buf),
        Err(LookupError::NotFound)
    ));
    // And stays NotFound.
    assert!(matches!(
        ctx.enum_next(&mut rec, &mut buf),
        Err(LookupError::NotFound)
    ));
    ctx.enum_end::<UserRecord>().unwrap();
}

#[test]
fn enum_next_without_begin_opens_implicitly() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    // No begin: first next auto-opens, and the behavior is consistent
    // across repeated calls.
    ctx.enum_next(&mut rec, &mut buf).unwrap();
    ctx.enum_next(&mut rec, &mut buf).unwrap();
    ctx.enum_next(&mut rec, &mut buf).unwrap();
    assert!(matches!(
        ctx.enum_next(&mut rec, &mut buf),
        Err(LookupError::NotFound)
    ));
}

#[test]
fn enum_retry_after_small_buffer_does_not_skip_rows() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    ctx.enum_begin::<UserRecord>().unwrap();
    let mut rec = UserRecord::default();
    let mut tiny = vec![0u8; 4];
    let err = ctx.enum_next(&mut rec, &mut tiny).unwrap_err();
    let LookupError::InsufficientBuffer { needed } = err else {
        panic!("expected InsufficientBuffer, got {err:?}");
    };
    let mut buf = vec![0u8; needed];
    let mut names = Vec::new();
    ctx.enum_next(&mut rec, &mut buf).unwrap();
    names.push(rec.name.resolve(&buf).to_string());
    let mut buf2 = vec![0u8; 512];
    while ctx.enum_next(&mut rec, &mut buf2).is_ok() {
        names.push(rec.name.resolve(&buf2).to_string());
    }
    names.sort();
    // The row that hit the small buffer is replayed, not lost.
    assert_eq!(names, ["alice", "bob", "carol"]);
}

#[test]
fn a_direct_lookup_discards_an_open_enumeration() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.enum_begin::<UserRecord>().unwrap();
    ctx.enum_next(&mut rec, &mut buf).unwrap();

    ctx.find_by_name("carol", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.name.resolve(&buf), "carol");

    // The enumeration cursor was reset; the next call starts over.
    let mut names = Vec::new();
    while ctx.enum_next(&mut rec, &mut buf).is_ok() {
        names.push(rec.name.resolve(&buf).to_string());
    }
    assert_eq!(names.len(), 3);
}

#[test]
fn switching_enumeration_kind_reopens_the_right_query() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut ubuf = vec![0u8; 512];
    let mut gbuf = vec![0u8; 512];
    let mut urec = UserRecord::default();
    let mut grec = GroupRecord::default();

    ctx.enum_begin::<UserRecord>().unwrap();
    ctx.enum_next(&mut urec, &mut ubuf).unwrap();

    // A group enumeration never consumes the user cursor's rows.
    ctx.enum_begin::<GroupRecord>().unwrap();
    let mut groups = Vec::new();
    while ctx.enum_next(&mut grec, &mut gbuf).is_ok() {
        groups.push(grec.name.resolve(&gbuf).to_string());
    }
    groups.sort();
    assert_eq!(groups, ["staff", "wheel"]);
    ctx.enum_end::<GroupRecord>().unwrap();
}

#[test]
fn group_ids_by_member_collects_all_memberships() {
    let be = seeded_backend();
    be.insert("grouplist", membership(101, "alice"));
    let ctx = ctx(&be);
    let mut gids = ctx.group_ids_by_member("alice").unwrap();
    gids.sort();
    assert_eq!(gids, [100, 101]);
    assert!(ctx.group_ids_by_member("nobody").unwrap().is_empty());
}

#[test]
fn stale_sessions_reconnect_transparently() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.find_by_name("alice", &mut rec, &mut buf).unwrap();
    assert_eq!(be.connect_count(), 1);

    // Someone closed our descriptor behind our back.
    be.kill_sessions();
    ctx.find_by_name("bob", &mut rec, &mut buf).unwrap();
    assert_eq!(rec.name.resolve(&buf), "bob");
    assert_eq!(be.connect_count(), 2);
}

#[test]
fn disconnect_tears_down_and_the_next_call_reconnects() {
    let be = seeded_backend();
    let ctx = ctx(&be);
    let mut rec = UserRecord::default();
    let mut buf = vec![0u8; 512];
    ctx.find_by_name("alice", &mut rec, &mut buf).unwrap();
    ctx.disconnect();
    ctx.find_by_name("bob", &mut rec, &mut buf).unwrap();
    assert_eq!(be.connect_count(), 2);
}
