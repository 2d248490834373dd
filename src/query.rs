//! Query templates and final query construction.
//! Each lookup operation is driven by a configured template string with a
//! single `%s` slot. Templates are optional: an absent or empty template
//! means the operation is administratively disabled and surfaces as
//! `Unavailable` (retrying with different input cannot help), while an
//! over-length raw key is an `InvalidInput` rejected before escaping and
//! long before the backend sees anything.

use serde::{Deserialize, Serialize};

use crate::error::{LookupError, LookupResult};
use crate::escape::escape_literal;

/// Hard cap on the raw key length accepted for keyed lookups. Identity
/// names and numeric ids are far shorter in practice; anything beyond this
/// is rejected as invalid input.
pub const MAX_KEY_LEN: usize = 128;

/// Names of the per-operation query templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryName {
    UserByName,
    UserByUid,
    ShadowByName,
    GroupByName,
    GroupByGid,
    AllUsers,
    AllShadow,
    AllGroups,
    MembersByGid,
    GroupsByMember,
}

impl QueryName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryName::UserByName => "user_by_name",
            QueryName::UserByUid => "user_by_uid",
            QueryName::ShadowByName => "shadow_by_name",
            QueryName::GroupByName => "group_by_name",
            QueryName::GroupByGid => "group_by_gid",
            QueryName::AllUsers => "all_users",
            QueryName::AllShadow => "all_shadow",
            QueryName::AllGroups => "all_groups",
            QueryName::MembersByGid => "members_by_gid",
            QueryName::GroupsByMember => "groups_by_member",
        }
    }
}

/// Per-operation query templates, as loaded from configuration. `None`
/// (or an all-whitespace string) disables the operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySet {
    pub user_by_name: Option<String>,
    pub user_by_uid: Option<String>,
    pub shadow_by_name: Option<String>,
    pub group_by_name: Option<String>,
    pub group_by_gid: Option<String>,
    pub all_users: Option<String>,
    pub all_shadow: Option<String>,
    pub all_groups: Option<String>,
    pub members_by_gid: Option<String>,
    pub groups_by_member: Option<String>,
}

impl QuerySet {
    /// Template for `name`, or `None` when the operation is disabled.
    pub fn get(&self, name: QueryName) -> Option<&str> {
        let slot = match name {
            QueryName::UserByName => &self.user_by_name,
            QueryName::UserByUid => &self.user_by_uid,
            QueryName::ShadowByName => &self.shadow_by_name,
            QueryName::GroupByName => &self.group_by_name,
            QueryName::GroupByGid => &self.group_by_gid,
            QueryName::AllUsers => &self.all_users,
            QueryName::AllShadow => &self.all_shadow,
            QueryName::AllGroups => &self.all_groups,
            QueryName::MembersByGid => &self.members_by_gid,
            QueryName::GroupsByMember => &self.groups_by_member,
        };
        match slot.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    /// A complete template set against the reference schema
    /// (`passwd`/`shadow`/`groups`/`grouplist` tables). Used by tests and
    /// benches, and handy as configuration documentation.
    pub fn sample() -> Self {
        QuerySet {
            user_by_name: Some(
                "SELECT name,passwd,uid,gid,gecos,homedir,shell FROM passwd WHERE name='%s'".into(),
            ),
            user_by_uid: Some(
                "SELECT name,passwd,uid,gid,gecos,homedir,shell FROM passwd WHERE uid='%s'".into(),
            ),
            shadow_by_name: Some(
                "SELECT name,passwd,lstchg,min,max,warn,inact,expire,flag FROM shadow WHERE name='%s'"
                    .into(),
            ),
            group_by_name: Some("SELECT name,passwd,gid FROM groups WHERE name='%s'".into()),
            group_by_gid: Some("SELECT name,passwd,gid FROM groups WHERE gid='%s'".into()),
            all_users: Some("SELECT name,passwd,uid,gid,gecos,homedir,shell FROM passwd".into()),
            all_shadow: Some(
                "SELECT name,passwd,lstchg,min,max,warn,inact,expire,flag FROM shadow".into(),
            ),
            all_groups: Some("SELECT name,passwd,gid FROM groups".into()),
            members_by_gid: Some("SELECT username FROM grouplist WHERE gid='%s'".into()),
            groups_by_member: Some("SELECT gid FROM grouplist WHERE username='%s'".into()),
        }
    }
}

/// Build the final keyed query: length-check the raw key, escape it, and
/// substitute it into the template's single `%s` slot.
pub fn build(queries: &QuerySet, name: QueryName, raw_key: &str) -> LookupResult<String> {
    if raw_key.len() > MAX_KEY_LEN {
        return Err(LookupError::InvalidInput(format!(
            "lookup key exceeds {} bytes",
            MAX_KEY_LEN
        )));
    }
    let template = queries.get(name).ok_or_else(|| {
        LookupError::unavailable(format!("query '{}' is not configured", name.as_str()))
    })?;
    let escaped = escape_literal(raw_key);
    match template.find("%s") {
        Some(pos) => {
            let mut q = String::with_capacity(template.len() + escaped.len());
            q.push_str(&template[..pos]);
            q.push_str(&escaped);
            q.push_str(&template[pos + 2..]);
            Ok(q)
        }
        None => Err(LookupError::unavailable(format!(
            "query '{}' has no %s slot for its argument",
            name.as_str()
        ))),
    }
}

/// Build a keyless query (enumeration templates carry no slot).
pub fn build_plain(queries: &QuerySet, name: QueryName) -> LookupResult<String> {
    queries
        .get(name)
        .map(str::to_string)
        .ok_or_else(|| {
            LookupError::unavailable(format!("query '{}' is not configured", name.as_str()))
        })
}
