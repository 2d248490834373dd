//! Record types and their declarative field maps.
//! One [`Record`] implementation per identity entity; the lookup engine is
//! generic over the trait, so the orchestration logic exists exactly once.
//! String fields hold [`StrRef`] offsets into the marshal buffer the
//! record was populated against.

use crate::marshal::{FieldKind, FieldSpec, StrListRef, StrRef};
use crate::query::QueryName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Shadow,
    Group,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Shadow => "shadow",
            RecordKind::Group => "group",
        }
    }
}

/// A marshalable identity record, described by a static field map and the
/// query names that serve it.
pub trait Record: Default + Send + 'static {
    const KIND: RecordKind;
    const FIELDS: &'static [FieldSpec<Self>];
    /// Keyed lookup by name.
    const BY_NAME: QueryName;
    /// Keyed lookup by numeric id, where the entity has one.
    const BY_ID: Option<QueryName>;
    /// Select-all template used by enumeration.
    const ENUMERATE: QueryName;
    /// Auxiliary member-list query and the result column whose value keys
    /// it (groups only).
    const MEMBER_QUERY: Option<(QueryName, &'static str)> = None;

    fn set_members(&mut self, _members: StrListRef) {}
}

/// A passwd-style user entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    pub name: StrRef,
    pub passwd: StrRef,
    pub uid: u32,
    pub gid: u32,
    pub gecos: StrRef,
    pub homedir: StrRef,
    pub shell: StrRef,
}

impl Record for UserRecord {
    const KIND: RecordKind = RecordKind::User;
    const BY_NAME: QueryName = QueryName::UserByName;
    const BY_ID: Option<QueryName> = Some(QueryName::UserByUid);
    const ENUMERATE: QueryName = QueryName::AllUsers;
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec { column: "name", kind: FieldKind::Str(|r, v| r.name = v) },
        FieldSpec { column: "passwd", kind: FieldKind::Str(|r, v| r.passwd = v) },
        FieldSpec { column: "uid", kind: FieldKind::Int { default: 0, set: |r, v| r.uid = v as u32 } },
        FieldSpec { column: "gid", kind: FieldKind::Int { default: 0, set: |r, v| r.gid = v as u32 } },
        FieldSpec { column: "gecos", kind: FieldKind::Str(|r, v| r.gecos = v) },
        FieldSpec { column: "homedir", kind: FieldKind::Str(|r, v| r.homedir = v) },
        FieldSpec { column: "shell", kind: FieldKind::Str(|r, v| r.shell = v) },
    ];
}

/// A shadow credential entry. The aging fields default to -1 on NULL
/// ("not set" in shadow semantics); `flag` defaults to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowRecord {
    pub name: StrRef,
    pub passwd: StrRef,
    pub last_change: i64,
    pub min_days: i64,
    pub max_days: i64,
    pub warn_days: i64,
    pub inactive_days: i64,
    pub expires: i64,
    pub flag: i64,
}

impl Record for ShadowRecord {
    const KIND: RecordKind = RecordKind::Shadow;
    const BY_NAME: QueryName = QueryName::ShadowByName;
    const BY_ID: Option<QueryName> = None;
    const ENUMERATE: QueryName = QueryName::AllShadow;
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec { column: "name", kind: FieldKind::Str(|r, v| r.name = v) },
        FieldSpec { column: "passwd", kind: FieldKind::Str(|r, v| r.passwd = v) },
        FieldSpec { column: "lstchg", kind: FieldKind::Int { default: -1, set: |r, v| r.last_change = v } },
        FieldSpec { column: "min", kind: FieldKind::Int { default: -1, set: |r, v| r.min_days = v } },
        FieldSpec { column: "max", kind: FieldKind::Int { default: -1, set: |r, v| r.max_days = v } },
        FieldSpec { column: "warn", kind: FieldKind::Int { default: -1, set: |r, v| r.warn_days = v } },
        FieldSpec { column: "inact", kind: FieldKind::Int { default: -1, set: |r, v| r.inactive_days = v } },
        FieldSpec { column: "expire", kind: FieldKind::Int { default: -1, set: |r, v| r.expires = v } },
        FieldSpec { column: "flag", kind: FieldKind::Int { default: 0, set: |r, v| r.flag = v } },
    ];
}

/// A group entry. The member list is loaded through the auxiliary
/// `members_by_gid` query and packed into the same buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupRecord {
    pub name: StrRef,
    pub passwd: StrRef,
    pub gid: u32,
    pub members: StrListRef,
}

impl Record for GroupRecord {
    const KIND: RecordKind = RecordKind::Group;
    const BY_NAME: QueryName = QueryName::GroupByName;
    const BY_ID: Option<QueryName> = Some(QueryName::GroupByGid);
    const ENUMERATE: QueryName = QueryName::AllGroups;
    const MEMBER_QUERY: Option<(QueryName, &'static str)> = Some((QueryName::MembersByGid, "gid"));
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec { column: "name", kind: FieldKind::Str(|r, v| r.name = v) },
        FieldSpec { column: "passwd", kind: FieldKind::Str(|r, v| r.passwd = v) },
        FieldSpec { column: "gid", kind: FieldKind::Int { default: 0, set: |r, v| r.gid = v as u32 } },
    ];

    fn set_members(&mut self, members: StrListRef) {
        self.members = members;
    }
}
