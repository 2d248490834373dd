//! Row marshaling into a caller-owned marshal target.
//! The target is a fixed record struct plus one byte buffer the caller
//! pre-sized; every variable-length string of a row lands NUL-terminated
//! and contiguous in that buffer, referenced from the struct by offset.
//! Sizing is all-or-nothing: the total requirement is computed up front
//! and a too-small buffer yields `InsufficientBuffer` with zero partial
//! writes to either the struct or the buffer.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::backend::{SqlRow, SqlValue};
use crate::error::{LookupError, LookupResult};

/// Reference to one string inside the caller's buffer. `len` excludes the
/// NUL terminator that follows the bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrRef {
    pub off: usize,
    pub len: usize,
}

impl StrRef {
    /// Borrow the referenced string out of the buffer it was marshaled
    /// into. Returns "" if the reference does not fit the buffer (which
    /// means the caller paired it with the wrong buffer).
    pub fn resolve<'b>(&self, buf: &'b [u8]) -> &'b str {
        buf.get(self.off..self.off + self.len)
            .and_then(|b| std::str::from_utf8(b).ok())
            .unwrap_or("")
    }
}

/// Reference to `count` consecutive NUL-terminated strings starting at
/// `off` — the group member list layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrListRef {
    pub off: usize,
    pub count: usize,
}

impl StrListRef {
    pub fn resolve<'b>(&self, buf: &'b [u8]) -> Vec<&'b str> {
        let mut out = Vec::with_capacity(self.count);
        let mut pos = self.off;
        for _ in 0..self.count {
            if pos >= buf.len() {
                break;
            }
            let end = buf[pos..]
                .iter()
                .position(|&b| b == 0)
                .map(|i| pos + i)
                .unwrap_or(buf.len());
            out.push(std::str::from_utf8(&buf[pos..end]).unwrap_or(""));
            pos = end + 1;
        }
        out
    }
}

/// Bump allocator over the caller's byte range. Offsets hand out
/// [`StrRef`]s; nothing is ever written past the declared capacity.
pub struct Arena<'a> {
    buf: &'a mut [u8],
    used: usize,
}

impl<'a> Arena<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Arena { buf, used: 0 }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }

    /// Write `s` NUL-terminated at the current position. Callers are
    /// expected to have passed the up-front sizing check; the bound here
    /// is enforced again regardless.
    pub fn push_str(&mut self, s: &str) -> LookupResult<StrRef> {
        let need = s.len() + 1;
        if need > self.remaining() {
            return Err(LookupError::InsufficientBuffer {
                needed: self.used + need,
            });
        }
        let off = self.used;
        self.buf[off..off + s.len()].copy_from_slice(s.as_bytes());
        self.buf[off + s.len()] = 0;
        self.used += need;
        Ok(StrRef { off, len: s.len() })
    }
}

/// One column-to-field binding. Bindings are declared per record type in
/// result-column order purely for readability; matching is by name.
pub struct FieldSpec<R> {
    pub column: &'static str,
    pub kind: FieldKind<R>,
}

pub enum FieldKind<R> {
    /// Variable-length string column; NULL marshals as "".
    Str(fn(&mut R, StrRef)),
    /// Fixed-width numeric column; NULL (or unparseable text) takes the
    /// declared default.
    Int { default: i64, set: fn(&mut R, i64) },
}

/// Bytes the string columns of `row` need in the buffer, terminators
/// included. Errors with `Unavailable` when a mapped column is missing
/// from the result set — the template and the field map have drifted.
pub fn required_bytes<R>(row: &SqlRow, fields: &[FieldSpec<R>]) -> LookupResult<usize> {
    let mut total = 0usize;
    for field in fields {
        let value = mapped_column(row, field.column)?;
        if let FieldKind::Str(_) = field.kind {
            total += str_value(value).len() + 1;
        }
    }
    Ok(total)
}

/// Bytes a marshaled string list needs.
pub fn str_list_required(items: &[String]) -> usize {
    items.iter().map(|s| s.len() + 1).sum()
}

/// Marshal one row: up-front sizing check, then strings into the arena
/// and scalars straight into a fresh record. On any error the arena is
/// untouched and no record is produced.
pub fn marshal_row<R: Default>(
    row: &SqlRow,
    fields: &[FieldSpec<R>],
    arena: &mut Arena<'_>,
) -> LookupResult<R> {
    let required = required_bytes(row, fields)?;
    if required > arena.remaining() {
        return Err(LookupError::InsufficientBuffer {
            needed: arena.used() + required,
        });
    }
    let mut rec = R::default();
    for field in fields {
        let value = mapped_column(row, field.column)?;
        match &field.kind {
            FieldKind::Str(set) => {
                let s = str_value(value);
                let r = arena.push_str(&s)?;
                set(&mut rec, r);
            }
            FieldKind::Int { default, set } => {
                set(&mut rec, int_value(value, *default, field.column));
            }
        }
    }
    Ok(rec)
}

/// Pack `items` as consecutive NUL-terminated strings with the same
/// all-or-nothing sizing rule.
pub fn marshal_str_list(items: &[String], arena: &mut Arena<'_>) -> LookupResult<StrListRef> {
    let required = str_list_required(items);
    if required > arena.remaining() {
        return Err(LookupError::InsufficientBuffer {
            needed: arena.used() + required,
        });
    }
    let off = arena.used();
    for item in items {
        arena.push_str(item)?;
    }
    Ok(StrListRef {
        off,
        count: items.len(),
    })
}

fn mapped_column<'r>(row: &'r SqlRow, column: &'static str) -> LookupResult<&'r SqlValue> {
    row.get(column).ok_or_else(|| {
        warn!(
            target: "sqlident",
            column,
            "mapped column missing from result set; query template and field map are out of sync"
        );
        LookupError::unavailable(format!("column '{column}' missing from result"))
    })
}

fn str_value(value: &SqlValue) -> Cow<'_, str> {
    match value {
        SqlValue::Null => Cow::Borrowed(""),
        SqlValue::Int(i) => Cow::Owned(i.to_string()),
        SqlValue::Text(s) => Cow::Borrowed(s.as_str()),
    }
}

fn int_value(value: &SqlValue, default: i64, column: &str) -> i64 {
    match value {
        SqlValue::Null => default,
        SqlValue::Int(i) => *i,
        SqlValue::Text(s) => s.trim().parse().unwrap_or_else(|_| {
            debug!(target: "sqlident", column, value = %s, "non-numeric column value, using default");
            default
        }),
    }
}

#[cfg(test)]
#[path = "marshal_tests.rs"]
mod marshal_tests;
