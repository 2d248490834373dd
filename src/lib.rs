//! sqlident
//! -------
//! A lookup backend that resolves identity-database records (user, shadow
//! and group entries) from a relational store. Typed lookup requests are
//! turned into parameterized SQL through per-operation query templates,
//! executed over a serialized backend session, and the resulting rows are
//! marshaled into a caller-owned fixed struct plus byte buffer.
//!
//! The public surface centers on [`engine::LookupContext`], which owns the
//! configuration, the backend session and the enumeration cursor behind a
//! single process-wide lock. Storage transports plug in behind
//! [`backend::Backend`]; the `mysql-backend` feature provides the MySQL
//! implementation, and [`backend::memory`] provides a deterministic
//! in-memory transport for tests and benches.

pub mod backend;
pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod escape;
pub mod marshal;
pub mod query;
pub mod records;
pub mod session;

pub use engine::LookupContext;
pub use error::{LookupError, LookupResult, Status};
pub use records::{GroupRecord, ShadowRecord, UserRecord};
