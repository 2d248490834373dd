//! Unified error model for lookup operations.
//! Every public operation collapses into this small taxonomy; transport
//! detail never crosses the session boundary (it is logged there instead).
//! Callers are only expected to branch on `NotFound` and
//! `InsufficientBuffer` — everything else is terminal for that call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    /// Zero matching rows, or a privileged record requested without
    /// privilege (deliberately indistinguishable).
    #[error("no matching record")]
    NotFound,

    /// The caller-supplied buffer cannot hold the marshaled row. Nothing
    /// was written; retrying the identical call with a buffer of at least
    /// `needed` bytes succeeds.
    #[error("result buffer too small, {needed} bytes required")]
    InsufficientBuffer { needed: usize },

    /// The argument was rejected before reaching the backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation is administratively disabled, the backend cannot be
    /// reached, query execution failed, or an internal invariant was
    /// violated.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl LookupError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        LookupError::Unavailable(msg.into())
    }

    /// Host-facing status for this failure. `InvalidInput` is collapsed to
    /// `Unavailable` at that boundary, matching the convention of
    /// record-lookup plugin APIs.
    pub fn status(&self) -> Status {
        match self {
            LookupError::NotFound => Status::NotFound,
            LookupError::InsufficientBuffer { .. } => Status::TryAgain,
            LookupError::InvalidInput(_) => Status::Unavailable,
            LookupError::Unavailable(_) => Status::Unavailable,
        }
    }
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Four-valued result protocol exposed to the plugin-glue layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    NotFound,
    /// Retry the same call with a larger buffer.
    TryAgain,
    Unavailable,
}

/// Map a finished operation onto the glue-facing status protocol.
pub fn status_of<T>(res: &LookupResult<T>) -> Status {
    match res {
        Ok(_) => Status::Success,
        Err(e) => e.status(),
    }
}
