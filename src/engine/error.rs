use ulid::Ulid;

use crate::model::{fmt_hm, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or incomplete input.
    Validation(String),
    /// An active booking in the same room overlaps the requested span.
    Conflict {
        title: String,
        span: Span,
    },
    Unauthenticated,
    /// The room still has active bookings in the future.
    DeletionGuard(Ulid),
    NotFound(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Stable tag for clients and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Conflict { .. } => "conflict",
            EngineError::Unauthenticated => "unauthenticated",
            EngineError::DeletionGuard(_) => "deletion_guard",
            EngineError::NotFound(_) => "not_found",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "storage",
        }
    }

    /// Storage failures are the only errors that are not the caller's fault.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::WalError(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::Conflict { title, span } => write!(
                f,
                "time conflict with \"{title}\" ({}–{})",
                fmt_hm(span.start),
                fmt_hm(span.end)
            ),
            EngineError::Unauthenticated => write!(f, "not authenticated"),
            EngineError::DeletionGuard(id) => write!(
                f,
                "cannot delete room {id}: it has active future bookings; deactivate it instead"
            ),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
