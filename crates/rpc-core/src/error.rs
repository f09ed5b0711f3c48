//! Error taxonomy shared by every RPC backend and by dispatched handlers.
//!
//! `RpcError` is the single error type handlers and transports return.
//! `ErrorEnvelope` is its wire-shaped cousin: the thing that actually
//! crosses the network inside a reply `Value`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named failure kinds surfaced to RPC callers.
///
/// Kept as a flat enum rather than nested error types so it round-trips
/// through both wire encoders (bincode, YAML) without any special-casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Timeout,
    NotFound,
    ManyFound,
    InvalidArgument,
    ExecError,
    DbDuplicateEntry,
    DbDeadlock,
    DbInvalidUnicodeParameter,
    DbError,
    DbConnectionError,
    Generic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ManyFound => "ManyFound",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::ExecError => "ExecError",
            ErrorKind::DbDuplicateEntry => "DbDuplicateEntry",
            ErrorKind::DbDeadlock => "DbDeadlock",
            ErrorKind::DbInvalidUnicodeParameter => "DbInvalidUnicodeParameter",
            ErrorKind::DbError => "DbError",
            ErrorKind::DbConnectionError => "DbConnectionError",
            ErrorKind::Generic => "Generic",
        };
        f.write_str(s)
    }
}

/// The wire representation of an exception: what actually travels inside
/// a reply `Value::Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<i64>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// The error type used across `rpc-core` and its backend crates.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("call timed out")]
    Timeout,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous lookup: {0}")]
    ManyFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("execution error (return code {return_code}): {stderr}")]
    ExecError {
        return_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("duplicate entry: {0}")]
    DbDuplicateEntry(String),

    #[error("deadlock: {0}")]
    DbDeadlock(String),

    #[error("invalid unicode parameter: {0}")]
    DbInvalidUnicodeParameter(String),

    #[error("database error: {0}")]
    DbError(String),

    #[error("database connection error: {0}")]
    DbConnectionError(String),

    #[error("{0}")]
    Generic(String),

    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Timeout => ErrorKind::Timeout,
            RpcError::NotFound(_) => ErrorKind::NotFound,
            RpcError::ManyFound(_) => ErrorKind::ManyFound,
            RpcError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RpcError::ExecError { .. } => ErrorKind::ExecError,
            RpcError::DbDuplicateEntry(_) => ErrorKind::DbDuplicateEntry,
            RpcError::DbDeadlock(_) => ErrorKind::DbDeadlock,
            RpcError::DbInvalidUnicodeParameter(_) => ErrorKind::DbInvalidUnicodeParameter,
            RpcError::DbError(_) => ErrorKind::DbError,
            RpcError::DbConnectionError(_) => ErrorKind::DbConnectionError,
            RpcError::Generic(_) | RpcError::Transport(_) => ErrorKind::Generic,
        }
    }

    /// The payload string carried by this variant, with no kind prefix.
    /// `to_envelope` uses this instead of `Display` so the message that
    /// crosses the wire is exactly what the caller supplied, not
    /// `Display`'s `"not found: {0}"`-style rendering.
    fn raw_message(&self) -> String {
        match self {
            RpcError::Timeout => "call timed out".to_string(),
            RpcError::NotFound(msg) => msg.clone(),
            RpcError::ManyFound(msg) => msg.clone(),
            RpcError::InvalidArgument(msg) => msg.clone(),
            RpcError::ExecError { stderr, .. } => stderr.clone(),
            RpcError::DbDuplicateEntry(msg) => msg.clone(),
            RpcError::DbDeadlock(msg) => msg.clone(),
            RpcError::DbInvalidUnicodeParameter(msg) => msg.clone(),
            RpcError::DbError(msg) => msg.clone(),
            RpcError::DbConnectionError(msg) => msg.clone(),
            RpcError::Generic(msg) => msg.clone(),
            RpcError::Transport(e) => e.to_string(),
        }
    }

    /// Turn this error into the envelope that crosses the wire.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let status_code = match self {
            RpcError::ExecError { return_code, .. } => Some(*return_code as i64),
            _ => None,
        };
        ErrorEnvelope {
            kind: self.kind(),
            message: self.raw_message(),
            status_code,
        }
    }

    /// Reconstruct an `RpcError` from a wire envelope (client side).
    pub fn from_envelope(env: ErrorEnvelope) -> Self {
        match env.kind {
            ErrorKind::Timeout => RpcError::Timeout,
            ErrorKind::NotFound => RpcError::NotFound(env.message),
            ErrorKind::ManyFound => RpcError::ManyFound(env.message),
            ErrorKind::InvalidArgument => RpcError::InvalidArgument(env.message),
            ErrorKind::ExecError => RpcError::ExecError {
                return_code: env.status_code.unwrap_or(-1) as i32,
                stdout: String::new(),
                stderr: env.message,
            },
            ErrorKind::DbDuplicateEntry => RpcError::DbDuplicateEntry(env.message),
            ErrorKind::DbDeadlock => RpcError::DbDeadlock(env.message),
            ErrorKind::DbInvalidUnicodeParameter => RpcError::DbInvalidUnicodeParameter(env.message),
            ErrorKind::DbError => RpcError::DbError(env.message),
            ErrorKind::DbConnectionError => RpcError::DbConnectionError(env.message),
            ErrorKind::Generic => RpcError::Generic(env.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_error() {
        let err = RpcError::NotFound("queue gone".into());
        let env = err.to_envelope();
        assert_eq!(env.kind, ErrorKind::NotFound);
        assert_eq!(env.message, "queue gone");

        let rebuilt = RpcError::from_envelope(env);
        assert_eq!(rebuilt.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn exec_error_carries_status_code() {
        let err = RpcError::ExecError {
            return_code: 127,
            stdout: String::new(),
            stderr: "not found".into(),
        };
        let env = err.to_envelope();
        assert_eq!(env.status_code, Some(127));
    }
}
