//! Error types for the TEN runtime.
//!
//! `TenError` covers programmer-error and operation-error paths (see
//! spec §7). Remote errors are modeled as `CmdResult`s, not as `TenError`,
//! since they must never unwind a thread.

use thiserror::Error;

/// The closed set of status codes a `CmdResult` can carry on the wire.
/// Values are stable; only the associated diagnostic text is free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    Generic,
    InvalidArgument,
    InvalidJson,
    TenIsClosed,
    MsgNotConnected,
    Timeout,
    AddonNotFound,
    DeadlockPrevented,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::Generic => 1,
            ErrorCode::InvalidArgument => 2,
            ErrorCode::InvalidJson => 3,
            ErrorCode::TenIsClosed => 4,
            ErrorCode::MsgNotConnected => 5,
            ErrorCode::Timeout => 6,
            ErrorCode::AddonNotFound => 7,
            ErrorCode::DeadlockPrevented => 8,
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            0 => ErrorCode::Ok,
            1 => ErrorCode::Generic,
            2 => ErrorCode::InvalidArgument,
            3 => ErrorCode::InvalidJson,
            4 => ErrorCode::TenIsClosed,
            5 => ErrorCode::MsgNotConnected,
            6 => ErrorCode::Timeout,
            7 => ErrorCode::AddonNotFound,
            8 => ErrorCode::DeadlockPrevented,
            _ => return None,
        })
    }

    pub fn is_ok(self) -> bool {
        matches!(self, ErrorCode::Ok)
    }
}

/// Programmer-error / local-failure type. Never crosses into a `CmdResult`
/// directly — callers that want to report operation failures to a remote
/// peer build a `CmdResult` with the matching `ErrorCode` instead (see
/// `ten_env::TenEnv::return_result` and `engine::routing`).
#[derive(Error, Debug)]
pub enum TenError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("addon not found: {0}")]
    AddonNotFound(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("message not connected: {0}")]
    NotConnected(String),

    #[error("operation timed out")]
    Timeout,

    #[error("owner is closed")]
    TenIsClosed,

    #[error("deadlock prevented: {0}")]
    DeadlockPrevented(String),

    #[error("double on_{0}_done call")]
    DoubleLifecycleDone(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TenError>;

impl TenError {
    /// Maps an operation error onto the closed `ErrorCode` set used on the
    /// wire. Programmer errors (`DoubleLifecycleDone`, `Io`, `Other`) map to
    /// `Generic` since they are never expected to be serialized as results.
    pub fn code(&self) -> ErrorCode {
        match self {
            TenError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            TenError::InvalidJson(_) => ErrorCode::InvalidJson,
            TenError::AddonNotFound(_) => ErrorCode::AddonNotFound,
            TenError::NotConnected(_) => ErrorCode::MsgNotConnected,
            TenError::Timeout => ErrorCode::Timeout,
            TenError::TenIsClosed => ErrorCode::TenIsClosed,
            TenError::DeadlockPrevented(_) => ErrorCode::DeadlockPrevented,
            _ => ErrorCode::Generic,
        }
    }
}
