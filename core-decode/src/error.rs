//! # Decode Error Types
//!
//! Error taxonomy shared by every decoding operation.
//!
//! Hosts see integer [`ErrorCode`]s; inside the crate failures travel as
//! [`DecodeError`] values carrying context, and the non-failure outcomes of a
//! decode step (end of file, starved input, suppressed frame) travel as
//! [`DecodeStatus`].

use crate::engine::EngineError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer result codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    InvalidParam = 1,
    InvalidState = 2,
    InvalidData = 3,
    InvalidFormat = 4,
    NullReference = 5,
    OpenFileError = 6,
    Eof = 7,
    EngineError = 8,
    OldFrame = 9,
}

impl ErrorCode {
    /// Numeric value handed across the host boundary.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

/// Outcome of a decode step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A packet was consumed (possibly producing no frame).
    Success,
    /// The container has no more packets.
    Eof,
    /// The byte store has nothing unread; feed more data and retry.
    NeedMoreData,
    /// A frame was decoded but suppressed by accurate seek.
    OldFrame,
}

impl DecodeStatus {
    /// Whether the host should simply call again.
    pub fn is_retry_signal(self) -> bool {
        matches!(self, DecodeStatus::NeedMoreData | DecodeStatus::OldFrame)
    }

    /// Host code for this status. Starved input is reported as
    /// [`ErrorCode::InvalidState`].
    pub fn code(self) -> ErrorCode {
        match self {
            DecodeStatus::Success => ErrorCode::Success,
            DecodeStatus::Eof => ErrorCode::Eof,
            DecodeStatus::NeedMoreData => ErrorCode::InvalidState,
            DecodeStatus::OldFrame => ErrorCode::OldFrame,
        }
    }
}

/// Errors raised by the decoding core.
#[derive(Error, Debug)]
pub enum DecodeError {
    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// An argument was out of range or empty.
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// The session is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A required collaborator was missing.
    #[error("Missing reference: {0}")]
    NullReference(String),

    // ========================================================================
    // Media Errors
    // ========================================================================
    /// A packet or frame did not match the opened streams.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A decoded frame uses a format the output path cannot pack.
    #[error("Unsupported format: {0}")]
    InvalidFormat(String),

    /// The decode engine failed.
    #[error("Decode engine error: {0}")]
    Engine(#[from] EngineError),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// The scratch file backing the byte store could not be created.
    #[error("Failed to open scratch file {path}: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The byte store failed.
    #[error("Backing store error: {0}")]
    Store(#[from] StoreError),
}

impl DecodeError {
    /// Host code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidParam(_) => ErrorCode::InvalidParam,
            DecodeError::InvalidState(_) => ErrorCode::InvalidState,
            DecodeError::NullReference(_) => ErrorCode::NullReference,
            DecodeError::InvalidData(_) => ErrorCode::InvalidData,
            DecodeError::InvalidFormat(_) => ErrorCode::InvalidFormat,
            DecodeError::Engine(_) => ErrorCode::EngineError,
            DecodeError::OpenFile { .. } => ErrorCode::OpenFileError,
            DecodeError::Store(StoreError::EmptyWrite) => ErrorCode::InvalidParam,
            DecodeError::Store(_) => ErrorCode::OpenFileError,
        }
    }

    /// Returns `true` if the host may retry the same call later.
    pub fn is_retry_signal(&self) -> bool {
        matches!(self, DecodeError::InvalidState(_))
    }

    /// Returns `true` if the session cannot make further progress and
    /// should be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::Engine(_) | DecodeError::OpenFile { .. } | DecodeError::Store(StoreError::Io(_))
        )
    }
}

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
