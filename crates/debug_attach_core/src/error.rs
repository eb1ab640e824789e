use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error tags carried in the `errorCode` field of an attach response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidJson,
    NullRequest,
    ProcessNotFound,
    IdeNotFound,
    AttachFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::NullRequest => "NULL_REQUEST",
            ErrorCode::ProcessNotFound => "PROCESS_NOT_FOUND",
            ErrorCode::IdeNotFound => "IDE_NOT_FOUND",
            ErrorCode::AttachFailed => "ATTACH_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AttachError {
    #[error("Process with PID {pid} not found after {retries} retries")]
    ProcessNotFound { pid: u32, retries: u32 },

    #[error("Failed to auto-detect game process after {retries} retries")]
    NoGameProcess { retries: u32 },

    #[error("Failed to auto-detect IDE path for {0}")]
    IdeNotFound(String),

    #[error("IDE executable not found at: {}", .0.display())]
    IdeExecutableNotFound(PathBuf),

    #[error("Workspace path not found: {}", .0.display())]
    WorkspaceNotFound(PathBuf),

    #[error("Port {port} is already in use or unavailable: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {message}")]
    Launch { program: String, message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AttachError {
    pub fn launch(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Launch {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Wire code reported to the client when this error ends a request.
    pub fn code(&self) -> ErrorCode {
        match self {
            AttachError::ProcessNotFound { .. } | AttachError::NoGameProcess { .. } => {
                ErrorCode::ProcessNotFound
            }
            AttachError::IdeNotFound(_) | AttachError::IdeExecutableNotFound(_) => {
                ErrorCode::IdeNotFound
            }
            AttachError::Json(_) => ErrorCode::InvalidJson,
            AttachError::WorkspaceNotFound(_)
            | AttachError::Bind { .. }
            | AttachError::Launch { .. }
            | AttachError::Timeout(_)
            | AttachError::Protocol(_)
            | AttachError::Io(_) => ErrorCode::AttachFailed,
        }
    }
}
