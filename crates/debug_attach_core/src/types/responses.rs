use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AttachError, ErrorCode};
use crate::types::WorkspaceKind;

/// Exactly one response is written per decoded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
}

impl AttachResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error_code: None,
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            error_code: Some(code),
        }
    }

    pub fn from_error(err: &AttachError) -> Self {
        Self::failure(err.code(), err.to_string())
    }

    pub fn from_outcome(outcome: AttachOutcome) -> Self {
        if outcome.ok {
            Self::success(
                outcome
                    .detail
                    .unwrap_or_else(|| "Attach initiated successfully".to_string()),
            )
        } else {
            Self::failure(
                ErrorCode::AttachFailed,
                outcome
                    .detail
                    .unwrap_or_else(|| "Attach failed".to_string()),
            )
        }
    }
}

/// Result of one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOutcome {
    pub ok: bool,
    pub detail: Option<String>,
}

impl AttachOutcome {
    pub fn ok() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn ok_with(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// PID, IDE executable and workspace, checked against the filesystem before
/// any driver sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachTarget {
    pid: u32,
    editor_executable_path: PathBuf,
    workspace_path: PathBuf,
}

impl ResolvedAttachTarget {
    pub fn new(
        pid: u32,
        editor_executable_path: impl Into<PathBuf>,
        workspace_path: impl Into<PathBuf>,
        workspace_kind: WorkspaceKind,
    ) -> Result<Self, AttachError> {
        let editor_executable_path = editor_executable_path.into();
        let workspace_path = workspace_path.into();

        if pid == 0 {
            return Err(AttachError::ProcessNotFound { pid, retries: 0 });
        }
        check_executable(&editor_executable_path)?;
        check_workspace(&workspace_path, workspace_kind)?;

        Ok(Self {
            pid,
            editor_executable_path,
            workspace_path,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn editor_executable_path(&self) -> &Path {
        &self.editor_executable_path
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }
}

pub(crate) fn check_executable(path: &Path) -> Result<(), AttachError> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return Err(AttachError::IdeExecutableNotFound(path.to_path_buf()));
    }
    Ok(())
}

pub(crate) fn check_workspace(path: &Path, kind: WorkspaceKind) -> Result<(), AttachError> {
    let present = match kind {
        WorkspaceKind::Folder => path.is_dir(),
        WorkspaceKind::SolutionFile => path.is_file(),
    };
    if path.as_os_str().is_empty() || !present {
        return Err(AttachError::WorkspaceNotFound(path.to_path_buf()));
    }
    Ok(())
}
