use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

pub const REQUEST_TYPE: &str = "debug-attach-request";

fn default_request_type() -> String {
    REQUEST_TYPE.to_string()
}

fn default_engine() -> String {
    "godot".to_string()
}

fn default_editor() -> String {
    "vscode".to_string()
}

/// Positive ids beyond the OS range are rejected instead of being read as "auto-detect".
fn deserialize_pid<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let pid = i64::deserialize(deserializer)?;
    if pid > i64::from(u32::MAX) {
        return Err(de::Error::custom(format!("pid {pid} is out of range")));
    }
    Ok(pid)
}

/// One attach request as sent by the editor plugin, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
    #[serde(rename = "type", default = "default_request_type")]
    pub kind: String,
    /// Target process id, `0` or negative asks the service to find the game itself.
    #[serde(default, deserialize_with = "deserialize_pid")]
    pub pid: i64,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_editor")]
    pub editor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl AttachRequest {
    pub fn new(pid: i64, editor: EditorKind) -> Self {
        Self {
            kind: default_request_type(),
            pid,
            engine: default_engine(),
            editor: editor.identity().to_string(),
            editor_path: None,
            workspace_path: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_editor_path(mut self, path: impl Into<String>) -> Self {
        self.editor_path = Some(path.into());
        self
    }

    pub fn with_workspace_path(mut self, path: impl Into<String>) -> Self {
        self.workspace_path = Some(path.into());
        self
    }

    /// The explicit PID, if the request names one.
    pub fn requested_pid(&self) -> Option<u32> {
        if self.pid > 0 {
            u32::try_from(self.pid).ok()
        } else {
            None
        }
    }

    pub fn editor_kind(&self) -> EditorKind {
        EditorKind::from_identity(&self.editor)
    }

    pub fn explicit_editor_path(&self) -> Option<&str> {
        non_blank(self.editor_path.as_deref())
    }

    pub fn explicit_workspace_path(&self) -> Option<&str> {
        non_blank(self.workspace_path.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// What an IDE expects to be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    Folder,
    SolutionFile,
}

/// Supported IDEs. The VS Code based editors share one attach recipe and only
/// differ in names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorKind {
    VsCode,
    Cursor,
    Antigravity,
    Rider,
}

impl EditorKind {
    pub const ALL: [EditorKind; 4] = [
        EditorKind::VsCode,
        EditorKind::Cursor,
        EditorKind::Antigravity,
        EditorKind::Rider,
    ];

    /// Unknown identities fall back to VS Code.
    pub fn from_identity(identity: &str) -> Self {
        match identity.trim().to_ascii_lowercase().as_str() {
            "cursor" => EditorKind::Cursor,
            "antigravity" => EditorKind::Antigravity,
            "rider" => EditorKind::Rider,
            _ => EditorKind::VsCode,
        }
    }

    pub fn identity(&self) -> &'static str {
        match self {
            EditorKind::VsCode => "vscode",
            EditorKind::Cursor => "cursor",
            EditorKind::Antigravity => "antigravity",
            EditorKind::Rider => "rider",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EditorKind::VsCode => "VS Code",
            EditorKind::Cursor => "Cursor",
            EditorKind::Antigravity => "AntiGravity",
            EditorKind::Rider => "Rider",
        }
    }

    /// Process name as reported by the OS, compared case-insensitively.
    pub fn process_name(&self) -> &'static str {
        match self {
            EditorKind::VsCode => "Code",
            EditorKind::Cursor => "Cursor",
            EditorKind::Antigravity => "Antigravity",
            EditorKind::Rider => {
                if cfg!(windows) {
                    "rider64"
                } else {
                    "rider"
                }
            }
        }
    }

    /// File name of the real IDE executable on this platform.
    pub fn executable_name(&self) -> &'static str {
        match (self, cfg!(windows)) {
            (EditorKind::VsCode, true) => "Code.exe",
            (EditorKind::VsCode, false) => "code",
            (EditorKind::Cursor, true) => "Cursor.exe",
            (EditorKind::Cursor, false) => "cursor",
            (EditorKind::Antigravity, true) => "Antigravity.exe",
            (EditorKind::Antigravity, false) => "antigravity",
            (EditorKind::Rider, true) => "rider64.exe",
            (EditorKind::Rider, false) => "rider",
        }
    }

    /// Thin launcher script that usually lives on PATH.
    pub fn launcher_script(&self) -> &'static str {
        match (self, cfg!(windows)) {
            (EditorKind::VsCode, true) => "code.cmd",
            (EditorKind::VsCode, false) => "code",
            (EditorKind::Cursor, true) => "cursor.cmd",
            (EditorKind::Cursor, false) => "cursor",
            (EditorKind::Antigravity, true) => "antigravity.cmd",
            (EditorKind::Antigravity, false) => "antigravity",
            (EditorKind::Rider, true) => "rider.cmd",
            (EditorKind::Rider, false) => "rider",
        }
    }

    pub fn workspace_kind(&self) -> WorkspaceKind {
        match self {
            EditorKind::Rider => WorkspaceKind::SolutionFile,
            _ => WorkspaceKind::Folder,
        }
    }

    /// Whether this editor attaches by reading `.vscode/launch.json`.
    pub fn uses_launch_config(&self) -> bool {
        self.workspace_kind() == WorkspaceKind::Folder
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identity())
    }
}
