use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::time::{sleep, Instant};

use super::Capabilities;
use crate::config::ReadinessPolicy;
use crate::types::responses::{check_executable, check_workspace};
use crate::types::{AttachOutcome, EditorKind, ResolvedAttachTarget, WorkspaceKind};
use crate::{AttachError, Result};

const LAUNCH_CONFIG_NAME: &str = ".NET Attach (Godot)";

#[derive(Serialize)]
struct LaunchFile {
    version: &'static str,
    configurations: Vec<AttachConfiguration>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachConfiguration {
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    request: &'static str,
    process_id: String,
}

/// Overwrites `<workspace>/.vscode/launch.json` with a single coreclr attach entry.
pub async fn write_launch_config(workspace: &Path, pid: u32) -> Result<PathBuf> {
    let dir = workspace.join(".vscode");
    tokio::fs::create_dir_all(&dir).await?;

    let file = LaunchFile {
        version: "0.2.0",
        configurations: vec![AttachConfiguration {
            name: LAUNCH_CONFIG_NAME,
            kind: "coreclr",
            request: "attach",
            process_id: pid.to_string(),
        }],
    };
    let path = dir.join("launch.json");
    tokio::fs::write(&path, serde_json::to_string_pretty(&file)?).await?;

    tracing::info!("Wrote {} for PID {}", path.display(), pid);
    Ok(path)
}

/// VS Code style editors: attach through a generated launch configuration and F5.
pub struct LaunchConfigDriver {
    editor: EditorKind,
    capabilities: Capabilities,
    policy: ReadinessPolicy,
}

impl LaunchConfigDriver {
    pub fn new(editor: EditorKind, capabilities: Capabilities, policy: ReadinessPolicy) -> Self {
        Self {
            editor,
            capabilities,
            policy,
        }
    }

    pub async fn attach(&self, target: &ResolvedAttachTarget) -> Result<AttachOutcome> {
        let ide = target.editor_executable_path();
        let workspace = target.workspace_path();
        check_executable(ide)?;
        check_workspace(workspace, WorkspaceKind::Folder)?;

        write_launch_config(workspace, target.pid()).await?;

        let before = self.ide_pids().await;
        tracing::info!(
            "Opening {} on {} ({} instance(s) already running)",
            self.editor.display_name(),
            workspace.display(),
            before.len()
        );

        let args = [OsString::from(workspace), OsString::from("--reuse-window")];
        self.capabilities
            .launcher
            .launch(ide, &args)
            .map_err(|e| AttachError::launch(ide.display().to_string(), e.to_string()))?;

        let Some(ide_pid) = self.wait_for_ide(&before).await else {
            tracing::warn!(
                "{} process not detected after {:?}",
                self.editor.display_name(),
                self.policy.max_wait
            );
            return Ok(AttachOutcome::ok_with(format!(
                "{} launched but its window was not detected. Press F5 to start debugging PID {}",
                self.editor.display_name(),
                target.pid()
            )));
        };

        self.trigger_debugging(ide_pid).await;

        Ok(AttachOutcome::ok_with(format!(
            "Debugger attach triggered in {} for PID {}",
            self.editor.display_name(),
            target.pid()
        )))
    }

    async fn ide_pids(&self) -> Vec<u32> {
        let processes = Arc::clone(&self.capabilities.processes);
        let name = self.editor.process_name();
        tokio::task::spawn_blocking(move || processes.pids_named(name))
            .await
            .unwrap_or_default()
    }

    /// Polls for an IDE process, preferring one that was not running before launch.
    async fn wait_for_ide(&self, before: &[u32]) -> Option<u32> {
        let floor = if before.is_empty() {
            self.policy.min_wait_fresh
        } else {
            self.policy.min_wait_running
        };
        let started_at = Instant::now();

        loop {
            sleep(self.policy.poll_interval).await;
            let waited = started_at.elapsed();

            let current = self.ide_pids().await;
            let candidate = current
                .iter()
                .find(|pid| !before.contains(pid))
                .or_else(|| current.first())
                .copied();

            match candidate {
                Some(pid) if waited >= floor || waited >= self.policy.max_wait => {
                    tracing::debug!("{} ready as PID {} after {:?}", self.editor, pid, waited);
                    return Some(pid);
                }
                None if waited >= self.policy.max_wait => return None,
                _ => {}
            }
        }
    }

    async fn trigger_debugging(&self, ide_pid: u32) {
        let attempts = self.policy.key_attempts;
        for attempt in 1..=attempts {
            let automation = Arc::clone(&self.capabilities.automation);
            let name = automation.name();
            match tokio::task::spawn_blocking(move || automation.trigger_debugging(ide_pid)).await
            {
                Ok(Ok(())) => {
                    tracing::debug!("Sent F5 via {} ({}/{})", name, attempt, attempts)
                }
                Ok(Err(e)) => {
                    tracing::warn!("F5 via {} failed ({}/{}): {}", name, attempt, attempts, e)
                }
                Err(e) => tracing::warn!("F5 via {} panicked: {}", name, e),
            }

            if attempt < attempts {
                sleep(self.policy.key_retry_delay).await;
            }
        }
    }
}
