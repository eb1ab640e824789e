use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::types::responses::{check_executable, check_workspace};
use crate::types::{AttachOutcome, ResolvedAttachTarget, WorkspaceKind};
use crate::{AttachError, Result};

/// Rider attaches through its command line: `rider attach-to-process netcore <pid> <sln>`.
pub struct RiderDriver {
    command_timeout: Duration,
}

impl RiderDriver {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }

    pub async fn attach(&self, target: &ResolvedAttachTarget) -> Result<AttachOutcome> {
        let rider = target.editor_executable_path();
        let solution = target.workspace_path();
        check_executable(rider)?;
        check_workspace(solution, WorkspaceKind::SolutionFile)?;

        tracing::info!(
            "Running {} attach-to-process netcore {} {}",
            rider.display(),
            target.pid(),
            solution.display()
        );

        let child = Command::new(rider)
            .arg("attach-to-process")
            .arg("netcore")
            .arg(target.pid().to_string())
            .arg(solution)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AttachError::launch(rider.display().to_string(), e.to_string()))?;

        // Rider may keep the command running; it is left alone after the timeout.
        match timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    tracing::info!("Rider: {}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    tracing::warn!("Rider: {}", stderr.trim());
                }
                tracing::debug!("Rider attach command exited with {}", output.status);
            }
            Ok(Err(e)) => tracing::warn!("Failed to read Rider output: {}", e),
            Err(_) => tracing::info!(
                "Rider attach command still running after {:?}",
                self.command_timeout
            ),
        }

        Ok(AttachOutcome::ok_with(format!(
            "Rider attach requested for PID {}",
            target.pid()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_executable;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_attach_runs_cli_and_succeeds_regardless_of_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let sln = fake_executable(dir.path(), "Game.sln");
        // /bin/sh fails to open "attach-to-process" as a script, which is fine here.
        let target =
            ResolvedAttachTarget::new(321, "/bin/sh", &sln, WorkspaceKind::SolutionFile).unwrap();

        let outcome = RiderDriver::new(Duration::from_secs(5))
            .attach(&target)
            .await
            .unwrap();
        assert!(outcome.ok);
        assert!(outcome.detail.unwrap().contains("321"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unlaunchable_rider_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sln = fake_executable(dir.path(), "Game.sln");
        // Plain file without the executable bit.
        let rider = fake_executable(dir.path(), "rider");
        let target =
            ResolvedAttachTarget::new(321, &rider, &sln, WorkspaceKind::SolutionFile).unwrap();

        let err = RiderDriver::new(Duration::from_secs(5))
            .attach(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, AttachError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_missing_solution_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let sln = fake_executable(dir.path(), "Game.sln");
        let rider = fake_executable(dir.path(), "rider");
        let target =
            ResolvedAttachTarget::new(9, &rider, &sln, WorkspaceKind::SolutionFile).unwrap();
        std::fs::remove_file(&sln).unwrap();

        let err = RiderDriver::new(Duration::from_secs(5))
            .attach(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, AttachError::WorkspaceNotFound(_)));
    }
}
