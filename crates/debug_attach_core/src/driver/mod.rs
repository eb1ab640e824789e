//! IDE drivers: turn a resolved target into a running debug session, as far as
//! the IDE lets us.

pub mod automation;
pub mod launch_config;
pub mod rider;

use std::sync::Arc;

use crate::config::ReadinessPolicy;
use crate::process::ProcessTable;
use crate::types::{AttachOutcome, EditorKind, ResolvedAttachTarget};
use crate::AttachError;

pub use automation::{IdeLauncher, WindowAutomation};
pub use launch_config::{write_launch_config, LaunchConfigDriver};
pub use rider::RiderDriver;

/// OS-facing capabilities shared by the locator and the drivers.
#[derive(Clone)]
pub struct Capabilities {
    pub processes: Arc<dyn ProcessTable>,
    pub launcher: Arc<dyn IdeLauncher>,
    pub automation: Arc<dyn WindowAutomation>,
}

pub enum Driver {
    LaunchConfig(LaunchConfigDriver),
    Rider(RiderDriver),
}

impl Driver {
    pub fn for_editor(
        editor: EditorKind,
        capabilities: &Capabilities,
        policy: &ReadinessPolicy,
    ) -> Self {
        if editor.uses_launch_config() {
            Driver::LaunchConfig(LaunchConfigDriver::new(
                editor,
                capabilities.clone(),
                policy.clone(),
            ))
        } else {
            Driver::Rider(RiderDriver::new(policy.command_timeout))
        }
    }

    /// Runs the attach recipe. Errors never escape, they become a failed outcome.
    pub async fn attach(&self, target: &ResolvedAttachTarget) -> AttachOutcome {
        let result = match self {
            Driver::LaunchConfig(driver) => driver.attach(target).await,
            Driver::Rider(driver) => driver.attach(target).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Attach to PID {} failed ({}): {}", target.pid(), failure_tag(&e), e);
                AttachOutcome::failed(e.to_string())
            }
        }
    }
}

fn failure_tag(err: &AttachError) -> &'static str {
    match err {
        AttachError::IdeExecutableNotFound(_) => "IDE_EXECUTABLE_NOT_FOUND",
        AttachError::WorkspaceNotFound(_) => "WORKSPACE_NOT_FOUND",
        _ => "EXCEPTION",
    }
}
