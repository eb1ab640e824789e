use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AttachConfig;
use crate::driver::automation::{platform_automation, ProcessLauncher};
use crate::driver::{Capabilities, Driver};
use crate::locator::ProcessLocator;
use crate::process::SystemProcessTable;
use crate::resolver::IdeResolver;
use crate::types::{AttachOutcome, AttachRequest, AttachResponse, EditorKind, ResolvedAttachTarget};
use crate::{AttachError, Result};

/// The per-request pipeline: locate the game, resolve the IDE and workspace, attach.
pub struct AttachService {
    config: AttachConfig,
    locator: ProcessLocator,
    resolver: IdeResolver,
    capabilities: Capabilities,
}

impl AttachService {
    /// Service wired to the real process table, launcher and platform automation.
    pub fn new(config: AttachConfig) -> Self {
        let capabilities = Capabilities {
            processes: Arc::new(SystemProcessTable::new()),
            launcher: Arc::new(ProcessLauncher),
            automation: platform_automation(config.readiness.command_timeout),
        };
        tracing::info!("Window automation: {}", capabilities.automation.name());
        Self::with_capabilities(config, capabilities, IdeResolver::from_env())
    }

    pub fn with_capabilities(
        config: AttachConfig,
        capabilities: Capabilities,
        resolver: IdeResolver,
    ) -> Self {
        let locator = ProcessLocator::new(
            Arc::clone(&capabilities.processes),
            config.engine.clone(),
            config.locator.clone(),
        );
        Self {
            config,
            locator,
            resolver,
            capabilities,
        }
    }

    pub fn config(&self) -> &AttachConfig {
        &self.config
    }

    /// Handles one decoded request. Always produces a response.
    pub async fn handle_request(&self, request: AttachRequest) -> AttachResponse {
        match self.attach(&request).await {
            Ok(outcome) => {
                if outcome.ok {
                    tracing::info!("{}", outcome.detail.as_deref().unwrap_or("Attach initiated"));
                }
                AttachResponse::from_outcome(outcome)
            }
            Err(e) => {
                tracing::error!("Attach request failed: {}", e);
                AttachResponse::from_error(&e)
            }
        }
    }

    async fn attach(&self, request: &AttachRequest) -> Result<AttachOutcome> {
        let editor = request.editor_kind();
        if !request.engine.eq_ignore_ascii_case(&self.config.engine.tag) {
            tracing::warn!(
                "Unsupported engine '{}', treating as {}",
                request.engine,
                self.config.engine.tag
            );
        }
        if !request.editor.trim().eq_ignore_ascii_case(editor.identity()) {
            tracing::warn!("Unknown editor '{}', using {}", request.editor, editor);
        }
        tracing::info!(
            "Attach request: pid={} editor={} issued at {}",
            request.pid,
            editor,
            request.timestamp
        );

        let pid = self.locator.locate(request.requested_pid()).await?;
        let ide = self.ide_path(editor, request.explicit_editor_path())?;
        let workspace = self.workspace_path(editor, request.explicit_workspace_path())?;

        let target = ResolvedAttachTarget::new(pid, ide, workspace, editor.workspace_kind())?;
        tracing::info!(
            "Attaching {} to PID {} (workspace {})",
            editor.display_name(),
            target.pid(),
            target.workspace_path().display()
        );

        let driver = Driver::for_editor(editor, &self.capabilities, &self.config.readiness);
        Ok(driver.attach(&target).await)
    }

    /// An explicit path is trusted as given; probing only happens without one.
    fn ide_path(&self, editor: EditorKind, explicit: Option<&str>) -> Result<PathBuf> {
        match explicit {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_file() {
                    return Err(AttachError::IdeExecutableNotFound(path));
                }
                Ok(path)
            }
            None => self
                .resolver
                .resolve_path(editor, None)
                .ok_or_else(|| AttachError::IdeNotFound(editor.display_name().to_string())),
        }
    }

    fn workspace_path(&self, editor: EditorKind, explicit: Option<&str>) -> Result<PathBuf> {
        let explicit = explicit.map(Path::new);
        let project_root = self.config.effective_project_root();

        self.resolver
            .resolve_workspace(
                editor,
                explicit,
                project_root.as_deref(),
                self.config.synthesize_solution,
            )
            .ok_or_else(|| {
                let tried = explicit
                    .map(Path::to_path_buf)
                    .or(project_root)
                    .unwrap_or_default();
                AttachError::WorkspaceNotFound(tried)
            })
    }
}
