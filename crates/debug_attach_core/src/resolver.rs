use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::types::{EditorKind, WorkspaceKind};

/// How many directories above a PATH launcher are searched for the real executable.
const LAUNCHER_PARENT_DEPTH: usize = 4;

/// Locates IDE executables and workspaces on disk. Nothing found is not an error here,
/// the caller decides whether a missing path is fatal.
#[derive(Debug, Clone)]
pub struct IdeResolver {
    search_path: Option<OsString>,
    search_install_dirs: bool,
}

impl Default for IdeResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl IdeResolver {
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
            search_install_dirs: true,
        }
    }

    /// Only consults the given PATH-style value, skipping conventional install locations.
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
            search_install_dirs: false,
        }
    }

    pub fn resolve_path(&self, editor: EditorKind, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            tracing::warn!(
                "Configured {} path {} does not exist, probing",
                editor.display_name(),
                path.display()
            );
        }

        if self.search_install_dirs {
            if let Some(found) = install_candidates(editor).into_iter().find(|p| p.is_file()) {
                tracing::debug!("Found {} at {}", editor.display_name(), found.display());
                return Some(found);
            }
        }

        self.find_via_launcher(editor)
    }

    /// Follows a launcher script found on PATH up to the real IDE binary.
    fn find_via_launcher(&self, editor: EditorKind) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        let cwd = std::env::current_dir().ok()?;
        let launchers = which::which_in_all(editor.launcher_script(), Some(search_path), cwd).ok()?;

        for launcher in launchers {
            let launcher = launcher.canonicalize().unwrap_or(launcher);
            let mut dir = launcher.parent().map(Path::to_path_buf);

            for _ in 0..LAUNCHER_PARENT_DEPTH {
                let Some(current) = dir else { break };
                let candidate = current.join(editor.executable_name());
                if candidate.is_file() && candidate != launcher {
                    tracing::debug!(
                        "Resolved {} via launcher {}",
                        candidate.display(),
                        launcher.display()
                    );
                    return Some(candidate);
                }
                dir = current.parent().map(Path::to_path_buf);
            }
        }

        None
    }

    pub fn resolve_workspace(
        &self,
        editor: EditorKind,
        explicit: Option<&Path>,
        project_root: Option<&Path>,
        synthesize_solution: bool,
    ) -> Option<PathBuf> {
        match editor.workspace_kind() {
            WorkspaceKind::Folder => resolve_folder(explicit, project_root),
            WorkspaceKind::SolutionFile => {
                resolve_solution(explicit, project_root, synthesize_solution)
            }
        }
    }
}

fn resolve_folder(explicit: Option<&Path>, project_root: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_dir() {
            return Some(path.to_path_buf());
        }
        if path.is_file() {
            return path.parent().map(Path::to_path_buf);
        }
        tracing::warn!("Workspace path {} does not exist", path.display());
    }

    project_root.filter(|p| p.is_dir()).map(Path::to_path_buf)
}

fn resolve_solution(
    explicit: Option<&Path>,
    project_root: Option<&Path>,
    synthesize: bool,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if path.is_dir() {
            return find_solution(path, synthesize);
        }
        tracing::warn!("Solution path {} does not exist", path.display());
    }

    project_root
        .filter(|p| p.is_dir())
        .and_then(|root| find_solution(root, synthesize))
}

/// First `*.sln` in `root`; if there is none but a `*.csproj` exists, optionally
/// starts generating one in the background.
pub fn find_solution(root: &Path, synthesize: bool) -> Option<PathBuf> {
    if let Some(solution) = files_with_extension(root, "sln").into_iter().next() {
        return Some(solution);
    }

    let project = files_with_extension(root, "csproj").into_iter().next()?;
    if synthesize {
        spawn_solution_synthesis(root.to_path_buf(), project);
    } else {
        tracing::info!(
            "No solution file in {} (found {})",
            root.display(),
            project.display()
        );
    }
    None
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Some(dir) = dir.to_str() else {
        return Vec::new();
    };
    let pattern = format!("{}/*.{}", glob::Pattern::escape(dir), extension);
    let mut files: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            tracing::warn!("Invalid search pattern {}: {}", pattern, e);
            Vec::new()
        }
    };
    files.sort();
    files
}

/// Runs `dotnet new sln` + `dotnet sln add` without waiting for the result.
fn spawn_solution_synthesis(root: PathBuf, project: PathBuf) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No async runtime, skipping solution generation");
        return;
    };

    let name = project
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Game".to_string());
    tracing::info!("Generating {}.sln in {} via dotnet", name, root.display());

    handle.spawn(async move {
        let created = tokio::process::Command::new("dotnet")
            .args(["new", "sln", "--name", &name, "--output"])
            .arg(&root)
            .status()
            .await;
        match created {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!("dotnet new sln exited with {}", status);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to run dotnet: {}", e);
                return;
            }
        }

        let solution = root.join(format!("{name}.sln"));
        match tokio::process::Command::new("dotnet")
            .arg("sln")
            .arg(&solution)
            .arg("add")
            .arg(&project)
            .status()
            .await
        {
            Ok(status) if status.success() => {
                tracing::info!("Generated {}", solution.display())
            }
            Ok(status) => tracing::warn!("dotnet sln add exited with {}", status),
            Err(e) => tracing::warn!("Failed to run dotnet: {}", e),
        }
    });
}

/// Conventional install locations for the host OS, most specific first.
fn install_candidates(editor: EditorKind) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(windows) {
        let local = std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .or_else(dirs::data_local_dir);
        let program_files = std::env::var_os("PROGRAMFILES").map(PathBuf::from);
        let program_files_x86 = std::env::var_os("PROGRAMFILES(X86)").map(PathBuf::from);

        let (local_dirs, system_dirs): (&[&str], &[&str]) = match editor {
            EditorKind::VsCode => (&["Programs/Microsoft VS Code"], &["Microsoft VS Code"]),
            EditorKind::Cursor => (&["Programs/cursor", "Programs/Cursor"], &["Cursor"]),
            EditorKind::Antigravity => {
                (&["Programs/AntiGravity", "Programs/antigravity"], &["AntiGravity"])
            }
            EditorKind::Rider => (&[], &[]),
        };

        if let Some(local) = &local {
            candidates.extend(
                local_dirs
                    .iter()
                    .map(|d| local.join(d).join(editor.executable_name())),
            );
        }
        for root in [&program_files, &program_files_x86].into_iter().flatten() {
            candidates.extend(
                system_dirs
                    .iter()
                    .map(|d| root.join(d).join(editor.executable_name())),
            );
        }

        if editor == EditorKind::Rider {
            if let Some(local) = &local {
                candidates.extend(glob_paths(
                    &local.join("JetBrains/Toolbox/apps/Rider/*/*/bin/rider64.exe"),
                ));
            }
            for root in [&program_files, &program_files_x86].into_iter().flatten() {
                candidates.extend(glob_paths(&root.join("JetBrains/*/bin/rider64.exe")));
            }
        }
    } else if cfg!(target_os = "macos") {
        let app = match editor {
            EditorKind::VsCode => "Visual Studio Code.app/Contents/Resources/app/bin/code",
            EditorKind::Cursor => "Cursor.app/Contents/Resources/app/bin/cursor",
            EditorKind::Antigravity => "Antigravity.app/Contents/Resources/app/bin/antigravity",
            EditorKind::Rider => "Rider.app/Contents/MacOS/rider",
        };
        candidates.push(Path::new("/Applications").join(app));
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join("Applications").join(app));
        }
    } else {
        let system_dirs: &[&str] = match editor {
            EditorKind::VsCode => &["/usr/share/code", "/opt/visual-studio-code", "/snap/bin"],
            EditorKind::Cursor => &["/opt/Cursor", "/usr/share/cursor"],
            EditorKind::Antigravity => &["/usr/share/antigravity", "/opt/Antigravity"],
            EditorKind::Rider => &["/opt/rider/bin", "/snap/bin"],
        };
        candidates.extend(
            system_dirs
                .iter()
                .map(|d| Path::new(d).join(editor.executable_name())),
        );
        if let Some(home) = dirs::home_dir() {
            if editor == EditorKind::Rider {
                candidates.extend(glob_paths(
                    &home.join(".local/share/JetBrains/Toolbox/apps/*rider*/bin/rider"),
                ));
            } else {
                candidates.push(
                    home.join(".local/share")
                        .join(editor.identity())
                        .join(editor.executable_name()),
                );
            }
        }
    }

    candidates
}

fn glob_paths(pattern: &Path) -> Vec<PathBuf> {
    pattern
        .to_str()
        .and_then(|p| glob::glob(p).ok())
        .map(|paths| paths.filter_map(|p| p.ok()).collect())
        .unwrap_or_default()
}
