use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 47632;
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// How the game process is recognised in the OS process list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    /// Value of the `engine` request field this profile answers to.
    pub tag: String,
    /// Case-insensitive substring matched against process names.
    pub name_pattern: String,
    /// Managed runtime host that may run the game instead of the engine binary.
    pub host_process: String,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            tag: "godot".to_string(),
            name_pattern: "godot".to_string(),
            host_process: "dotnet".to_string(),
        }
    }
}

/// Retry and recency settings for finding the game process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorPolicy {
    pub explicit_retries: u32,
    pub explicit_delay: Duration,
    pub scan_retries: u32,
    pub scan_delay: Duration,
    pub engine_window: Duration,
    pub host_window: Duration,
}

impl Default for LocatorPolicy {
    fn default() -> Self {
        Self {
            explicit_retries: 5,
            explicit_delay: Duration::from_millis(500),
            scan_retries: 10,
            scan_delay: Duration::from_millis(500),
            engine_window: Duration::from_secs(15),
            host_window: Duration::from_secs(20),
        }
    }
}

/// Timing used while waiting for an IDE window to come up after launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Minimum wait once an IDE process exists, when it was already running before launch.
    pub min_wait_running: Duration,
    /// Minimum wait once an IDE process exists, when it was started by us.
    pub min_wait_fresh: Duration,
    pub key_attempts: u32,
    pub key_retry_delay: Duration,
    /// Upper bound for CLI-driven attach commands.
    pub command_timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(20),
            min_wait_running: Duration::from_secs(3),
            min_wait_fresh: Duration::from_secs(5),
            key_attempts: 3,
            key_retry_delay: Duration::from_secs(1),
            command_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttachConfig {
    pub port: u16,
    /// Directory scanned for a workspace when the request does not carry one.
    pub project_root: Option<PathBuf>,
    /// Create a solution file with `dotnet` when only a project file exists.
    pub synthesize_solution: bool,
    pub engine: EngineProfile,
    pub locator: LocatorPolicy,
    pub readiness: ReadinessPolicy,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            project_root: None,
            synthesize_solution: false,
            engine: EngineProfile::default(),
            locator: LocatorPolicy::default(),
            readiness: ReadinessPolicy::default(),
        }
    }
}

impl AttachConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("DEBUG_ATTACH_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let project_root = lookup("DEBUG_ATTACH_PROJECT_ROOT")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let synthesize_solution = lookup("DEBUG_ATTACH_SYNTHESIZE_SOLUTION")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            port,
            project_root,
            synthesize_solution,
            ..Self::default()
        }
    }

    /// Project root from the config, falling back to the working directory.
    pub fn effective_project_root(&self) -> Option<PathBuf> {
        self.project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }
}
