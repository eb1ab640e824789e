use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::config::{AttachConfig, LocatorPolicy, ReadinessPolicy};
use crate::driver::automation::{IdeLauncher, WindowAutomation};
use crate::process::{ProcessCandidate, ProcessTable};

pub const SELF_PID: u32 = 1;

/// Process list that tests edit while code under test is scanning it.
#[derive(Clone, Default)]
pub struct FakeProcessTable {
    processes: Arc<Mutex<Vec<ProcessCandidate>>>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        let table = Self::default();
        table.push(ProcessCandidate {
            pid: SELF_PID,
            name: "debug_attach_service".into(),
            start_time: Some(SystemTime::now()),
            is_self: true,
        });
        table
    }

    pub fn push(&self, candidate: ProcessCandidate) {
        self.processes.lock().unwrap().push(candidate);
    }

    /// Adds a process that started `age` ago.
    pub fn spawn(&self, pid: u32, name: &str, age: Duration) {
        self.push(ProcessCandidate {
            pid,
            name: name.to_string(),
            start_time: Some(SystemTime::now() - age),
            is_self: false,
        });
    }

    pub fn kill(&self, pid: u32) {
        self.processes.lock().unwrap().retain(|p| p.pid != pid);
    }
}

impl ProcessTable for FakeProcessTable {
    fn snapshot(&self) -> Vec<ProcessCandidate> {
        self.processes.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

/// Records launches and optionally makes an IDE process appear in a fake table.
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    pub launches: Arc<Mutex<Vec<Launch>>>,
    spawn_into: Option<(FakeProcessTable, u32, String)>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawning(table: FakeProcessTable, pid: u32, name: &str) -> Self {
        Self {
            launches: Arc::default(),
            spawn_into: Some((table, pid, name.to_string())),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

impl IdeLauncher for RecordingLauncher {
    fn launch(&self, program: &Path, args: &[OsString]) -> std::io::Result<()> {
        self.launches.lock().unwrap().push(Launch {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });
        if let Some((table, pid, name)) = &self.spawn_into {
            table.spawn(*pid, name, Duration::ZERO);
        }
        Ok(())
    }
}

/// Counts trigger attempts and fails the first `failures` of them.
#[derive(Clone, Default)]
pub struct RecordingAutomation {
    pub triggered: Arc<Mutex<Vec<u32>>>,
    failures: usize,
}

impl RecordingAutomation {
    pub fn failing(failures: usize) -> Self {
        Self {
            triggered: Arc::default(),
            failures,
        }
    }

    pub fn attempts(&self) -> Vec<u32> {
        self.triggered.lock().unwrap().clone()
    }
}

impl WindowAutomation for RecordingAutomation {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn trigger_debugging(&self, pid: u32) -> Result<(), String> {
        let mut triggered = self.triggered.lock().unwrap();
        triggered.push(pid);
        if triggered.len() <= self.failures {
            return Err(format!("window for PID {pid} did not take focus"));
        }
        Ok(())
    }
}

pub fn fast_locator_policy() -> LocatorPolicy {
    LocatorPolicy {
        explicit_retries: 5,
        explicit_delay: Duration::from_millis(20),
        scan_retries: 10,
        scan_delay: Duration::from_millis(20),
        ..LocatorPolicy::default()
    }
}

pub fn fast_readiness_policy() -> ReadinessPolicy {
    ReadinessPolicy {
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(200),
        min_wait_running: Duration::from_millis(20),
        min_wait_fresh: Duration::from_millis(40),
        key_attempts: 3,
        key_retry_delay: Duration::from_millis(5),
        command_timeout: Duration::from_secs(5),
    }
}

pub fn fast_config(project_root: &Path) -> AttachConfig {
    AttachConfig {
        port: 0,
        project_root: Some(project_root.to_path_buf()),
        locator: fast_locator_policy(),
        readiness: fast_readiness_policy(),
        ..AttachConfig::default()
    }
}

/// Creates an empty file standing in for an IDE executable.
pub fn fake_executable(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}
