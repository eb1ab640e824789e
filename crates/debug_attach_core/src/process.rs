use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, ProcessRefreshKind, System};

/// One row of a process list scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCandidate {
    pub pid: u32,
    pub name: String,
    /// `None` when the start time could not be read.
    pub start_time: Option<SystemTime>,
    pub is_self: bool,
}

impl ProcessCandidate {
    /// Age relative to `now`. Unknown start times and clock skew yield `None`.
    pub fn age(&self, now: SystemTime) -> Option<Duration> {
        self.start_time
            .and_then(|started| now.duration_since(started).ok())
    }
}

/// Read access to the OS process list.
pub trait ProcessTable: Send + Sync {
    fn snapshot(&self) -> Vec<ProcessCandidate>;

    fn is_alive(&self, pid: u32) -> bool {
        self.snapshot().iter().any(|p| p.pid == pid)
    }

    /// PIDs of processes whose name equals `name`, ignoring case and an `.exe` suffix.
    fn pids_named(&self, name: &str) -> Vec<u32> {
        self.snapshot()
            .into_iter()
            .filter(|p| process_name_matches(&p.name, name))
            .map(|p| p.pid)
            .collect()
    }
}

pub fn process_name_matches(actual: &str, expected: &str) -> bool {
    strip_exe(actual).eq_ignore_ascii_case(strip_exe(expected))
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

/// [`ProcessTable`] backed by `sysinfo`.
pub struct SystemProcessTable {
    system: Mutex<System>,
    self_pid: u32,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            self_pid: std::process::id(),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Vec<ProcessCandidate> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes_specifics(ProcessRefreshKind::new());

        // On Linux every thread shows up as its own entry; only thread group leaders count.
        system
            .processes()
            .values()
            .filter(|process| process.thread_kind().is_none())
            .map(|process| {
                let pid = process.pid().as_u32();
                let started = process.start_time();
                ProcessCandidate {
                    pid,
                    name: process.name().to_string(),
                    start_time: (started > 0)
                        .then(|| UNIX_EPOCH + Duration::from_secs(started)),
                    is_self: pid == self.self_pid,
                }
            })
            .collect()
    }

    fn is_alive(&self, pid: u32) -> bool {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        let pid = Pid::from_u32(pid);
        system.refresh_process_specifics(pid, ProcessRefreshKind::new())
            && system
                .process(pid)
                .is_some_and(|process| process.thread_kind().is_none())
    }
}
