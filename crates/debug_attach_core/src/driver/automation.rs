use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Starts IDE processes. Implementations must not wait for the child to exit.
pub trait IdeLauncher: Send + Sync {
    fn launch(&self, program: &Path, args: &[OsString]) -> io::Result<()>;
}

/// Launches through `tokio::process`, detaching from the child.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl IdeLauncher for ProcessLauncher {
    fn launch(&self, program: &Path, args: &[OsString]) -> io::Result<()> {
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::debug!("Started {} (pid {:?})", program.display(), child.id());
        Ok(())
    }
}

/// Brings an IDE window to the front and presses its "start debugging" key.
///
/// Called from blocking threads. Errors are reported as plain messages because callers
/// only log them.
pub trait WindowAutomation: Send + Sync {
    fn name(&self) -> &'static str;

    fn trigger_debugging(&self, pid: u32) -> Result<(), String>;
}

/// Used where no automation tool is available. The user has to press F5 themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAutomation;

impl WindowAutomation for NoopAutomation {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn trigger_debugging(&self, pid: u32) -> Result<(), String> {
        tracing::info!(
            "No window automation available, press F5 in the IDE (pid {}) to start debugging",
            pid
        );
        Ok(())
    }
}

/// `WScript.Shell` `AppActivate` + `SendKeys` through PowerShell.
#[derive(Debug, Clone)]
pub struct PowerShellAutomation {
    timeout: Duration,
}

impl PowerShellAutomation {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn script(pid: u32) -> String {
        format!(
            "$shell = New-Object -ComObject WScript.Shell; \
             if ($shell.AppActivate({pid})) {{ Start-Sleep -Milliseconds 300; $shell.SendKeys('{{F5}}'); exit 0 }} \
             else {{ exit 1 }}"
        )
    }
}

impl WindowAutomation for PowerShellAutomation {
    fn name(&self) -> &'static str {
        "powershell"
    }

    fn trigger_debugging(&self, pid: u32) -> Result<(), String> {
        let script = Self::script(pid);
        let mut command = Command::new("powershell");
        command.args([
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            script.as_str(),
        ]);
        expect_success(run_with_timeout(command, self.timeout), "AppActivate/SendKeys")
    }
}

/// `xdotool` window activation followed by an F5 key press (X11 only).
#[derive(Debug, Clone)]
pub struct XdotoolAutomation {
    program: PathBuf,
    timeout: Duration,
}

impl XdotoolAutomation {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    fn args(pid: u32) -> Vec<String> {
        vec![
            "search".into(),
            "--pid".into(),
            pid.to_string(),
            "--onlyvisible".into(),
            "windowactivate".into(),
            "--sync".into(),
            "key".into(),
            "F5".into(),
        ]
    }
}

impl WindowAutomation for XdotoolAutomation {
    fn name(&self) -> &'static str {
        "xdotool"
    }

    fn trigger_debugging(&self, pid: u32) -> Result<(), String> {
        let mut command = Command::new(&self.program);
        command.args(Self::args(pid));
        expect_success(run_with_timeout(command, self.timeout), "xdotool")
    }
}

/// Picks the automation backend for the host OS.
pub fn platform_automation(timeout: Duration) -> Arc<dyn WindowAutomation> {
    if cfg!(windows) {
        return Arc::new(PowerShellAutomation::new(timeout));
    }

    match which::which("xdotool") {
        Ok(program) if std::env::var_os("DISPLAY").is_some() => {
            tracing::debug!("Using xdotool at {}", program.display());
            Arc::new(XdotoolAutomation::new(program, timeout))
        }
        _ => Arc::new(NoopAutomation),
    }
}

fn expect_success(status: io::Result<ExitStatus>, what: &str) -> Result<(), String> {
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!("{what} exited with {status}")),
        Err(e) => Err(format!("{what} failed: {e}")),
    }
}

/// Runs `command` with null stdio and kills it once `timeout` has passed.
pub(crate) fn run_with_timeout(mut command: Command, timeout: Duration) -> io::Result<ExitStatus> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let started_at = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started_at.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("command did not finish within {timeout:?}"),
            ));
        }
        std::thread::sleep(CHILD_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_automation_always_succeeds() {
        assert_eq!(NoopAutomation.trigger_debugging(42), Ok(()));
        assert_eq!(NoopAutomation.name(), "manual");
    }

    #[test]
    fn test_powershell_script_targets_pid() {
        let script = PowerShellAutomation::script(4242);
        assert!(script.contains("AppActivate(4242)"));
        assert!(script.contains("SendKeys('{F5}')"));
    }

    #[test]
    fn test_xdotool_args_activate_then_press_f5() {
        let args = XdotoolAutomation::args(17);
        assert_eq!(
            args.join(" "),
            "search --pid 17 --onlyvisible windowactivate --sync key F5"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_reports_exit_status() {
        let mut command = Command::new("sh");
        command.args(["-c", "exit 3"]);
        let status = run_with_timeout(command, Duration::from_secs(5)).unwrap();
        assert_eq!(status.code(), Some(3));
        assert!(expect_success(Ok(status), "sh").unwrap_err().contains("sh exited"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_kills_slow_command() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 5"]);

        let started = Instant::now();
        let err = run_with_timeout(command, Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let command = Command::new("definitely-not-a-real-program-xyz");
        assert!(run_with_timeout(command, Duration::from_secs(1)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_launcher_does_not_wait_for_child() {
        let started = Instant::now();
        ProcessLauncher
            .launch(Path::new("sh"), &["-c".into(), "sleep 2".into()])
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
