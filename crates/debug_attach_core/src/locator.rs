use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::sleep;

use crate::config::{EngineProfile, LocatorPolicy};
use crate::process::{process_name_matches, ProcessCandidate, ProcessTable};
use crate::{AttachError, Result};

/// Which heuristic picked the game process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    RecentEngine,
    RecentHost,
    AnyEngine,
}

/// Finds the game process, either by confirming an explicit PID or by scanning.
#[derive(Clone)]
pub struct ProcessLocator {
    table: Arc<dyn ProcessTable>,
    engine: EngineProfile,
    policy: LocatorPolicy,
}

impl ProcessLocator {
    pub fn new(table: Arc<dyn ProcessTable>, engine: EngineProfile, policy: LocatorPolicy) -> Self {
        Self {
            table,
            engine,
            policy,
        }
    }

    pub async fn locate(&self, explicit_pid: Option<u32>) -> Result<u32> {
        match explicit_pid {
            Some(pid) => self.wait_for_pid(pid).await,
            None => self.auto_detect().await,
        }
    }

    async fn wait_for_pid(&self, pid: u32) -> Result<u32> {
        if self.is_alive(pid).await {
            return Ok(pid);
        }

        let retries = self.policy.explicit_retries;
        for attempt in 1..=retries {
            tracing::warn!("PID {} not found, retrying... ({}/{})", pid, attempt, retries);
            sleep(self.policy.explicit_delay).await;
            if self.is_alive(pid).await {
                tracing::info!("PID {} appeared after {} retries", pid, attempt);
                return Ok(pid);
            }
        }

        Err(AttachError::ProcessNotFound { pid, retries })
    }

    async fn auto_detect(&self) -> Result<u32> {
        tracing::info!("PID not provided, auto-detecting {} process", self.engine.tag);

        let retries = self.policy.scan_retries;
        for attempt in 0..=retries {
            if attempt > 0 {
                tracing::warn!(
                    "Game process not found, retrying... ({}/{})",
                    attempt,
                    retries
                );
                sleep(self.policy.scan_delay).await;
            }

            let processes = self.snapshot().await;
            if let Some((pid, tier)) =
                pick_candidate(&processes, &self.engine, &self.policy, SystemTime::now())
            {
                tracing::info!("Auto-detected game PID {} ({:?})", pid, tier);
                return Ok(pid);
            }
        }

        Err(AttachError::NoGameProcess { retries })
    }

    async fn snapshot(&self) -> Vec<ProcessCandidate> {
        let table = Arc::clone(&self.table);
        match tokio::task::spawn_blocking(move || table.snapshot()).await {
            Ok(processes) => processes,
            Err(e) => {
                tracing::warn!("Process scan failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn is_alive(&self, pid: u32) -> bool {
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || table.is_alive(pid))
            .await
            .unwrap_or(false)
    }
}

/// Applies the three matching tiers in order and returns the first hit.
pub fn pick_candidate(
    processes: &[ProcessCandidate],
    engine: &EngineProfile,
    policy: &LocatorPolicy,
    now: SystemTime,
) -> Option<(u32, MatchTier)> {
    let pattern = engine.name_pattern.to_ascii_lowercase();
    let engine_named: Vec<&ProcessCandidate> = processes
        .iter()
        .filter(|p| !p.is_self && p.name.to_ascii_lowercase().contains(&pattern))
        .collect();
    tracing::debug!("Found {} {} processes", engine_named.len(), engine.tag);

    if let Some(p) = engine_named
        .iter()
        .filter(|p| started_within(p, now, policy.engine_window))
        .max_by_key(|p| p.start_time)
    {
        return Some((p.pid, MatchTier::RecentEngine));
    }

    if let Some(p) = processes
        .iter()
        .filter(|p| !p.is_self && process_name_matches(&p.name, &engine.host_process))
        .filter(|p| started_within(p, now, policy.host_window))
        .max_by_key(|p| p.start_time)
    {
        return Some((p.pid, MatchTier::RecentHost));
    }

    // Unknown start times compare lowest, so they only win when nothing else is left.
    engine_named
        .iter()
        .max_by_key(|p| p.start_time)
        .map(|p| (p.pid, MatchTier::AnyEngine))
}

fn started_within(process: &ProcessCandidate, now: SystemTime, window: Duration) -> bool {
    matches!(process.age(now), Some(age) if age < window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_locator_policy, FakeProcessTable, SELF_PID};
    use std::time::Instant;

    fn candidate(pid: u32, name: &str, age_secs: Option<u64>, now: SystemTime) -> ProcessCandidate {
        ProcessCandidate {
            pid,
            name: name.to_string(),
            start_time: age_secs.map(|s| now - Duration::from_secs(s)),
            is_self: false,
        }
    }

    fn pick(processes: &[ProcessCandidate], now: SystemTime) -> Option<(u32, MatchTier)> {
        pick_candidate(processes, &EngineProfile::default(), &LocatorPolicy::default(), now)
    }

    fn locator(table: &FakeProcessTable) -> ProcessLocator {
        ProcessLocator::new(
            Arc::new(table.clone()),
            EngineProfile::default(),
            fast_locator_policy(),
        )
    }

    #[test]
    fn test_recent_engine_process_beats_newer_runtime_host() {
        let now = SystemTime::now();
        let processes = vec![
            candidate(100, "Godot_v4.2-stable_mono_win64", Some(5), now),
            candidate(200, "dotnet", Some(1), now),
        ];
        assert_eq!(pick(&processes, now), Some((100, MatchTier::RecentEngine)));
    }

    #[test]
    fn test_most_recent_engine_process_wins_within_window() {
        let now = SystemTime::now();
        let processes = vec![
            candidate(10, "godot", Some(12), now),
            candidate(11, "Godot", Some(2), now),
            candidate(12, "godot", Some(300), now),
        ];
        assert_eq!(pick(&processes, now), Some((11, MatchTier::RecentEngine)));
    }

    #[test]
    fn test_runtime_host_used_when_engine_processes_are_old() {
        let now = SystemTime::now();
        let processes = vec![
            candidate(10, "godot", Some(600), now),
            candidate(20, "dotnet.exe", Some(25), now),
            candidate(21, "dotnet", Some(4), now),
        ];
        assert_eq!(pick(&processes, now), Some((21, MatchTier::RecentHost)));
    }

    #[test]
    fn test_falls_back_to_newest_engine_process_of_any_age() {
        let now = SystemTime::now();
        let processes = vec![
            candidate(10, "godot", None, now),
            candidate(11, "godot", Some(900), now),
            candidate(12, "godot", Some(600), now),
            candidate(20, "dotnet", Some(60), now),
        ];
        assert_eq!(pick(&processes, now), Some((12, MatchTier::AnyEngine)));
    }

    #[test]
    fn test_unknown_start_time_still_matches_as_last_resort() {
        let now = SystemTime::now();
        let processes = vec![candidate(10, "godot", None, now)];
        assert_eq!(pick(&processes, now), Some((10, MatchTier::AnyEngine)));
    }

    #[test]
    fn test_self_is_never_picked() {
        let now = SystemTime::now();
        let mut me = candidate(1, "godot-attach", Some(0), now);
        me.is_self = true;
        let mut host = candidate(2, "dotnet", Some(0), now);
        host.is_self = true;
        assert_eq!(pick(&[me, host], now), None);
    }

    #[test]
    fn test_unrelated_processes_do_not_match() {
        let now = SystemTime::now();
        let processes = vec![
            candidate(10, "bash", Some(1), now),
            candidate(11, "dotnet-watch", Some(1), now),
        ];
        assert_eq!(pick(&processes, now), None);
    }

    #[tokio::test]
    async fn test_explicit_pid_that_is_running_resolves_immediately() {
        let table = FakeProcessTable::new();
        table.spawn(77, "anything", Duration::from_secs(1));
        assert_eq!(locator(&table).locate(Some(77)).await.unwrap(), 77);
    }

    #[tokio::test]
    async fn test_explicit_pid_never_running_fails_after_retries() {
        let table = FakeProcessTable::new();
        let started = Instant::now();
        let err = locator(&table).locate(Some(4040)).await.unwrap_err();

        assert!(matches!(err, AttachError::ProcessNotFound { pid: 4040, retries: 5 }));
        assert_eq!(err.code(), crate::ErrorCode::ProcessNotFound);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_explicit_pid_appearing_during_retries_resolves() {
        let table = FakeProcessTable::new();
        let locator = locator(&table);

        let late = table.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(25)).await;
            late.spawn(4041, "godot", Duration::ZERO);
        });

        assert_eq!(locator.locate(Some(4041)).await.unwrap(), 4041);
    }

    #[tokio::test]
    async fn test_auto_detect_waits_for_game_to_start() {
        let table = FakeProcessTable::new();
        let locator = locator(&table);

        let late = table.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(40)).await;
            late.spawn(5150, "Godot", Duration::ZERO);
        });

        assert_eq!(locator.locate(None).await.unwrap(), 5150);
    }

    #[tokio::test]
    async fn test_auto_detect_without_game_reports_not_found() {
        let table = FakeProcessTable::new();
        table.spawn(9, "explorer", Duration::from_secs(1));

        let err = locator(&table).locate(None).await.unwrap_err();
        assert!(matches!(err, AttachError::NoGameProcess { retries: 10 }));
        assert_eq!(err.code(), crate::ErrorCode::ProcessNotFound);
    }

    #[tokio::test]
    async fn test_auto_detect_skips_own_process() {
        let table = FakeProcessTable::new();
        table.kill(SELF_PID);
        table.push(ProcessCandidate {
            pid: SELF_PID,
            name: "godot_attach".into(),
            start_time: Some(SystemTime::now()),
            is_self: true,
        });

        assert!(locator(&table).locate(None).await.is_err());
    }
}
