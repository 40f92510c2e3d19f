//! Bounded waiting and signal escalation for the subject process.
//!
//! The subject always runs as the leader of its own process group (a new
//! session in PTY mode, `process_group(0)` in piped mode), so signals are sent
//! to the whole group and helper processes holding the output streams go down
//! with it. Termination sends SIGTERM, waits a grace period, then escalates to
//! SIGKILL and reaps with a bounded wait. Nothing here blocks without a limit.

use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

/// Exit code reported when no real status could be obtained.
pub const FORCED_EXIT_CODE: i32 = -1;

/// Timing for [`terminate`].
#[derive(Debug, Clone)]
pub struct TerminateConfig {
    /// Time between SIGTERM and SIGKILL.
    pub grace_period: Duration,
    /// How long to wait for the reap after SIGKILL.
    pub kill_wait: Duration,
    /// Polling interval while waiting for the process to exit.
    pub poll_interval: Duration,
}

impl Default for TerminateConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
            kill_wait: Duration::from_secs(1),
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl TerminateConfig {
    /// Worst-case time [`terminate`] spends on a process that ignores SIGTERM.
    pub fn max_delay(&self) -> Duration {
        self.grace_period + self.kill_wait
    }
}

/// Poll `child` until it exits or `timeout` elapses.
///
/// Returns `None` if the child is still running at the deadline or its status
/// cannot be queried.
pub fn wait_timeout(child: &mut Child, timeout: Duration, poll: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!(pid = child.id(), error = %e, "try_wait failed");
                return None;
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        std::thread::sleep(poll.min(deadline - now));
    }
}

/// Stop `child` and its process group, escalating from SIGTERM to SIGKILL.
///
/// Returns the exit status if the child could be reaped, `None` if it still
/// refused to die after SIGKILL and the kill wait.
pub fn terminate(child: &mut Child, config: &TerminateConfig) -> Option<ExitStatus> {
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }
    let pid = child.id();

    info!(pid, "terminate: sending SIGTERM to process group");
    signal_group(pid, Signal::SIGTERM);
    if let Some(status) = wait_timeout(child, config.grace_period, config.poll_interval) {
        debug!(pid, ?status, "terminate: exited after SIGTERM");
        return Some(status);
    }

    warn!(pid, grace = ?config.grace_period, "terminate: grace period expired, escalating to SIGKILL");
    force_kill(child, config)
}

/// SIGKILL `child` and its process group right away and reap it.
///
/// Waits at most `config.kill_wait` for the reap.
pub fn force_kill(child: &mut Child, config: &TerminateConfig) -> Option<ExitStatus> {
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }
    let pid = child.id();
    signal_group(pid, Signal::SIGKILL);
    if let Err(e) = child.kill() {
        debug!(pid, error = %e, "terminate: direct kill failed");
    }
    let status = wait_timeout(child, config.kill_wait, config.poll_interval);
    if status.is_none() {
        warn!(pid, "terminate: process survived SIGKILL wait");
    }
    status
}

/// Signal the process group led by `pid`, falling back to the process alone.
fn signal_group(pid: u32, sig: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    let target = Pid::from_raw(raw);
    match signal::killpg(target, sig) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) => {
            debug!(pid, signal = ?sig, "terminate: process group already gone");
        }
        Err(e) => {
            debug!(pid, signal = ?sig, error = %e, "terminate: killpg failed, signalling process");
            if let Err(e) = signal::kill(target, sig) {
                debug!(pid, signal = ?sig, error = %e, "terminate: kill failed");
            }
        }
    }
}

/// Map an exit status to the harness exit code.
///
/// A normal exit yields its code; death by signal yields `-signum`.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => -sig,
        (None, None) => FORCED_EXIT_CODE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    fn spawn_group(script: &str) -> Child {
        Command::new("/bin/sh")
            .args(["-c", script])
            .process_group(0)
            .spawn()
            .expect("spawn")
    }

    #[test]
    fn wait_timeout_returns_status_of_quick_exit() {
        let mut child = spawn_group("exit 3");
        let status = wait_timeout(&mut child, Duration::from_secs(5), Duration::from_millis(10))
            .expect("exited");
        assert_eq!(exit_code(status), 3);
    }

    #[test]
    fn wait_timeout_gives_up_on_running_child() {
        let mut child = spawn_group("sleep 30");
        let started = Instant::now();
        assert!(wait_timeout(&mut child, Duration::from_millis(100), Duration::from_millis(10)).is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
        terminate(&mut child, &TerminateConfig::default());
    }

    #[test]
    fn sigterm_stops_a_cooperative_child() {
        let mut child = spawn_group("sleep 30");
        let status = terminate(&mut child, &TerminateConfig::default()).expect("reaped");
        assert_eq!(exit_code(status), -(Signal::SIGTERM as i32));
    }

    #[test]
    fn sigkill_stops_a_child_ignoring_sigterm() {
        let mut child = spawn_group("trap '' TERM; while true; do sleep 1; done");
        std::thread::sleep(Duration::from_millis(200));

        let config = TerminateConfig {
            grace_period: Duration::from_millis(200),
            ..TerminateConfig::default()
        };
        let started = Instant::now();
        let status = terminate(&mut child, &config).expect("reaped");
        assert_eq!(exit_code(status), -(Signal::SIGKILL as i32));
        assert!(started.elapsed() < config.max_delay() + Duration::from_millis(500));
    }

    #[test]
    fn force_kill_skips_the_grace_period() {
        let mut child = spawn_group("trap '' TERM; while true; do sleep 1; done");
        let started = Instant::now();
        let status = force_kill(&mut child, &TerminateConfig::default()).expect("reaped");
        assert_eq!(exit_code(status), -(Signal::SIGKILL as i32));
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn terminate_on_exited_child_returns_its_status() {
        let mut child = spawn_group("exit 0");
        std::thread::sleep(Duration::from_millis(200));
        let status = terminate(&mut child, &TerminateConfig::default()).expect("status");
        assert!(status.success());
    }
}
