use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::{ChildStderr, ChildStdout};

/// Unique identifier for a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of the supervised terminal process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// No process has been started yet
    #[default]
    NotStarted,
    /// Process is currently running
    Running,
    /// Process exited cleanly or was stopped on request
    Stopped,
    /// Process exited spontaneously with a non-zero or signal status
    Failed,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

impl TerminationResult {
    /// The process is gone either way; callers rarely care which.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TerminationResult::Success | TerminationResult::ProcessNotFound
        )
    }
}

/// Handle to a spawned terminal process.
///
/// The handle owns the child and its piped output streams. The streams are
/// taken exactly once by the supervisor's monitor task; after that the handle
/// is only used to wait for exit.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if the process has already exited)
    fn pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn command(&self) -> &str;

    /// Get the arguments passed to this process
    fn args(&self) -> &[String];

    /// Take ownership of the piped stdout stream (once)
    fn take_stdout(&mut self) -> Option<ChildStdout>;

    /// Take ownership of the piped stderr stream (once)
    fn take_stderr(&mut self) -> Option<ChildStderr>;

    /// Check if the process is still running (non-blocking)
    async fn is_running(&self) -> bool;

    /// Try to get the exit status without blocking
    async fn try_wait(&mut self) -> Result<Option<ExitStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ExitStatus>;

    /// Kill the process directly through the handle
    async fn kill(&mut self) -> Result<()>;
}

/// Spawning side of a platform process manager
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// Spawn a new process with piped stdout/stderr.
    ///
    /// Spawn failures are reported synchronously as the io::Error the OS
    /// produced; the caller maps them into its own taxonomy.
    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Box<dyn ProcessHandle>, std::io::Error>;
}

/// Termination side of a platform process manager.
///
/// All operations address the process by PID so they can run while the
/// handle itself is owned by the monitor task.
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Request graceful termination (SIGTERM on Unix, plain taskkill on Windows)
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult;

    /// Force-kill the process (SIGKILL on Unix, taskkill /F on Windows)
    async fn force_kill(&self, pid: ProcessId) -> TerminationResult;

    /// Find all live descendants of the given process
    async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>>;

    /// Terminate the process and all of its descendants
    async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult;

    /// Check whether a process with this PID is still alive
    async fn is_alive(&self, pid: ProcessId) -> bool;

    /// Graceful termination request that escalates to a forced kill once
    /// the grace period elapses without the process exiting.
    async fn terminate_with_grace(&self, pid: ProcessId, grace: Duration) -> TerminationResult {
        match self.terminate_gracefully(pid).await {
            TerminationResult::Success => {}
            TerminationResult::ProcessNotFound => return TerminationResult::Success,
            other => return other,
        }

        let poll = Duration::from_millis(100);
        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            if !self.is_alive(pid).await {
                return TerminationResult::Success;
            }
            tokio::time::sleep(poll).await;
        }

        match self.force_kill(pid).await {
            TerminationResult::ProcessNotFound => TerminationResult::Success,
            other => other,
        }
    }
}

/// Combined platform process manager used by the supervisor
pub trait TerminalProcessManager: ProcessLifecycle + ProcessTermination {
    /// Platform name for logging and diagnostics
    fn platform_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_state_transitions() {
        assert!(!ProcessState::NotStarted.is_running());
        assert!(ProcessState::Running.is_running());
        assert!(!ProcessState::Stopped.is_running());
        assert!(!ProcessState::Failed.is_running());
        assert_eq!(ProcessState::default(), ProcessState::NotStarted);
    }

    #[test]
    fn termination_result_terminal_states() {
        assert!(TerminationResult::Success.is_terminal());
        assert!(TerminationResult::ProcessNotFound.is_terminal());
        assert!(!TerminationResult::AccessDenied.is_terminal());
        assert!(!TerminationResult::Failed("boom".to_string()).is_terminal());
    }

    #[test]
    fn process_id_display() {
        let pid = ProcessId::from(4321_u32);
        assert_eq!(pid.to_string(), "4321");
        assert_eq!(pid, ProcessId(4321));
    }
}
