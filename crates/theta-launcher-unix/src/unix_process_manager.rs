use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;
use theta_launcher_core::{
    ProcessHandle, ProcessId, ProcessLifecycle, ProcessTermination, TerminalProcessManager,
    TerminationResult,
};

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use std::process::Stdio;
    use std::time::Duration;
    use sysinfo::System;
    use tokio::process::{Child, ChildStderr, ChildStdout, Command};
    use tracing::{debug, info, warn};

    /// Unix-specific process handle implementation
    pub struct UnixProcessHandle {
        child: Child,
        command: String,
        args: Vec<String>,
    }

    impl UnixProcessHandle {
        pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
            Self {
                child,
                command,
                args,
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for UnixProcessHandle {
        fn pid(&self) -> Option<ProcessId> {
            self.child.id().map(ProcessId::from)
        }

        fn command(&self) -> &str {
            &self.command
        }

        fn args(&self) -> &[String] {
            &self.args
        }

        fn take_stdout(&mut self) -> Option<ChildStdout> {
            self.child.stdout.take()
        }

        fn take_stderr(&mut self) -> Option<ChildStderr> {
            self.child.stderr.take()
        }

        async fn is_running(&self) -> bool {
            if let Some(pid) = self.pid() {
                let nix_pid = NixPid::from_raw(pid.0 as i32);
                // Signal 0 probes for existence without delivering anything
                signal::kill(nix_pid, None).is_ok()
            } else {
                false
            }
        }

        async fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
            Ok(self.child.try_wait()?)
        }

        async fn wait(&mut self) -> Result<ExitStatus> {
            Ok(self.child.wait().await?)
        }

        async fn kill(&mut self) -> Result<()> {
            self.child
                .kill()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to kill process: {}", e))
        }
    }

    /// Unix-specific process manager with process tree termination
    pub struct UnixProcessManager {
        system: std::sync::Mutex<System>,
    }

    impl UnixProcessManager {
        pub fn new() -> Self {
            Self {
                system: std::sync::Mutex::new(System::new()),
            }
        }

        /// Terminate a single process by PID with escalation
        async fn terminate_single_process(&self, pid: ProcessId) -> TerminationResult {
            let nix_pid = NixPid::from_raw(pid.0 as i32);

            match signal::kill(nix_pid, Signal::SIGTERM) {
                Ok(()) => {
                    debug!(pid = %pid, "Sent SIGTERM to process");

                    tokio::time::sleep(Duration::from_millis(500)).await;

                    match signal::kill(nix_pid, Signal::SIGKILL) {
                        Ok(()) | Err(nix::errno::Errno::ESRCH) => TerminationResult::Success,
                        Err(e) => {
                            warn!(pid = %pid, error = %e, "Failed to kill process");
                            TerminationResult::Failed(format!("SIGKILL failed: {e}"))
                        }
                    }
                }
                Err(nix::errno::Errno::ESRCH) => TerminationResult::Success,
                Err(nix::errno::Errno::EPERM) => TerminationResult::AccessDenied,
                Err(e) => TerminationResult::Failed(format!("SIGTERM failed: {e}")),
            }
        }

        /// Recursively find all child processes
        fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
            for (pid, process) in system.processes() {
                #[allow(clippy::collapsible_if)]
                if let Some(ppid) = process.parent() {
                    if ppid.as_u32() == parent_pid {
                        let child_pid = pid.as_u32();
                        // Grandchildren first so the result is bottom-up
                        Self::find_children_recursive(system, child_pid, result);
                        result.push(child_pid);
                    }
                }
            }
        }
    }

    impl Default for UnixProcessManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLifecycle for UnixProcessManager {
        async fn spawn_process(
            &self,
            command: &str,
            args: &[String],
            working_dir: Option<&Path>,
            env: &HashMap<String, String>,
        ) -> Result<Box<dyn ProcessHandle>, std::io::Error> {
            let mut cmd = Command::new(command);
            cmd.args(args);

            if let Some(dir) = working_dir {
                cmd.current_dir(dir);
            }

            for (key, value) in env {
                cmd.env(key, value);
            }

            // Own process group so the terminal and its children can be
            // signalled together
            cmd.process_group(0);

            cmd.stdin(Stdio::null());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());

            let child = cmd.spawn()?;

            if let Some(pid) = child.id() {
                info!(pid = %pid, command = %command, args = ?args, "Spawned Unix process");
            }

            Ok(Box::new(UnixProcessHandle::new(
                child,
                command.to_string(),
                args.to_vec(),
            )))
        }
    }

    #[async_trait]
    impl ProcessTermination for UnixProcessManager {
        async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
            let nix_pid = NixPid::from_raw(pid.0 as i32);

            match signal::kill(nix_pid, Signal::SIGTERM) {
                Ok(()) => {
                    info!(pid = %pid, "Sent SIGTERM to process");
                    TerminationResult::Success
                }
                Err(nix::errno::Errno::ESRCH) => {
                    debug!(pid = %pid, "Process not found (already terminated)");
                    TerminationResult::ProcessNotFound
                }
                Err(nix::errno::Errno::EPERM) => {
                    warn!(pid = %pid, "Permission denied to terminate process");
                    TerminationResult::AccessDenied
                }
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to send SIGTERM to process");
                    TerminationResult::Failed(format!("SIGTERM failed: {e}"))
                }
            }
        }

        async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
            let nix_pid = NixPid::from_raw(pid.0 as i32);

            match signal::kill(nix_pid, Signal::SIGKILL) {
                Ok(()) => {
                    info!(pid = %pid, "Sent SIGKILL to process");
                    TerminationResult::Success
                }
                Err(nix::errno::Errno::ESRCH) => TerminationResult::ProcessNotFound,
                Err(nix::errno::Errno::EPERM) => TerminationResult::AccessDenied,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to send SIGKILL to process");
                    TerminationResult::Failed(format!("SIGKILL failed: {e}"))
                }
            }
        }

        async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>> {
            let mut system = self.system.lock().unwrap();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::default(),
            );

            let mut children = Vec::new();
            Self::find_children_recursive(&system, pid.0, &mut children);

            Ok(children.into_iter().map(ProcessId::from).collect())
        }

        async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult {
            info!(root_pid = %root_pid, "Terminating process tree");

            // The terminal was spawned as its own process group leader, so a
            // group signal usually covers the whole tree in one step.
            let pgid = NixPid::from_raw(root_pid.0 as i32);
            match signal::killpg(pgid, Signal::SIGTERM) {
                Ok(()) => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    match signal::killpg(pgid, Signal::SIGKILL) {
                        Ok(()) | Err(nix::errno::Errno::ESRCH) => {
                            return TerminationResult::Success;
                        }
                        Err(e) => {
                            warn!(root_pid = %root_pid, error = %e, "Group SIGKILL failed");
                        }
                    }
                }
                Err(nix::errno::Errno::ESRCH) => return TerminationResult::ProcessNotFound,
                Err(e) => {
                    debug!(root_pid = %root_pid, error = %e, "Group signal failed, walking tree");
                }
            }

            // Fallback: enumerate descendants and terminate bottom-up
            let children = match self.find_child_processes(root_pid).await {
                Ok(children) => children,
                Err(e) => {
                    return TerminationResult::Failed(format!("Failed to enumerate children: {e}"));
                }
            };

            for child_pid in children.iter().rev() {
                match self.terminate_single_process(*child_pid).await {
                    TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                    result => {
                        warn!(pid = %child_pid, result = ?result, "Failed to terminate child process");
                    }
                }
            }

            self.terminate_single_process(root_pid).await
        }

        async fn is_alive(&self, pid: ProcessId) -> bool {
            let nix_pid = NixPid::from_raw(pid.0 as i32);
            signal::kill(nix_pid, None).is_ok()
        }
    }

    impl TerminalProcessManager for UnixProcessManager {
        fn platform_name(&self) -> &'static str {
            "unix"
        }
    }
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::{UnixProcessHandle, UnixProcessManager};

// Provide stub implementations for non-Unix systems so the workspace
// still type-checks there
#[cfg(not(unix))]
pub struct UnixProcessHandle;

#[cfg(not(unix))]
pub struct UnixProcessManager;

#[cfg(not(unix))]
impl UnixProcessManager {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(unix))]
impl Default for UnixProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
