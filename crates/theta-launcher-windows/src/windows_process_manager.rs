use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;
use theta_launcher_core::{
    ProcessHandle, ProcessId, ProcessLifecycle, ProcessTermination, TerminalProcessManager,
    TerminationResult,
};

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use std::process::Stdio;
    use sysinfo::System;
    use tokio::process::{Child, ChildStderr, ChildStdout, Command};
    use tracing::{debug, info, warn};

    /// Windows-specific process handle implementation
    pub struct WindowsProcessHandle {
        child: Child,
        command: String,
        args: Vec<String>,
    }

    impl WindowsProcessHandle {
        pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
            Self {
                child,
                command,
                args,
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for WindowsProcessHandle {
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
                let mut system = System::new();
                system.refresh_processes_specifics(
                    sysinfo::ProcessesToUpdate::All,
                    true,
                    sysinfo::ProcessRefreshKind::default(),
                );
                system.processes().keys().any(|p| p.as_u32() == pid.0)
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

    /// Windows-specific process manager built on taskkill.
    ///
    /// Java processes on Windows routinely outlive a plain handle kill, so
    /// termination goes through taskkill, escalating to /F and /T for trees.
    pub struct WindowsProcessManager {
        system: std::sync::Mutex<System>,
    }

    impl WindowsProcessManager {
        pub fn new() -> Self {
            Self {
                system: std::sync::Mutex::new(System::new()),
            }
        }

        /// Use taskkill to terminate a single process
        async fn taskkill(&self, pid: u32, force: bool) -> Result<bool> {
            let pid_string = pid.to_string();
            let mut args = vec!["/PID", pid_string.as_str()];
            if force {
                args.push("/F");
            }

            let output = Command::new("taskkill").args(&args).output().await?;
            Ok(output.status.success())
        }

        /// Use taskkill with /T to terminate a process tree
        async fn taskkill_tree(&self, pid: u32) -> Result<bool> {
            let output = Command::new("taskkill")
                .args(["/F", "/T", "/PID", &pid.to_string()])
                .output()
                .await?;
            Ok(output.status.success())
        }

        fn pid_exists(pid: u32) -> bool {
            let mut system = System::new();
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::default(),
            );
            system.processes().keys().any(|p| p.as_u32() == pid)
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

    impl Default for WindowsProcessManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLifecycle for WindowsProcessManager {
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

            // CREATE_NO_WINDOW (0x08000000) - no console window for the
            // background terminal process
            cmd.creation_flags(0x08000000);

            cmd.stdin(Stdio::null());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());

            let child = cmd.spawn()?;

            if let Some(pid) = child.id() {
                info!(pid = %pid, command = %command, args = ?args, "Spawned Windows process");
            }

            Ok(Box::new(WindowsProcessHandle::new(
                child,
                command.to_string(),
                args.to_vec(),
            )))
        }
    }

    #[async_trait]
    impl ProcessTermination for WindowsProcessManager {
        async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
            match self.taskkill(pid.0, false).await {
                Ok(true) => {
                    info!(pid = %pid, "Sent graceful termination to process");
                    TerminationResult::Success
                }
                Ok(false) => {
                    debug!(pid = %pid, "Process not found for graceful termination");
                    TerminationResult::ProcessNotFound
                }
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to gracefully terminate process");
                    TerminationResult::Failed(format!("Graceful termination failed: {e}"))
                }
            }
        }

        async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
            match self.taskkill(pid.0, true).await {
                Ok(true) => {
                    info!(pid = %pid, "Force killed process");
                    TerminationResult::Success
                }
                Ok(false) => TerminationResult::ProcessNotFound,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to force kill process");
                    TerminationResult::Failed(format!("Force kill failed: {e}"))
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

            match self.taskkill_tree(root_pid.0).await {
                Ok(true) => TerminationResult::Success,
                Ok(false) => {
                    debug!(root_pid = %root_pid, "Process tree not found");
                    TerminationResult::ProcessNotFound
                }
                Err(e) => {
                    warn!(root_pid = %root_pid, error = %e, "taskkill /T failed, walking tree");

                    // Fallback: enumerate descendants and kill them bottom-up
                    let children = match self.find_child_processes(root_pid).await {
                        Ok(children) => children,
                        Err(e) => {
                            return TerminationResult::Failed(format!(
                                "Failed to enumerate children: {e}"
                            ));
                        }
                    };

                    for child_pid in children.iter().rev() {
                        match self.force_kill(*child_pid).await {
                            TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                            result => {
                                warn!(pid = %child_pid, result = ?result, "Failed to terminate child process");
                            }
                        }
                    }

                    self.force_kill(root_pid).await
                }
            }
        }

        async fn is_alive(&self, pid: ProcessId) -> bool {
            Self::pid_exists(pid.0)
        }
    }

    impl TerminalProcessManager for WindowsProcessManager {
        fn platform_name(&self) -> &'static str {
            "windows"
        }
    }
}

// Re-export the Windows implementation when on Windows systems
#[cfg(windows)]
pub use windows_impl::{WindowsProcessHandle, WindowsProcessManager};

// Provide stub implementations for non-Windows systems so the workspace
// still type-checks there
#[cfg(not(windows))]
pub struct WindowsProcessHandle;

#[cfg(not(windows))]
pub struct WindowsProcessManager;

#[cfg(not(windows))]
impl WindowsProcessManager {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl Default for WindowsProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn spawn_captures_stdout() {
        let manager = WindowsProcessManager::new();
        let mut handle = manager
            .spawn_process(
                "cmd",
                &["/C".to_string(), "echo hello".to_string()],
                None,
                &HashMap::new(),
            )
            .await
            .unwrap();

        let mut stdout = handle.take_stdout().expect("stdout should be piped");
        let mut output = String::new();
        stdout.read_to_string(&mut output).await.unwrap();
        assert_eq!(output.trim(), "hello");

        let status = handle.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn force_kill_stops_pinging_process() {
        let manager = WindowsProcessManager::new();
        let mut handle = manager
            .spawn_process(
                "ping",
                &["127.0.0.1".to_string(), "-n".to_string(), "30".to_string()],
                None,
                &HashMap::new(),
            )
            .await
            .unwrap();

        let pid = handle.pid().unwrap();
        let result = manager.force_kill(pid).await;
        assert_eq!(result, TerminationResult::Success);

        let status = handle.wait().await.unwrap();
        assert!(!status.success());
    }
}
