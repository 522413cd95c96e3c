use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use theta_launcher_core::{
    ExitSink, LauncherError, OutputSink, ProcessHandle, ProcessId, ProcessState,
    TerminalProcessManager,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a finished run, kept until the next start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, None when the process was signal-terminated
    pub code: Option<i32>,
    /// False exactly for unexpected exits: a non-zero or signal-terminated
    /// status while no stop was requested
    pub was_expected: bool,
}

/// Supervises the lifecycle of exactly one terminal process.
///
/// At most one run is live at a time; starting while a run is live is
/// rejected with [`LauncherError::AlreadyRunning`]. Output lines are relayed
/// to the registered sink in emission order by a per-run monitor task, and
/// the exit sink fires exactly once per run, whether the exit was requested
/// through [`stop`](Self::stop) or spontaneous.
pub struct TerminalSupervisor {
    manager: Arc<dyn TerminalProcessManager>,
    grace_period: Duration,
    shared: Arc<Shared>,
    run: tokio::sync::Mutex<Option<ActiveRun>>,
}

struct Shared {
    state_tx: watch::Sender<ProcessState>,
    output: StdMutex<Vec<String>>,
    output_sink: StdMutex<Option<OutputSink>>,
    exit_sink: StdMutex<Option<ExitSink>>,
    last_exit: StdMutex<Option<ExitInfo>>,
}

struct ActiveRun {
    pid: ProcessId,
    stop_requested: Arc<AtomicBool>,
    cancel: CancellationToken,
    monitor: tokio::task::JoinHandle<()>,
}

impl TerminalSupervisor {
    pub fn new(manager: Arc<dyn TerminalProcessManager>, grace_period: Duration) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::NotStarted);
        Self {
            manager,
            grace_period,
            shared: Arc::new(Shared {
                state_tx,
                output: StdMutex::new(Vec::new()),
                output_sink: StdMutex::new(None),
                exit_sink: StdMutex::new(None),
                last_exit: StdMutex::new(None),
            }),
            run: tokio::sync::Mutex::new(None),
        }
    }

    /// Register the sink invoked once per output line, in emission order.
    /// A later registration replaces the earlier one.
    pub fn on_output<F>(&self, sink: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.shared.output_sink.lock().unwrap() = Some(Arc::new(sink));
    }

    /// Register the sink invoked exactly once per run when the process
    /// terminates. A later registration replaces the earlier one.
    pub fn on_exit<F>(&self, sink: F)
    where
        F: Fn(Option<i32>, bool) + Send + Sync + 'static,
    {
        *self.shared.exit_sink.lock().unwrap() = Some(Arc::new(sink));
    }

    /// Current lifecycle state; never blocks.
    pub fn state(&self) -> ProcessState {
        *self.shared.state_tx.borrow()
    }

    /// Snapshot of the current run's accumulated output lines.
    /// Cleared on the next start.
    pub fn output_lines(&self) -> Vec<String> {
        self.shared.output.lock().unwrap().clone()
    }

    /// Outcome of the most recent finished run, if any
    pub fn last_exit(&self) -> Option<ExitInfo> {
        *self.shared.last_exit.lock().unwrap()
    }

    /// PID of the live run, or `NotRunning`
    pub async fn running_pid(&self) -> Result<ProcessId, LauncherError> {
        let run = self.run.lock().await;
        match run.as_ref() {
            Some(active) if self.state().is_running() => Ok(active.pid),
            _ => Err(LauncherError::NotRunning),
        }
    }

    /// Start the terminal process.
    ///
    /// Fails with `NotFound` when `command` names a path that does not
    /// exist, `AlreadyRunning` when a run is live, and `SpawnFailed` for
    /// other OS-level spawn errors. On success the state is `Running`, the
    /// output buffer has been cleared, and the monitor task is delivering
    /// lines to the registered sink.
    pub async fn start(
        &self,
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<ProcessId, LauncherError> {
        let mut run = self.run.lock().await;

        if self.state().is_running() {
            return Err(LauncherError::AlreadyRunning);
        }

        // Reap the finished monitor of the previous run, if any
        if let Some(prev) = run.take() {
            prev.cancel.cancel();
            let _ = prev.monitor.await;
        }

        // Explicit paths are checked up front; bare command names are left
        // to PATH resolution at spawn time
        let command_path = Path::new(command);
        if command_path.components().count() > 1 && !command_path.exists() {
            return Err(LauncherError::NotFound(command_path.to_path_buf()));
        }

        let mut handle = self
            .manager
            .spawn_process(command, args, working_dir, env)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LauncherError::NotFound(PathBuf::from(command)),
                _ => LauncherError::SpawnFailed(e.to_string()),
            })?;

        let pid = handle.pid().ok_or_else(|| {
            LauncherError::SpawnFailed("process exited before it could be observed".to_string())
        })?;

        self.shared.output.lock().unwrap().clear();
        *self.shared.last_exit.lock().unwrap() = None;

        let stdout = handle.take_stdout();
        let stderr = handle.take_stderr();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        self.shared.state_tx.send_replace(ProcessState::Running);
        info!(pid = %pid, command = %command, "Terminal process started");

        let monitor = tokio::spawn(monitor_process(
            handle,
            stdout,
            stderr,
            self.shared.clone(),
            stop_requested.clone(),
            cancel.clone(),
        ));

        *run = Some(ActiveRun {
            pid,
            stop_requested,
            cancel,
            monitor,
        });

        Ok(pid)
    }

    /// Stop the terminal process: graceful termination first, forced kill
    /// once the grace period elapses.
    ///
    /// Idempotent; stopping a supervisor that is not running is a
    /// successful no-op.
    pub async fn stop(&self) -> Result<(), LauncherError> {
        let pid = {
            let run = self.run.lock().await;
            match run.as_ref() {
                Some(active) if self.state().is_running() => {
                    // Flag before signalling so the monitor classifies the
                    // exit as expected
                    active.stop_requested.store(true, Ordering::SeqCst);
                    active.pid
                }
                _ => {
                    debug!("Stop requested but terminal not running");
                    return Ok(());
                }
            }
        };

        info!(pid = %pid, grace = ?self.grace_period, "Stopping terminal process");
        let result = self.manager.terminate_with_grace(pid, self.grace_period).await;
        if !result.is_terminal() {
            warn!(pid = %pid, result = ?result, "Termination reported failure, waiting for exit anyway");
        }

        // The monitor observes the exit and publishes the final state
        let deadline = self.grace_period + Duration::from_secs(10);
        let mut rx = self.shared.state_tx.subscribe();
        let wait = async {
            while rx.borrow_and_update().is_running() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };

        tokio::time::timeout(deadline, wait).await.map_err(|_| {
            LauncherError::Other(anyhow::anyhow!(
                "terminal did not exit within {deadline:?} of forced termination"
            ))
        })
    }

    /// Wait until the current run ends (or return immediately when no run
    /// is live) and report the final state.
    pub async fn wait_until_stopped(&self) -> ProcessState {
        let mut rx = self.shared.state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if !state.is_running() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

impl Drop for TerminalSupervisor {
    fn drop(&mut self) {
        // Emergency cleanup: Drop is synchronous, so signal by PID directly
        if let Ok(run) = self.run.try_lock() {
            if let Some(active) = run.as_ref() {
                if self.shared.state_tx.borrow().is_running() {
                    warn!(pid = %active.pid, "Supervisor dropped with live terminal, killing it");
                    active.cancel.cancel();

                    #[cfg(unix)]
                    {
                        use nix::sys::signal::{self, Signal};
                        use nix::unistd::Pid as NixPid;

                        let _ = signal::kill(
                            NixPid::from_raw(active.pid.0 as i32),
                            Signal::SIGKILL,
                        );
                    }

                    #[cfg(windows)]
                    {
                        let _ = std::process::Command::new("taskkill")
                            .args(["/F", "/T", "/PID", &active.pid.0.to_string()])
                            .output();
                    }
                }
            }
        }
    }
}

/// Per-run monitor: drains both output streams, waits for the exit status,
/// then publishes the final state and fires the exit sink exactly once.
async fn monitor_process(
    mut handle: Box<dyn ProcessHandle>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    shared: Arc<Shared>,
    stop_requested: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let stdout_task = stdout.map(|s| {
        tokio::spawn(relay_lines(
            BufReader::new(s).lines(),
            shared.clone(),
            cancel.clone(),
        ))
    });
    let stderr_task = stderr.map(|s| {
        tokio::spawn(relay_lines(
            BufReader::new(s).lines(),
            shared.clone(),
            cancel.clone(),
        ))
    });

    let status = handle.wait().await;

    // Both streams reach EOF once the process is gone; join the relays so
    // every line is delivered before the exit event
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let code = match &status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "Failed to observe terminal exit status");
            None
        }
    };
    // An exit is expected when stop was requested or the process finished
    // cleanly on its own; everything else is an unexpected exit
    let clean = matches!(&status, Ok(status) if status.success());
    let was_expected = stop_requested.load(Ordering::SeqCst) || clean;
    let final_state = if was_expected {
        ProcessState::Stopped
    } else {
        ProcessState::Failed
    };

    *shared.last_exit.lock().unwrap() = Some(ExitInfo { code, was_expected });
    info!(code = ?code, expected = was_expected, state = ?final_state, "Terminal process exited");

    // Fire the exit sink before publishing the state so anyone woken by the
    // state change already sees the exit delivered
    let sink = shared.exit_sink.lock().unwrap().clone();
    if let Some(sink) = sink {
        sink(code, was_expected);
    }
    shared.state_tx.send_replace(final_state);
}

/// Relay one output stream line by line, in order, to the buffer and the
/// registered sink. A read error counts as end of stream.
async fn relay_lines<R>(mut lines: Lines<BufReader<R>>, shared: Arc<Shared>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => {
                    shared.output.lock().unwrap().push(line.clone());
                    let sink = shared.output_sink.lock().unwrap().clone();
                    if let Some(sink) = sink {
                        sink(&line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Output stream closed with an error");
                    break;
                }
            }
        }
    }
}
