use crate::download::JarDownloader;
use crate::platform;
use crate::store::CredentialStore;
use crate::supervisor::TerminalSupervisor;
use theta_launcher_core::{
    Credentials, LauncherError, ProcessId, ProcessState, ProgressSink, TerminalConfig,
    TerminalProcessManager,
};
use tracing::info;

/// High-level launcher tying the collaborators together: credential
/// persistence, JAR download, and the process supervisor.
pub struct TerminalLauncher {
    config: TerminalConfig,
    store: CredentialStore,
    downloader: JarDownloader,
    supervisor: TerminalSupervisor,
}

impl TerminalLauncher {
    pub fn new(config: TerminalConfig) -> Self {
        let manager = platform::create_process_manager();
        info!(platform = manager.platform_name(), "Created terminal launcher");

        Self {
            store: CredentialStore::new(&config.credentials_file),
            downloader: JarDownloader::new(&config),
            supervisor: TerminalSupervisor::new(manager, config.grace_period()),
            config,
        }
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Direct access to the supervisor for sink registration and state
    pub fn supervisor(&self) -> &TerminalSupervisor {
        &self.supervisor
    }

    /// Credentials persisted from a previous run, if any
    pub fn stored_credentials(&self) -> Result<Credentials, LauncherError> {
        self.store.load()
    }

    /// Whether the terminal JAR is already on disk
    pub fn jar_present(&self) -> bool {
        self.config.jar_path.exists()
    }

    /// Whether a JAR download is currently running
    pub fn is_downloading(&self) -> bool {
        self.downloader.is_downloading()
    }

    /// Download the JAR when it is missing. Returns true when a download
    /// actually ran.
    pub async fn ensure_jar(&self, progress: Option<ProgressSink>) -> Result<bool, LauncherError> {
        if self.jar_present() {
            return Ok(false);
        }
        self.downloader.download(progress).await?;
        Ok(true)
    }

    /// Persist the credentials and start the terminal.
    ///
    /// Fails with `NotFound` when the JAR is missing; use
    /// [`start_with_download`](Self::start_with_download) to fetch it first.
    pub async fn start(&self, credentials: &Credentials) -> Result<ProcessId, LauncherError> {
        if credentials.is_incomplete() {
            return Err(LauncherError::Configuration(
                "both username and password are required".to_string(),
            ));
        }

        self.store.save(credentials)?;

        if !self.jar_present() {
            return Err(LauncherError::NotFound(self.config.jar_path.clone()));
        }
        if self.is_downloading() {
            return Err(LauncherError::DownloadInProgress);
        }

        self.supervisor
            .start(
                &self.config.java_binary,
                &self
                    .config
                    .terminal_args(&credentials.username, &credentials.password),
                self.config.working_directory.as_deref(),
                &self.config.env,
            )
            .await
    }

    /// Download the JAR when missing, then start the terminal
    pub async fn start_with_download(
        &self,
        credentials: &Credentials,
        progress: Option<ProgressSink>,
    ) -> Result<ProcessId, LauncherError> {
        if self.ensure_jar(progress).await? {
            info!("Terminal JAR downloaded, starting terminal");
        }
        self.start(credentials).await
    }

    /// Stop the terminal; a no-op when it is not running
    pub async fn stop(&self) -> Result<(), LauncherError> {
        self.supervisor.stop().await
    }

    /// Current lifecycle state of the terminal process
    pub fn state(&self) -> ProcessState {
        self.supervisor.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_rejects_incomplete_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = TerminalConfig::builder()
            .jar_path(dir.path().join("ThetaTerminal.jar"))
            .credentials_file(dir.path().join("config.json"))
            .build()
            .unwrap();

        let launcher = TerminalLauncher::new(config);
        let result = launcher.start(&Credentials::new("user", "")).await;
        assert!(matches!(result, Err(LauncherError::Configuration(_))));
        assert_eq!(launcher.state(), ProcessState::NotStarted);
    }

    #[tokio::test]
    async fn start_without_jar_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("ThetaTerminal.jar");
        let config = TerminalConfig::builder()
            .jar_path(&jar)
            .credentials_file(dir.path().join("config.json"))
            .build()
            .unwrap();

        let launcher = TerminalLauncher::new(config);
        let result = launcher.start(&Credentials::new("user", "pass")).await;
        match result {
            Err(LauncherError::NotFound(path)) => assert_eq!(path, jar),
            other => panic!("expected NotFound, got {other:?}"),
        }

        // Credentials were persisted before the JAR check, like the
        // original save-then-launch flow
        assert_eq!(
            launcher.stored_credentials().unwrap(),
            Credentials::new("user", "pass")
        );
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = TerminalConfig::builder()
            .jar_path(dir.path().join("ThetaTerminal.jar"))
            .credentials_file(dir.path().join("config.json"))
            .build()
            .unwrap();

        let launcher = TerminalLauncher::new(config);
        launcher.stop().await.unwrap();
        assert_eq!(launcher.state(), ProcessState::NotStarted);
    }
}
