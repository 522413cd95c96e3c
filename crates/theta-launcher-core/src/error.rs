use std::path::PathBuf;
use thiserror::Error;

/// Core error types for launcher operations
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("executable not found: {0}")]
    NotFound(PathBuf),

    #[error("terminal is already running")]
    AlreadyRunning,

    #[error("terminal is not running")]
    NotRunning,

    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("terminal exited unexpectedly (exit code {code:?})")]
    UnexpectedExit { code: Option<i32> },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("a download is already in progress")]
    DownloadInProgress,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LauncherError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LauncherError::DownloadFailed(_) | LauncherError::Io(_)
        )
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            LauncherError::Configuration(_) | LauncherError::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LauncherError::NotFound(PathBuf::from("ThetaTerminal.jar"));
        assert!(format!("{error}").contains("ThetaTerminal.jar"));

        let error = LauncherError::UnexpectedExit { code: Some(1) };
        assert!(format!("{error}").contains("unexpectedly"));

        let error = LauncherError::SpawnFailed("permission denied".to_string());
        assert!(format!("{error}").contains("permission denied"));
    }

    #[test]
    fn test_error_categorization() {
        // Retryable errors
        assert!(LauncherError::DownloadFailed("timeout".to_string()).is_retryable());

        // Non-retryable errors
        assert!(!LauncherError::AlreadyRunning.is_retryable());
        assert!(!LauncherError::Configuration("bad jar path".to_string()).is_retryable());
        assert!(!LauncherError::DownloadInProgress.is_retryable());

        // Permanent failures
        assert!(LauncherError::NotFound(PathBuf::from("x.jar")).is_permanent());
        assert!(!LauncherError::AlreadyRunning.is_permanent());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: LauncherError = io.into();
        assert!(matches!(error, LauncherError::Io(_)));
        assert!(error.is_retryable());
    }
}
