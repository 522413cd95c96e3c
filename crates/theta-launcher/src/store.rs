use std::path::{Path, PathBuf};
use theta_launcher_core::{Credentials, LauncherError};
use tracing::debug;

/// File-backed persistence for the ThetaData credentials.
///
/// The store is a small JSON document next to the launcher (the classic
/// `config.json`); a missing file simply loads as empty credentials.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted credentials; a missing file yields empty credentials,
    /// malformed content is a configuration error.
    pub fn load(&self) -> Result<Credentials, LauncherError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No credential file yet");
            return Ok(Credentials::default());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| {
            LauncherError::Configuration(format!(
                "malformed credential file {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Persist credentials, creating parent directories as needed
    pub fn save(&self, credentials: &Credentials) -> Result<(), LauncherError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let raw = serde_json::to_string_pretty(credentials)
            .map_err(|e| LauncherError::Configuration(format!("failed to encode credentials: {e}")))?;
        std::fs::write(&self.path, raw)?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("config.json"));
        let creds = store.load().unwrap();
        assert!(creds.is_incomplete());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("config.json"));

        let creds = Credentials::new("user@example.com", "hunter2");
        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), creds);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested/deeper/config.json"));
        store.save(&Credentials::new("u", "p")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = CredentialStore::new(path);
        let result = store.load();
        assert!(matches!(result, Err(LauncherError::Configuration(_))));
    }
}
