use std::path::{Path, PathBuf};
use theta_launcher_core::LauncherError;
use tracing::{debug, info};

/// Known MDDS server region values accepted by the terminal
pub const MDDS_REGIONS: &[&str] = &["MDDS_NJ_HOSTS", "MDDS_STAGE_HOSTS", "MDDS_DEV_HOSTS"];
/// Known FPSS server region values accepted by the terminal
pub const FPSS_REGIONS: &[&str] = &["FPSS_NJ_HOSTS", "FPSS_STAGE_HOSTS", "FPSS_DEV_HOSTS"];

const MDDS_KEY: &str = "MDDS_REGION";
const FPSS_KEY: &str = "FPSS_REGION";

/// Current server region selection from the terminal's properties file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSettings {
    pub mdds_region: String,
    pub fpss_region: String,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            mdds_region: MDDS_REGIONS[0].to_string(),
            fpss_region: FPSS_REGIONS[0].to_string(),
        }
    }
}

/// Reads and updates the terminal's own `config_0.properties` file.
///
/// The file lives under the user's home directory and is created by the
/// terminal itself on its first run; updates rewrite only the region keys
/// and leave every other line untouched.
pub struct TerminalSettings {
    properties_path: PathBuf,
}

impl TerminalSettings {
    pub fn new(properties_path: impl Into<PathBuf>) -> Self {
        Self {
            properties_path: properties_path.into(),
        }
    }

    /// Settings at the terminal's default location
    /// (`~/ThetaData/ThetaTerminal/config_0.properties`), or None when the
    /// home directory cannot be resolved.
    pub fn with_default_location() -> Option<Self> {
        Some(Self::new(config_dir()?.join("config_0.properties")))
    }

    pub fn properties_path(&self) -> &Path {
        &self.properties_path
    }

    /// Read the current region selection; a properties file that does not
    /// exist yet yields the defaults.
    pub fn read_regions(&self) -> Result<RegionSettings, LauncherError> {
        if !self.properties_path.exists() {
            debug!(path = %self.properties_path.display(), "Properties file not present yet");
            return Ok(RegionSettings::default());
        }

        let mut settings = RegionSettings::default();
        let raw = std::fs::read_to_string(&self.properties_path)?;
        for line in raw.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix(&format!("{MDDS_KEY}=")) {
                settings.mdds_region = value.to_string();
            } else if let Some(value) = line.strip_prefix(&format!("{FPSS_KEY}=")) {
                settings.fpss_region = value.to_string();
            }
        }

        Ok(settings)
    }

    /// Update the region keys in place, preserving all other lines.
    ///
    /// Fails when the properties file does not exist yet; the terminal
    /// creates it on its first run.
    pub fn update_regions(&self, settings: &RegionSettings) -> Result<(), LauncherError> {
        if !self.properties_path.exists() {
            return Err(LauncherError::Configuration(format!(
                "properties file {} not found; it is created when the terminal first runs",
                self.properties_path.display()
            )));
        }

        let raw = std::fs::read_to_string(&self.properties_path)?;
        let mut updated = String::with_capacity(raw.len());
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with(&format!("{MDDS_KEY}=")) {
                updated.push_str(&format!("{MDDS_KEY}={}", settings.mdds_region));
            } else if trimmed.starts_with(&format!("{FPSS_KEY}=")) {
                updated.push_str(&format!("{FPSS_KEY}={}", settings.fpss_region));
            } else {
                updated.push_str(line);
            }
            updated.push('\n');
        }

        std::fs::write(&self.properties_path, updated)?;
        info!(
            mdds = %settings.mdds_region,
            fpss = %settings.fpss_region,
            "Server regions updated"
        );
        Ok(())
    }
}

/// Directory holding the terminal's own configuration
pub fn config_dir() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join("ThetaData").join("ThetaTerminal"))
}

/// Directory the terminal writes its log files to
pub fn logs_dir() -> Option<PathBuf> {
    Some(config_dir()?.join("logs"))
}
