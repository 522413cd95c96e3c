use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for retry logic used by the downloader
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Minimum delay between retry attempts (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum delay between retry attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum number of attempts (1 means no retries, just one attempt)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to randomize delays between attempts
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 1,
            jitter: false,
        }
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!(
                "min_delay_ms cannot be greater than max_delay_ms"
            ));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }

        if self.max_attempts > 10 {
            return Err(anyhow::anyhow!(
                "max_attempts should not exceed 10 to avoid excessive retries"
            ));
        }

        if self.max_delay_ms > 60_000 {
            return Err(anyhow::anyhow!("max_delay_ms should not exceed 60 seconds"));
        }

        Ok(())
    }

    /// Get the minimum delay as Duration
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Get the maximum delay as Duration
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Check if retries are enabled (more than 1 attempt)
    pub fn retries_enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

/// Main launcher configuration
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option))]
pub struct TerminalConfig {
    /// Path to the terminal JAR file
    pub jar_path: PathBuf,
    /// Java executable used to run the JAR
    #[builder(default = "default_java_binary()")]
    pub java_binary: String,
    /// Extra arguments appended after the credentials
    #[builder(default)]
    #[builder(setter(custom))]
    pub extra_args: Vec<String>,
    /// Environment variables for the terminal process
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    /// Working directory for the terminal process
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
    /// Grace period between the termination request and the forced kill
    #[builder(default = "default_grace_period_ms()")]
    pub grace_period_ms: u64,
    /// Where the terminal JAR is downloaded from when missing
    #[builder(default = "default_download_url()")]
    pub download_url: String,
    /// Where credentials are persisted
    #[builder(default = "default_credentials_file()")]
    pub credentials_file: PathBuf,
    #[builder(default)]
    pub retry_config: RetryConfig,
}

impl TerminalConfig {
    pub fn builder() -> TerminalConfigBuilder {
        TerminalConfigBuilder::default()
    }

    /// Grace period as a Duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Full argument vector for a run with the given credentials:
    /// `-jar <jar> <username> <password> [extra args...]`
    pub fn terminal_args(&self, username: &str, password: &str) -> Vec<String> {
        let mut args = vec![
            "-jar".to_string(),
            self.jar_path.to_string_lossy().into_owned(),
            username.to_string(),
            password.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl TerminalConfigBuilder {
    pub fn extra_args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.extra_args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// Default value functions for serde and the builder
fn default_min_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_jitter() -> bool {
    true
}
fn default_java_binary() -> String {
    "java".to_string()
}
fn default_grace_period_ms() -> u64 {
    5_000
}
fn default_download_url() -> String {
    "https://download-stable.thetadata.us/ThetaTerminal.jar".to_string()
}
fn default_credentials_file() -> PathBuf {
    PathBuf::from("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.retries_enabled());
    }

    #[test]
    fn test_no_retry_config() {
        let config = RetryConfig::no_retry();
        assert!(config.validate().is_ok());
        assert!(!config.retries_enabled());
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_invalid_retry_config() {
        let mut config = RetryConfig {
            min_delay_ms: 1000,
            max_delay_ms: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.min_delay_ms = 100;
        config.max_delay_ms = 1000;
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        config.max_attempts = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_config_serialization() {
        let config = RetryConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_terminal_config_defaults() {
        let config = TerminalConfig::builder()
            .jar_path("ThetaTerminal.jar")
            .build()
            .unwrap();

        assert_eq!(config.java_binary, "java");
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.credentials_file, PathBuf::from("config.json"));
        assert!(config.extra_args.is_empty());
        assert!(config.env.is_empty());
        assert!(config.working_directory.is_none());
        assert!(config.download_url.contains("ThetaTerminal.jar"));
    }

    #[test]
    fn test_terminal_args_include_credentials() {
        let config = TerminalConfig::builder()
            .jar_path("ThetaTerminal.jar")
            .extra_args(["--headless"])
            .build()
            .unwrap();

        let args = config.terminal_args("user", "secret");
        assert_eq!(
            args,
            vec!["-jar", "ThetaTerminal.jar", "user", "secret", "--headless"]
        );
    }

    #[test]
    fn test_builder_env_setters() {
        let config = TerminalConfig::builder()
            .jar_path("ThetaTerminal.jar")
            .env("JAVA_OPTS", "-Xmx512m")
            .env_multi([("A", "1"), ("B", "2")])
            .build()
            .unwrap();

        assert_eq!(config.env.get("JAVA_OPTS").unwrap(), "-Xmx512m");
        assert_eq!(config.env.len(), 3);
    }
}
