use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use backon::{ExponentialBuilder, Retryable};
use futures::StreamExt;
use theta_launcher_core::{
    DownloadProgress, LauncherError, ProgressSink, RetryConfig, TerminalConfig,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Downloads the terminal JAR when it is missing.
///
/// The body is streamed to a `.part` file next to the target and renamed
/// into place only after the whole download succeeded, so an interrupted
/// download never leaves a truncated JAR behind. Transient failures are
/// retried with exponential backoff per [`RetryConfig`].
pub struct JarDownloader {
    client: reqwest::Client,
    url: String,
    target: PathBuf,
    retry: RetryConfig,
    in_progress: Arc<AtomicBool>,
}

impl JarDownloader {
    pub fn new(config: &TerminalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.download_url.clone(),
            target: config.jar_path.clone(),
            retry: config.retry_config.clone(),
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a download is currently running
    pub fn is_downloading(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Path the JAR is downloaded to
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Download the JAR, reporting progress after every received chunk.
    ///
    /// Rejects a second concurrent download of the same target with
    /// `DownloadInProgress`.
    pub async fn download(&self, progress: Option<ProgressSink>) -> Result<(), LauncherError> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return Err(LauncherError::DownloadInProgress);
        }

        info!(url = %self.url, target = %self.target.display(), "Downloading terminal JAR");

        let mut backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry.min_delay())
            .with_max_delay(self.retry.max_delay())
            .with_max_times(self.retry.max_attempts.saturating_sub(1) as usize);
        if self.retry.jitter {
            backoff = backoff.with_jitter();
        }

        let fetch = || async { self.fetch_once(progress.as_ref()).await };
        let result = fetch
            .retry(backoff)
            .when(|e: &LauncherError| e.is_retryable())
            .notify(|err, dur| {
                warn!(error = %err, retry_in = ?dur, "Download attempt failed, retrying");
            })
            .await;

        self.in_progress.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => info!(target = %self.target.display(), "Download completed"),
            Err(e) => warn!(error = %e, "Download failed"),
        }
        result
    }

    async fn fetch_once(&self, progress: Option<&ProgressSink>) -> Result<(), LauncherError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LauncherError::DownloadFailed(e.to_string()))?;

        let total = response.content_length();
        let part = part_path(&self.target);

        if let Some(parent) = part.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::File::create(&part).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LauncherError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(sink) = progress {
                sink(DownloadProgress { downloaded, total });
            }
        }

        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part, &self.target).await?;

        // Final update so the caller can close out its progress display even
        // when the last chunk landed exactly on the total
        if let (Some(sink), Some(total)) = (progress, total) {
            sink(DownloadProgress {
                downloaded: total,
                total: Some(total),
            });
        }

        Ok(())
    }
}

/// `<target>.part`, keeping the original file name intact
fn part_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("ThetaTerminal.jar")),
            PathBuf::from("ThetaTerminal.jar.part")
        );
        assert_eq!(
            part_path(Path::new("/opt/theta/ThetaTerminal.jar")),
            PathBuf::from("/opt/theta/ThetaTerminal.jar.part")
        );
    }

    #[tokio::test]
    async fn concurrent_downloads_are_rejected() {
        let config = TerminalConfig::builder()
            .jar_path("ThetaTerminal.jar")
            .build()
            .unwrap();
        let downloader = JarDownloader::new(&config);

        downloader.in_progress.store(true, Ordering::SeqCst);
        let result = downloader.download(None).await;
        assert!(matches!(result, Err(LauncherError::DownloadInProgress)));
        assert!(downloader.is_downloading());
    }
}
