use std::sync::Arc;

/// Caller-registered consumer of streamed output lines.
///
/// Invoked once per line, in emission order, for the lifetime of a run.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Caller-registered consumer of the exit event.
///
/// Invoked exactly once per run with the exit code (None when the process
/// was signal-terminated) and whether a stop had been requested.
pub type ExitSink = Arc<dyn Fn(Option<i32>, bool) + Send + Sync>;

/// Progress of a JAR download, delivered to the progress callback after
/// every received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received so far
    pub downloaded: u64,
    /// Total size reported by the server, if known
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completion percentage, or None when the total size is unknown
    pub fn percentage(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => {
                Some(((self.downloaded.saturating_mul(100)) / total).min(100) as u8)
            }
            _ => None,
        }
    }
}

/// Caller-registered consumer of download progress updates
pub type ProgressSink = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_with_known_total() {
        let progress = DownloadProgress {
            downloaded: 50,
            total: Some(200),
        };
        assert_eq!(progress.percentage(), Some(25));
    }

    #[test]
    fn percentage_is_clamped() {
        // Servers occasionally under-report content length
        let progress = DownloadProgress {
            downloaded: 300,
            total: Some(200),
        };
        assert_eq!(progress.percentage(), Some(100));
    }

    #[test]
    fn percentage_without_total() {
        let progress = DownloadProgress {
            downloaded: 50,
            total: None,
        };
        assert_eq!(progress.percentage(), None);

        let progress = DownloadProgress {
            downloaded: 50,
            total: Some(0),
        };
        assert_eq!(progress.percentage(), None);
    }
}
