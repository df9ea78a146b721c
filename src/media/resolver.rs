//! External video download
//!
//! A [`MediaResolver`] turns one video identifier into a local file. The
//! provided implementation drives the `yt-dlp` command line tool and
//! classifies its output into the three outcomes the index understands.

use crate::config::MediaConfig;
use crate::media::extract::canonical_url;
use crate::ArchiveError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Output fragments that mark a video as permanently unavailable
///
/// Matched case-insensitively against the tool's combined output.
pub const UNAVAILABLE_PHRASES: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video has been removed",
    "content is not available",
    "copyright claim",
    "account associated with this video has been terminated",
    "violates YouTube's Terms of Service",
    "been removed by the uploader",
    "confirm your age",
    "Join this channel to get access",
    "members-only content",
    "is not available in your country",
    "video is no longer available",
];

/// Result of one resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The video is on disk
    Downloaded {
        path: Option<PathBuf>,
        title: Option<String>,
    },

    /// Permanently unavailable; carries the matched phrase
    Unavailable(String),

    /// Any other failure, including timeouts and spawn errors
    Failed(String),
}

/// Downloads one video into a directory
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, video_id: &str, output_dir: &Path) -> ResolveOutcome;
}

/// [`MediaResolver`] backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    binary: String,
    format: String,
    rate_limit: Option<String>,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            format: config.format.clone(),
            rate_limit: config.rate_limit.clone().filter(|rate| !rate.trim().is_empty()),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Command line arguments for downloading `video_id` into `output_dir`
    pub fn build_args(&self, video_id: &str, output_dir: &Path) -> Vec<String> {
        let template = output_dir.join("%(id)s - %(title).80s.%(ext)s");

        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-overwrites",
            "--write-thumbnail",
            "--convert-thumbnails",
            "jpg",
            "--embed-thumbnail",
            "--add-metadata",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("--format".to_string());
        args.push(self.format.clone());
        args.push("--output".to_string());
        args.push(template.to_string_lossy().to_string());
        args.extend(
            [
                "--retries",
                "3",
                "--socket-timeout",
                "30",
                "--no-warnings",
                "--no-simulate",
                "--print",
                "after_move:%(filepath)s\t%(title)s",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        if let Some(rate) = &self.rate_limit {
            args.push("--limit-rate".to_string());
            args.push(rate.clone());
        }

        args.push(canonical_url(video_id));
        args
    }

    /// Checks that the executable can be started; returns its version
    pub async fn check_available(&self) -> crate::Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ArchiveError::CollaboratorUnavailable(format!("{}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            return Err(ArchiveError::CollaboratorUnavailable(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, video_id: &str, output_dir: &Path) -> ResolveOutcome {
        let args = self.build_args(video_id, output_dir);
        debug!(binary = %self.binary, video = video_id, "Starting download");

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => ResolveOutcome::Failed(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            )),
            Ok(Err(e)) => ResolveOutcome::Failed(format!("failed to start {}: {}", self.binary, e)),
            Ok(Ok(output)) => classify_output(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
        }
    }
}

/// Classifies a finished download from its exit status and output
///
/// # Examples
///
/// ```
/// use forum_archiver::media::{classify_output, ResolveOutcome};
///
/// let outcome = classify_output(false, "", "ERROR: [youtube] abc: Private video. Sign in");
/// assert_eq!(outcome, ResolveOutcome::Unavailable("Private video".to_string()));
/// ```
pub fn classify_output(success: bool, stdout: &str, stderr: &str) -> ResolveOutcome {
    if success {
        let printed = stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .last();

        let (path, title) = match printed.map(|line| line.split_once('\t')) {
            Some(Some((path, title))) => (Some(path.trim()), Some(title.trim())),
            Some(None) => (printed.map(str::trim), None),
            None => (None, None),
        };

        return ResolveOutcome::Downloaded {
            path: path.filter(|p| !p.is_empty()).map(PathBuf::from),
            title: title.filter(|t| !t.is_empty()).map(str::to_string),
        };
    }

    let combined = format!("{}\n{}", stdout, stderr).to_lowercase();
    if let Some(phrase) = UNAVAILABLE_PHRASES
        .iter()
        .find(|phrase| combined.contains(&phrase.to_lowercase()))
    {
        return ResolveOutcome::Unavailable(phrase.to_string());
    }

    let reason = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("download failed without output");
    ResolveOutcome::Failed(reason.to_string())
}
