//! Media fetcher boundary: yt-dlp metadata probe and audio download.
//!
//! Invoked only by the front-ends; the engine consumes the resulting local
//! path and metadata tuple.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

use crate::service::cancel::CancelToken;

use super::process::{run_command, CommandError};

/// Extensions yt-dlp may produce for a best-audio download.
const AUDIO_EXTENSIONS: [&str; 6] = ["m4a", "webm", "opus", "mp3", "aac", "ogg"];

/// Errors from fetching remote media.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("yt-dlp failed: {0}")]
    Tool(String),
    #[error("Could not parse yt-dlp metadata: {0}")]
    Metadata(String),
    #[error("Downloaded audio file not found for video {0}")]
    MissingDownload(String),
    #[error("Fetch cancelled")]
    Cancelled,
}

/// Metadata extracted from the yt-dlp JSON probe.
#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub uploader: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub duration: f64,
}

impl YoutubeMetadata {
    /// Artist fallback chain: explicit artist, then channel, then uploader.
    pub fn resolved_artist(&self) -> &str {
        for candidate in [&self.artist, &self.channel, &self.uploader] {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        "Unknown Artist"
    }
}

/// Fetch the best audio stream for a video URL into `temp_dir`.
///
/// Returns the downloaded file (still in its native container; the caller
/// runs it through the transcoder) and the probed metadata.
pub fn fetch_audio(
    url: &str,
    temp_dir: &Path,
    cancel: &CancelToken,
) -> Result<(PathBuf, YoutubeMetadata), FetchError> {
    if url.trim().is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    fs::create_dir_all(temp_dir)
        .map_err(|err| FetchError::Tool(format!("creating {}: {err}", temp_dir.display())))?;

    let metadata = probe_metadata(url, cancel)?;
    tracing::info!(
        "Fetched metadata for {}: {} by {}",
        metadata.id,
        metadata.title,
        metadata.resolved_artist()
    );

    let template = temp_dir.join(format!("{}.%(ext)s", metadata.id));
    let mut command = Command::new("yt-dlp");
    command
        .args(["-f", "ba"])
        .arg("--no-warnings")
        .arg("--no-playlist")
        .arg("-o")
        .arg(&template)
        .arg(url);
    let output = run_command(&mut command, cancel).map_err(map_command_error)?;
    if !output.status.success() {
        return Err(FetchError::Tool(format!(
            "download exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    for ext in AUDIO_EXTENSIONS {
        let candidate = temp_dir.join(format!("{}.{ext}", metadata.id));
        if candidate.is_file() {
            return Ok((candidate, metadata));
        }
    }
    Err(FetchError::MissingDownload(metadata.id))
}

fn probe_metadata(url: &str, cancel: &CancelToken) -> Result<YoutubeMetadata, FetchError> {
    let mut command = Command::new("yt-dlp");
    command
        .arg("-J")
        .arg("--no-warnings")
        .arg("--no-playlist")
        .arg(url);
    let output = run_command(&mut command, cancel).map_err(map_command_error)?;
    if !output.status.success() {
        return Err(FetchError::Tool(format!(
            "metadata probe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let metadata: YoutubeMetadata = serde_json::from_slice(&output.stdout)
        .map_err(|err| FetchError::Metadata(err.to_string()))?;
    if metadata.id.trim().is_empty() {
        return Err(FetchError::Metadata("missing video id".to_string()));
    }
    if metadata.title.trim().is_empty() {
        return Err(FetchError::Metadata("missing title".to_string()));
    }
    Ok(metadata)
}

fn map_command_error(err: CommandError) -> FetchError {
    match err {
        CommandError::Cancelled => FetchError::Cancelled,
        other => FetchError::Tool(other.to_string()),
    }
}
