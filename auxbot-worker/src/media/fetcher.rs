//! Materializes one track to a local file before playback.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, warn};
use uuid::Uuid;

use auxbot_common::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download `media_ref` and return the path of the local file. The
    /// caller owns the file and must remove it when done with it.
    async fn fetch(&self, media_ref: &str) -> Result<PathBuf, Error>;
}

/// Fetches best-available audio with yt-dlp, normalized to 48kHz stereo
/// opus at 96k.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: String,
    media_dir: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            media_dir: media_dir.into(),
        }
    }

    /// Unique per call; never derived from the media ref, so the same track
    /// can be fetched twice concurrently.
    fn output_path(&self) -> PathBuf {
        self.media_dir.join(format!("audio-{}.opus", Uuid::new_v4()))
    }

    fn args(output: &Path, media_ref: &str) -> Vec<String> {
        vec![
            "-o".into(),
            output.to_string_lossy().into_owned(),
            "-f".into(),
            "bestaudio/best".into(),
            "--no-playlist".into(),
            "--quiet".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            "opus".into(),
            "--audio-quality".into(),
            "0".into(),
            "--postprocessor-args".into(),
            "-ar 48000 -ac 2 -b:a 96k".into(),
            media_ref.to_string(),
        ]
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, media_ref: &str) -> Result<PathBuf, Error> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| Error::Fetch(format!("cannot create {}: {}", self.media_dir.display(), e)))?;

        let output = self.output_path();
        debug!("Fetching {} into {}", media_ref, output.display());

        let result = Command::new(&self.program)
            .args(Self::args(&output, media_ref))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Fetch(format!("yt-dlp process error: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            if !stderr.trim().is_empty() {
                error!("yt-dlp error: {}", stderr.trim());
            }
            // A partial file may have been left behind.
            remove_media_file(&output);
            return Err(match result.status.code() {
                Some(code) => Error::Fetch(format!("yt-dlp exited with code {}", code)),
                None => Error::Fetch("yt-dlp terminated by signal".into()),
            });
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(Error::Fetch("Audio file was not created.".into()));
        }

        Ok(output)
    }
}

/// Best-effort delete. A leaked temp file must never block the next track.
pub fn remove_media_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to delete temp file {}: {}", path.display(), e);
        }
    }
}
