//! Append-only record of what the listener asked, and where in which episode.

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::snapshot::PodcastContext;

const SEPARATOR_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct TranscriptionLog {
    path: PathBuf,
}

impl TranscriptionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry.  Failures are logged and otherwise ignored.
    pub async fn record(&self, podcast: &PodcastContext, speech: &str) {
        if let Err(e) = self.try_record(podcast, speech).await {
            log::warn!(
                "transcription log: could not write {}: {e}",
                self.path.display()
            );
        }
    }

    async fn try_record(&self, podcast: &PodcastContext, speech: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format_entry(podcast, speech).as_bytes()).await?;
        file.flush().await
    }
}

fn format_entry(podcast: &PodcastContext, speech: &str) -> String {
    let mut entry = format!("[{}]\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
    entry.push_str(&format!("Show: {}\n", podcast.show));
    entry.push_str(&format!(
        "Episode: {}\n",
        podcast.episode.as_deref().unwrap_or("Unknown")
    ));
    entry.push_str(&format!("Timestamp: {}\n", podcast.position_label()));
    if let Some(context) = &podcast.grounding {
        entry.push_str(&format!("Podcast Context: {context}\n"));
    }
    entry.push_str(&format!("Your Speech: {speech}\n"));
    entry.push_str(&"=".repeat(SEPARATOR_WIDTH));
    entry.push_str("\n\n");
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn podcast() -> PodcastContext {
        PodcastContext {
            show: "Acquired".into(),
            episode: Some("Nvidia Part III".into()),
            position_secs: 13486.0,
            duration_secs: Some(14400.0),
            interrupt_sentence: None,
            grounding: Some("maybe up to 50%.".into()),
            rewind_window: None,
        }
    }

    #[tokio::test]
    async fn entries_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptionLog::new(dir.path().join("nested").join("transcriptions.log"));

        log.record(&podcast(), "what's the market share?").await;
        log.record(&podcast(), "ok thanks").await;

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("Show: Acquired").count(), 2);
        assert!(text.contains("Episode: Nvidia Part III"));
        assert!(text.contains("Timestamp: 224:46 / 240:00"));
        assert!(text.contains("Podcast Context: maybe up to 50%."));
        assert!(text.contains("Your Speech: what's the market share?"));
        assert!(text.contains(&"=".repeat(60)));
        let first = text.find("market share").unwrap();
        let second = text.find("ok thanks").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn unwritable_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let log = TranscriptionLog::new(dir.path());
        log.record(&podcast(), "hello").await;
        assert!(dir.path().is_dir());
    }
}
