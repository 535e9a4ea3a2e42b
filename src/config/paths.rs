//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir (settings, transcription log):
//!   Windows: %APPDATA%\podchat\
//!   macOS:   ~/Library/Application Support/podchat/
//!   Linux:   ~/.config/podchat/
//!
//! Data dir (Whisper models):
//!   Windows: %LOCALAPPDATA%\podchat\
//!   macOS:   ~/Library/Application Support/podchat/
//!   Linux:   ~/.local/share/podchat/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Append-only log of everything the listener said to the hosts.
    pub transcription_log: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "podchat";

    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            transcription_log: config_dir.join("transcriptions.log"),
            models_dir: data_dir.join("models"),
            config_dir,
        }
    }

    /// GGML file for a Whisper model stem, e.g. `base.en` → `ggml-base.en.bin`.
    pub fn whisper_model(&self, stem: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{stem}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .transcription_log
            .file_name()
            .is_some_and(|n| n == "transcriptions.log"));
    }

    #[test]
    fn whisper_model_file_name() {
        let paths = AppPaths::new();
        let model = paths.whisper_model("base.en");
        assert!(model.ends_with("ggml-base.en.bin"));
        assert!(model.starts_with(&paths.models_dir));
    }
}
