//! # Settings
//!
//! Runtime configuration, read from a YAML file with kebab-case keys. Every
//! key is optional.
//!
//! ```yaml
//! grace-period-ms: 300     # mode handoff grace period
//! poll-interval-ms: 20     # how often waits check for cancellation
//! idle-brightness: 0.05    # light level once the last note ends
//! tone-burst-ms: 80        # length of the tone played for each note
//! morse-message: SOS
//! music-dir: music
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LumitoneError;
use crate::playback::EngineOptions;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawSettings {
    grace_period_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    idle_brightness: Option<f64>,
    tone_burst_ms: Option<u64>,
    morse_message: Option<String>,
    music_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub grace_period: Duration,
    pub poll_interval: Duration,
    pub idle_brightness: f64,
    pub tone_burst: Duration,
    pub morse_message: String,
    pub music_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(300),
            poll_interval: Duration::from_millis(20),
            idle_brightness: 0.05,
            tone_burst: Duration::from_millis(80),
            morse_message: crate::pattern::DEFAULT_MORSE_MESSAGE.to_string(),
            music_dir: PathBuf::from("music"),
        }
    }
}

impl Settings {
    /// Read settings from a YAML file.
    ///
    /// # Errors
    /// Returns [`LumitoneError::Config`] if the file cannot be read or holds
    /// invalid settings.
    pub fn load(path: &Path) -> Result<Self, LumitoneError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LumitoneError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, LumitoneError> {
        let raw: RawSettings = if content.trim().is_empty() {
            RawSettings::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| LumitoneError::Config(e.to_string()))?
        };

        let defaults = Settings::default();

        let poll_interval = match raw.poll_interval_ms {
            Some(0) => {
                return Err(LumitoneError::Config(
                    "poll-interval-ms must be at least 1".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.poll_interval,
        };

        let idle_brightness = match raw.idle_brightness {
            Some(level) if !(0.0..=1.0).contains(&level) => {
                return Err(LumitoneError::Config(format!(
                    "idle-brightness must be between 0 and 1, got {}",
                    level
                )))
            }
            Some(level) => level,
            None => defaults.idle_brightness,
        };

        Ok(Settings {
            grace_period: raw
                .grace_period_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_period),
            poll_interval,
            idle_brightness,
            tone_burst: raw
                .tone_burst_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tone_burst),
            morse_message: raw.morse_message.unwrap_or(defaults.morse_message),
            music_dir: raw.music_dir.unwrap_or(defaults.music_dir),
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            poll_interval: self.poll_interval,
            idle_brightness: self.idle_brightness,
            tone_burst: self.tone_burst,
        }
    }
}
